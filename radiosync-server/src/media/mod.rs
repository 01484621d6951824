//! Downloaded media ownership
//!
//! Maps opaque resource IDs to local files, deletes them when the coordinator
//! is done with them, and sweeps the media directory for anything left behind.

pub mod registry;

pub use registry::{MediaRegistry, MediaResource, RegistrySettings};

use uuid::Uuid;

/// Client-facing locator for a registered resource
pub fn media_locator(public_base_url: &str, id: Uuid) -> String {
    format!("{}/audio/{}", public_base_url.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_locator() {
        let id = Uuid::nil();
        assert_eq!(
            media_locator("http://localhost:3000/", id),
            "http://localhost:3000/audio/00000000-0000-0000-0000-000000000000"
        );
    }
}
