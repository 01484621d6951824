//! # Radio Sync Common Library
//!
//! Shared code for the radio sync server and its listeners:
//! - Event types (RadioEvent enum) and snapshot/result payloads
//! - Track identifier validation
//! - Epoch time helpers
//! - Configuration file loading
//! - Client-side clock offset, scheduling, late-join and drift math

pub mod config;
pub mod error;
pub mod events;
pub mod sync;
pub mod time;
pub mod track;

pub use error::{Error, Result};
pub use events::{Phase, RadioEvent};
pub use track::TrackId;
