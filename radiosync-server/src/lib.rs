//! # Radio Sync Server Library (radiosync-server)
//!
//! Single shared radio timeline for many loosely synchronized listeners.
//!
//! **Purpose:** Accept track requests, acquire media in the background, pick a
//! start instant far enough ahead for every listener to prepare, broadcast the
//! timeline over SSE, and clean up downloaded media afterwards.
//!
//! **Architecture:** One mutex-guarded playback coordinator drives the phase
//! machine and its timers; acquisitions run as independent tokio tasks; the
//! media registry owns downloaded files; the clock broadcaster publishes the
//! server time listeners use to compute their offset.

pub mod acquisition;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod media;
pub mod playback;
pub mod server;

pub use error::{Error, Result};
