//! Test helper modules for radiosync-server integration tests
//!
//! - MockAcquirer: scripted acquisition backend that counts calls
//! - TestServer: coordinator, registry and router wired together with a
//!   clock that follows tokio's (pausable) time

#![allow(dead_code)]

pub mod mock_acquirer;
pub mod test_server;

pub use mock_acquirer::{AcquireMode, MockAcquirer};
pub use test_server::{settle, track, wait_until, EventStream, TestClock, TestServer, BASE_EPOCH_MS};
