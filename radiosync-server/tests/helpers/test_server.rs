//! Test server wrapper for integration tests
//!
//! Wires a coordinator, media registry, mock acquirer and router together.
//! Epoch time is derived from tokio's clock so that with
//! `#[tokio::test(start_paused = true)]` timers and timestamps agree.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use radiosync_common::events::{EventBus, RadioEvent};
use radiosync_common::TrackId;
use radiosync_server::api::{create_router, AppContext};
use radiosync_server::clock::{EpochClock, TimesyncBroadcaster};
use radiosync_server::media::{MediaRegistry, RegistrySettings};
use radiosync_server::playback::{CoordinatorSettings, PlaybackCoordinator};
use radiosync_server::server::Services;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::mock_acquirer::{AcquireMode, MockAcquirer};

/// Epoch time at the moment a test server is created
pub const BASE_EPOCH_MS: i64 = 1_700_000_000_000;

/// Epoch clock that follows `tokio::time::Instant`
pub struct TestClock {
    origin: tokio::time::Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl EpochClock for TestClock {
    fn now_epoch_ms(&self) -> i64 {
        BASE_EPOCH_MS + self.origin.elapsed().as_millis() as i64
    }
}

/// Eleven-character track ID unique per `n`
pub fn track(n: usize) -> TrackId {
    TrackId::parse(&format!("track{:06}", n)).unwrap()
}

/// Test server instance
pub struct TestServer {
    pub coordinator: PlaybackCoordinator,
    pub registry: Arc<MediaRegistry>,
    pub acquirer: Arc<MockAcquirer>,
    pub events: EventBus,
    pub clock: Arc<TestClock>,
    pub router: Router,
    pub shutdown: CancellationToken,
    pub media_dir: TempDir,
}

impl TestServer {
    /// Tracks last 180 s, queue holds 20, start lead is 5 s
    pub fn start(mode: AcquireMode) -> Self {
        Self::with_settings(mode, 180.0, CoordinatorSettings::default())
    }

    pub fn with_settings(mode: AcquireMode, duration_secs: f64, settings: CoordinatorSettings) -> Self {
        let media_dir = TempDir::new().unwrap();
        let events = EventBus::new(1024);
        let clock = Arc::new(TestClock::new());

        let registry = Arc::new(MediaRegistry::new(RegistrySettings {
            media_dir: media_dir.path().to_path_buf(),
            delete_retry_delay: Duration::from_millis(10),
            sweep_interval: Duration::from_secs(3600),
            orphan_max_age: Duration::from_secs(7200),
        }));
        let acquirer = Arc::new(MockAcquirer::new(
            media_dir.path().to_path_buf(),
            duration_secs,
            mode,
        ));

        let coordinator = PlaybackCoordinator::new(
            settings,
            events.clone(),
            Arc::clone(&registry),
            acquirer.clone(),
            clock.clone(),
        );

        let shutdown = CancellationToken::new();
        let router = create_router(AppContext {
            coordinator: coordinator.clone(),
            registry: Arc::clone(&registry),
            events: events.clone(),
            clock: clock.clone(),
            shutdown: shutdown.clone(),
        });

        Self {
            coordinator,
            registry,
            acquirer,
            events,
            clock,
            router,
            shutdown,
            media_dir,
        }
    }

    /// Components torn down by `server::serve`, sharing this server's state
    pub fn services(&self, timesync: Arc<TimesyncBroadcaster>) -> Services {
        Services {
            coordinator: self.coordinator.clone(),
            timesync,
            registry: Arc::clone(&self.registry),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Timesync broadcaster on this server's clock and bus, already started
    pub fn start_timesync(&self) -> Arc<TimesyncBroadcaster> {
        let timesync = Arc::new(TimesyncBroadcaster::new(
            self.clock.clone(),
            self.events.clone(),
            Duration::from_secs(5),
        ));
        timesync.start();
        timesync
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream {
            receiver: self.events.subscribe(),
        }
    }

    pub fn now_epoch_ms(&self) -> i64 {
        self.clock.now_epoch_ms()
    }

    /// Make an HTTP request against the router
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> (axum::http::StatusCode, Option<Value>) {
        let (status, bytes) = self.request_raw(method, path, body, &[]).await;
        let json = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };
        (status, json)
    }

    /// Make an HTTP request and return the raw body
    pub async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (axum::http::StatusCode, Vec<u8>) {
        let (status, _, bytes) = self.request_full(method, path, body, headers).await;
        (status, bytes)
    }

    /// Make an HTTP request and return status, headers and body
    pub async fn request_full(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (axum::http::StatusCode, axum::http::HeaderMap, Vec<u8>) {
        use axum::body::Body;
        use axum::http::{Method, Request};
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        let method = match method {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "DELETE" => Method::DELETE,
            _ => panic!("Unsupported method: {}", method),
        };

        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, bytes)
    }
}

/// Broadcast event receiver wrapper
pub struct EventStream {
    pub receiver: broadcast::Receiver<RadioEvent>,
}

impl EventStream {
    /// Wait (in virtual time) for the first event matching `predicate`
    ///
    /// Panics if none arrives within an hour of tokio time.
    pub async fn wait_for<F>(&mut self, what: &str, mut predicate: F) -> RadioEvent
    where
        F: FnMut(&RadioEvent) -> bool,
    {
        let wait = async {
            loop {
                match self.receiver.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("event stream error while waiting for {}: {:?}", what, e),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(3600), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
    }

    /// Every event already delivered, without waiting
    pub fn drain(&mut self) -> Vec<RadioEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Let spawned tasks (and blocking file operations) settle
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Poll `condition` until it holds, sleeping in small virtual-time steps
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held: {}", what);
}
