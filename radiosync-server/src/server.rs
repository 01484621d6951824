//! HTTP server lifecycle
//!
//! Serves the router until the shutdown signal fires. Teardown runs inside the
//! graceful-shutdown future: the timeline and media are cleaned up first, then
//! every open event stream is ended so the listener can drain.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::TimesyncBroadcaster;
use crate::error::Result;
use crate::media::MediaRegistry;
use crate::playback::PlaybackCoordinator;

/// Long-lived components torn down on shutdown
pub struct Services {
    pub coordinator: PlaybackCoordinator,
    pub timesync: Arc<TimesyncBroadcaster>,
    pub registry: Arc<MediaRegistry>,
    /// Cancelled last; SSE streams end when it fires
    pub shutdown: CancellationToken,
}

impl Services {
    /// Disarm timers, stop timesync and the sweeper, delete registered
    /// media, then close event streams
    pub async fn shutdown(&self) {
        info!("Shutting down services");
        self.coordinator.shutdown().await;
        self.timesync.stop();
        let deleted = self.registry.shutdown().await;
        info!("Cleanup complete ({} media file(s) deleted), closing event streams", deleted);
        self.shutdown.cancel();
    }
}

/// Serve `app` on `listener` until `signal` resolves and teardown completes
pub async fn serve<F>(listener: TcpListener, app: Router, services: Services, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            services.shutdown().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
