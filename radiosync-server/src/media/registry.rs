//! Media resource registry
//!
//! Owns every downloaded file between acquisition and the end of playback.
//! Deletion tolerates files that are already gone and retries once when the
//! file is still held open (a listener mid-download on some platforms).

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

/// Registry timing and location settings
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    pub media_dir: PathBuf,
    pub delete_retry_delay: Duration,
    pub sweep_interval: Duration,
    pub orphan_max_age: Duration,
}

/// Registered file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResource {
    pub path: PathBuf,
    pub registered_at: SystemTime,
}

pub struct MediaRegistry {
    settings: RegistrySettings,
    entries: Mutex<HashMap<Uuid, MediaResource>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MediaRegistry {
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn media_dir(&self) -> &Path {
        &self.settings.media_dir
    }

    /// Create the media directory if it does not exist yet
    pub async fn ensure_media_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings.media_dir).await?;
        Ok(())
    }

    /// Map `id` to `path`, replacing any previous mapping
    pub fn register(&self, id: Uuid, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Registered media {} -> {}", id, path.display());
        self.lock_entries().insert(
            id,
            MediaResource {
                path,
                registered_at: SystemTime::now(),
            },
        );
    }

    pub fn lookup(&self, id: Uuid) -> Option<PathBuf> {
        self.lock_entries().get(&id).map(|r| r.path.clone())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock_entries().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Drop the mapping for `id` and delete its file
    ///
    /// Unknown IDs and already-missing files are success. Any other failure
    /// schedules a single retry after the configured delay and is returned.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let resource = self.lock_entries().remove(&id);
        match resource {
            Some(resource) => {
                debug!("Deleting media {}", id);
                self.remove_with_retry(resource.path).await
            }
            None => Ok(()),
        }
    }

    /// Delete a file that was never registered (e.g. a discarded acquisition)
    pub async fn discard_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.remove_with_retry(path.into()).await
    }

    async fn remove_with_retry(&self, path: PathBuf) -> Result<()> {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(
                    "Failed to delete {}: {}, retrying in {:?}",
                    path.display(),
                    e,
                    self.settings.delete_retry_delay
                );
                let delay = self.settings.delete_retry_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => debug!("Deleted {} on retry", path.display()),
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => warn!("Retry delete of {} failed: {}", path.display(), e),
                    }
                });
                Err(e.into())
            }
        }
    }

    /// Sweep the media directory using the current wall clock
    pub async fn sweep_orphans(&self) -> Result<usize> {
        self.sweep_at(SystemTime::now()).await
    }

    /// Delete every file in the media directory whose age at `now` exceeds
    /// the orphan threshold, registered or not
    ///
    /// Returns the number of files removed. A missing directory sweeps nothing.
    pub async fn sweep_at(&self, now: SystemTime) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.settings.media_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.settings.orphan_max_age {
                continue;
            }

            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Swept {} (age {:?})", path.display(), age);
                    removed.push(path);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
            }
        }

        if !removed.is_empty() {
            self.lock_entries()
                .retain(|_, resource| !removed.contains(&resource.path));
            info!("Orphan sweep removed {} file(s)", removed.len());
        }
        Ok(removed.len())
    }

    /// Run `sweep_orphans` every sweep interval, first run one interval from now
    pub fn start_sweeper(self: &Arc<Self>) {
        let registry = Arc::downgrade(self);
        let period = self.settings.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                if let Err(e) = registry.sweep_orphans().await {
                    warn!("Orphan sweep failed: {}", e);
                }
            }
        });

        if let Some(previous) = self.lock_sweeper().replace(handle) {
            previous.abort();
        }
        info!(
            "Orphan sweeper started for {} (every {:?}, max age {:?})",
            self.settings.media_dir.display(),
            period,
            self.settings.orphan_max_age
        );
    }

    pub fn is_sweeping(&self) -> bool {
        self.lock_sweeper().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the sweeper and delete every registered file
    ///
    /// Returns the number of files deleted.
    pub async fn shutdown(&self) -> usize {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }

        let entries: Vec<(Uuid, MediaResource)> = self.lock_entries().drain().collect();
        let mut deleted = 0;
        for (id, resource) in entries {
            match tokio::fs::remove_file(&resource.path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete media {} on shutdown: {}", id, e),
            }
        }
        info!("Media registry shut down, {} file(s) deleted", deleted);
        deleted
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<Uuid, MediaResource>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for MediaRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }
    }
}
