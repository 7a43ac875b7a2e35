use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Local;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{config::Camera, core::state::WorkerState};

use super::{archive::ArchiveWriter, traits::SnapshotSource};

/// Counter and lifecycle record shared between one worker and the scheduler.
/// The owning worker is the only writer; the scheduler only reads.
#[derive(Debug)]
pub struct WorkerShared {
    downloads: AtomicU64,
    state: AtomicU8,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            downloads: AtomicU64::new(0),
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
        }
    }

    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn record_download(&self) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }
}

/// Marks the worker as dead if its task unwinds without reaching a clean
/// stop, so the scheduler can tell a crash apart from a stop request.
struct DeathWatch(Arc<WorkerShared>);

impl Drop for DeathWatch {
    fn drop(&mut self) {
        if self.0.state() != WorkerState::Stopped {
            self.0.set_state(WorkerState::Died);
        }
    }
}

/// Owns one camera's fetch → validate → store → sleep cycle.
///
/// Fetch and write failures are logged and the loop continues at the next
/// interval; only a stop request ends it. The sleep is raced against the
/// stop channel, so shutdown latency stays bounded even mid-interval.
pub struct CameraWorker<S> {
    camera: Camera,
    source: S,
    archive: ArchiveWriter,
    interval: Duration,
    shared: Arc<WorkerShared>,
    stop_rx: watch::Receiver<bool>,
}

impl<S: SnapshotSource> CameraWorker<S> {
    pub fn new(
        camera: Camera,
        source: S,
        archive: ArchiveWriter,
        interval: Duration,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            camera,
            source,
            archive,
            interval,
            shared: Arc::new(WorkerShared::new()),
            stop_rx,
        }
    }

    pub fn shared(&self) -> Arc<WorkerShared> {
        self.shared.clone()
    }

    pub async fn run(mut self) {
        let _death_watch = DeathWatch(self.shared.clone());
        self.shared.set_state(WorkerState::Running);
        info!(
            slug = %self.camera.slug,
            url = %self.camera.url,
            interval_secs = self.interval.as_secs_f64(),
            "camera worker started"
        );

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                // A changed stop flag or a dropped scheduler both end the loop.
                _ = self.stop_rx.changed() => break,
            }
        }

        self.shared.set_state(WorkerState::Stopping);
        info!(
            slug = %self.camera.slug,
            downloads = self.shared.downloads(),
            "camera worker stopped"
        );
        self.shared.set_state(WorkerState::Stopped);
    }

    async fn poll_once(&self) {
        let image = match self.source.fetch(&self.camera.url).await {
            Ok(image) => image,
            Err(err) => {
                warn!(slug = %self.camera.slug, error = %err, "snapshot fetch failed");
                return;
            }
        };

        let captured_at = Local::now();
        match self
            .archive
            .store(&self.camera.slug, &image, captured_at)
            .await
        {
            Ok(path) => {
                self.shared.record_download();
                info!(
                    slug = %self.camera.slug,
                    bytes = image.len(),
                    path = %path.display(),
                    total = self.shared.downloads(),
                    "snapshot archived"
                );
            }
            Err(err) => {
                warn!(slug = %self.camera.slug, error = %err, "snapshot write failed");
            }
        }
    }
}
