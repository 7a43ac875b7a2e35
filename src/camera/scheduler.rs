use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};

use crate::{config::Camera, core::state::WorkerStatus};

use super::{
    archive::ArchiveWriter,
    traits::SnapshotSource,
    worker::{CameraWorker, WorkerShared},
};

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Delay between poll cycles of each worker.
    pub poll_interval: Duration,
    /// Cadence at which the supervisor samples counters and liveness.
    pub supervise_interval: Duration,
    /// How long `stop()` waits for each worker before moving on.
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            supervise_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

struct WorkerProbe {
    camera: Camera,
    shared: Arc<WorkerShared>,
}

impl WorkerProbe {
    fn status(&self) -> WorkerStatus {
        let state = self.shared.state();
        WorkerStatus {
            slug: self.camera.slug.clone(),
            downloads: self.shared.downloads(),
            state,
            alive: state.is_alive(),
        }
    }
}

/// Running acquisition run: one task per camera plus a supervision task.
/// Dropping the handle without calling [`stop`](SchedulerHandle::stop) also
/// ends the workers, via the closed stop channel.
pub struct SchedulerHandle {
    probes: Arc<Vec<WorkerProbe>>,
    joins: Vec<(String, JoinHandle<()>)>,
    supervisor: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
    shutdown_timeout: Duration,
}

/// Spawn one worker per camera, all sharing a single broadcast stop signal.
/// Workers share no mutable state with each other; the handle is the only
/// coordination point.
pub fn start<S>(
    cameras: Vec<Camera>,
    source: S,
    archive: ArchiveWriter,
    options: SchedulerOptions,
) -> SchedulerHandle
where
    S: SnapshotSource + Clone + Send + Sync + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut probes = Vec::with_capacity(cameras.len());
    let mut joins = Vec::with_capacity(cameras.len());
    for camera in cameras {
        let worker = CameraWorker::new(
            camera.clone(),
            source.clone(),
            archive.clone(),
            options.poll_interval,
            stop_rx.clone(),
        );
        probes.push(WorkerProbe {
            shared: worker.shared(),
            camera: camera.clone(),
        });
        joins.push((camera.slug, tokio::spawn(worker.run())));
    }
    info!(workers = joins.len(), "acquisition scheduler started");

    let probes = Arc::new(probes);
    let supervisor = tokio::spawn(supervise(
        probes.clone(),
        options.supervise_interval,
        stop_rx,
    ));

    SchedulerHandle {
        probes,
        joins,
        supervisor,
        stop_tx,
        shutdown_timeout: options.shutdown_timeout,
    }
}

async fn supervise(
    probes: Arc<Vec<WorkerProbe>>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let started = probes.len();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => {
                debug!("supervisor shutting down");
                return;
            }
        }

        let mut total = 0u64;
        let mut live = 0usize;
        for probe in probes.iter() {
            let status = probe.status();
            debug!(
                slug = %status.slug,
                downloads = status.downloads,
                state = ?status.state,
                "worker sampled"
            );
            total += status.downloads;
            if status.alive {
                live += 1;
            }
        }

        // A dead worker is supervised but not restarted.
        if live < started {
            warn!(
                live,
                started, "one or more camera workers terminated unexpectedly"
            );
        }
        info!(live, total_downloads = total, "acquisition status");
    }
}

impl SchedulerHandle {
    pub fn status(&self) -> Vec<WorkerStatus> {
        self.probes.iter().map(WorkerProbe::status).collect()
    }

    pub fn total_downloads(&self) -> u64 {
        self.probes.iter().map(|probe| probe.shared.downloads()).sum()
    }

    /// Broadcast the stop request and wait a bounded time for each worker.
    /// A worker stuck past the timeout is left behind rather than holding up
    /// shutdown. Returns the final per-camera statuses.
    pub async fn stop(mut self) -> Vec<WorkerStatus> {
        let _ = self.stop_tx.send(true);

        for (slug, join) in self.joins.drain(..) {
            match timeout(self.shutdown_timeout, join).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(%slug, error = %err, "camera worker task ended abnormally");
                }
                Err(_) => {
                    warn!(%slug, "camera worker did not stop within the shutdown timeout");
                }
            }
        }
        let _ = timeout(self.shutdown_timeout, &mut self.supervisor).await;

        self.status()
    }
}
