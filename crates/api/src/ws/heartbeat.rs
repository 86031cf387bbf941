use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ws::registry::{ConnectionRegistry, MembershipChange};

/// Default interval between heartbeat probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(50);

/// Periodic liveness probe that runs only while connections exist.
///
/// The probe is best-effort: clients are expected to answer `pong` but
/// silent clients are never disconnected for it. Its purpose is keeping idle
/// transports (and proxies in front of them) from timing out.
///
/// Start and stop are driven by membership edges (0→1, 1→0). Each decision is
/// taken under `task`'s lock against the live registry count, so racing joins
/// and leaves around zero settle on exactly one timer or none.
pub struct HeartbeatScheduler {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    starts: AtomicUsize,
}

impl HeartbeatScheduler {
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            task: Mutex::new(None),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// React to a registry add/remove.
    pub async fn on_membership_change(&self, change: MembershipChange) {
        if change.is_first_join() || change.is_last_leave() {
            self.reconcile().await;
        }
    }

    /// Start or stop the timer so it runs iff the registry is non-empty.
    pub async fn reconcile(&self) {
        let mut task = self.task.lock().await;
        let live = self.registry.connection_count().await;

        if live == 0 {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::info!("Last client disconnected, heartbeat stopped");
            }
        } else if task.is_none() {
            *task = Some(self.spawn_ticker());
            self.starts.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                live,
                interval_secs = self.interval.as_secs(),
                "First client connected, heartbeat started"
            );
        }
    }

    /// Stop the timer regardless of membership. Used at shutdown.
    pub async fn stop(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            tracing::info!("Heartbeat task stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// How many times the timer has been started since creation.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    /// Spawn the ticking task. The first probe goes out one full interval
    /// after start.
    fn spawn_ticker(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let probed = registry.ping_all().await;
                tracing::debug!(probed, "Heartbeat ping");
            }
        })
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
