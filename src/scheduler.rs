//! Scheduler (C5, §4.5).
//!
//! One ticker task per monitor, generalizing the teacher's
//! `ServiceMonitorActor`/`MetricCollectorActor` (`actors/service_monitor.rs`,
//! `actors/collector.rs`) from "poll one HTTP/agent endpoint" to "drive
//! whichever executor the monitor's `kind` names, then fold the raw result
//! through retry, store, hub and dispatch". Same command-channel-plus-
//! ticker shape; the teacher's `broadcast::Sender<Event>` fan-out is
//! replaced by a direct call into the hub and dispatcher since those are
//! themselves the only consumers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::channels::ChannelRegistry;
use crate::dispatch;
use crate::executor::{ExecutionContext, Registry};
use crate::hub::Hub;
use crate::maintenance::{self, MaintenanceVerdict};
use crate::model::{MaintenanceStrategy, MaintenanceWindow, Monitor, NotificationChannel, ResendCursor};
use crate::retry::{self, RetryState};
use crate::store::HeartbeatStore;

/// The engine treats monitor/channel/maintenance-window persistence as an
/// external repository (§1: "a mapping-style repository abstraction is
/// assumed") — the scheduler only needs read access to the channels and
/// maintenance windows relevant to a dispatch decision, not a full CRUD
/// surface.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn channels(&self) -> Vec<NotificationChannel>;
    async fn maintenance_windows(&self) -> Vec<MaintenanceWindow>;
    /// Looks up one monitor by id, e.g. to validate a push token against
    /// its config before recording a push (§4.3 Push contract).
    async fn monitor(&self, monitor_id: &str) -> Option<Monitor>;
}

/// Shared collaborators every monitor task needs. Cheap to clone (all
/// `Arc`/`Hub`-internal-`Arc` fields).
#[derive(Clone)]
pub struct SchedulerDeps {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn HeartbeatStore>,
    pub hub: Hub,
    pub channel_registry: Arc<ChannelRegistry>,
    pub config_source: Arc<dyn ConfigSource>,
}

enum MonitorCommand {
    Reconfigure(Monitor),
    Stop,
}

/// Handle to a running monitor task (§4.5: "atomically replace the
/// ticker"/"stop ticker; cancel in-flight probe").
pub struct MonitorHandle {
    monitor_id: String,
    command_tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    pub fn monitor_id(&self) -> &str {
        &self.monitor_id
    }

    /// Replaces the running monitor's config; the task cancels any
    /// in-flight probe and restarts its ticker if the interval changed.
    pub async fn reconfigure(&self, monitor: Monitor) {
        let _ = self.command_tx.send(MonitorCommand::Reconfigure(monitor)).await;
    }

    /// Stops the ticker and cancels an in-flight probe. Does not wait for
    /// the task to finish; callers that need a drain deadline should race
    /// this against a timeout (the server's shutdown sequence does).
    pub async fn stop(&self) {
        let _ = self.command_tx.send(MonitorCommand::Stop).await;
    }
}

/// Spawns the ticker task for one monitor.
pub fn spawn(monitor: Monitor, deps: SchedulerDeps) -> MonitorHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let monitor_id = monitor.id.clone();

    let task = MonitorTask {
        monitor,
        deps,
        command_rx,
        retry_state: RetryState::new(),
        sequence: 0,
        resend_cursor: None,
        cancel: CancellationToken::new(),
    };

    tokio::spawn(task.run());

    MonitorHandle { monitor_id, command_tx }
}

struct MonitorTask {
    monitor: Monitor,
    deps: SchedulerDeps,
    command_rx: mpsc::Receiver<MonitorCommand>,
    retry_state: RetryState,
    sequence: u64,
    resend_cursor: Option<ResendCursor>,
    cancel: CancellationToken,
}

impl MonitorTask {
    fn make_ticker(interval_secs: u64) -> tokio::time::Interval {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // A tick arriving while the previous probe is still running is
        // dropped rather than queued (§4.5 concurrency contract) — Skip
        // matches that, Burst (tokio's default) would catch up instead.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    #[instrument(skip(self), fields(monitor_id = %self.monitor.id))]
    async fn run(mut self) {
        debug!("starting monitor scheduler");
        let mut ticker = Self::make_ticker(self.monitor.interval_secs);
        let mut probe: Option<tokio::task::JoinHandle<crate::model::ProbeOutcome>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick(&mut probe).await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::Reconfigure(new_monitor) => {
                            self.on_reconfigure(new_monitor, &mut ticker, &mut probe);
                        }
                        MonitorCommand::Stop => {
                            self.cancel.cancel();
                            break;
                        }
                    }
                }

                result = Self::await_probe(&mut probe), if probe.is_some() => {
                    probe = None;
                    match result {
                        Ok(outcome) => self.on_outcome(outcome).await,
                        Err(e) => warn!(error = %e, "probe task panicked"),
                    }
                }

                else => break,
            }
        }

        debug!("monitor scheduler stopped");
    }

    async fn await_probe(probe: &mut Option<tokio::task::JoinHandle<crate::model::ProbeOutcome>>) -> Result<crate::model::ProbeOutcome, tokio::task::JoinError> {
        match probe {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    }

    async fn on_tick(&mut self, probe: &mut Option<tokio::task::JoinHandle<crate::model::ProbeOutcome>>) {
        if !self.monitor.active {
            return;
        }
        if probe.is_some() {
            warn!(monitor_id = %self.monitor.id, "tick dropped: previous probe still in flight");
            return;
        }

        let windows = self.deps.config_source.maintenance_windows().await;
        let (verdict, _) = maintenance::evaluate(&windows, &self.monitor.id, Utc::now());
        if verdict == MaintenanceVerdict::PauseProbes {
            return;
        }

        self.cancel = CancellationToken::new();
        let ctx = ExecutionContext::new(Duration::from_secs(self.monitor.timeout_secs.max(1)), self.cancel.clone());
        let registry = self.deps.registry.clone();
        let monitor = self.monitor.clone();

        *probe = Some(tokio::spawn(async move { registry.execute(ctx, &monitor, monitor.proxy.as_ref()).await }));
    }

    fn on_reconfigure(&mut self, new_monitor: Monitor, ticker: &mut tokio::time::Interval, probe: &mut Option<tokio::task::JoinHandle<crate::model::ProbeOutcome>>) {
        debug!(monitor_id = %new_monitor.id, revision = new_monitor.revision, "reconfiguring monitor");
        self.cancel.cancel();
        *probe = None;
        self.retry_state.reset();

        if new_monitor.interval_secs != self.monitor.interval_secs {
            *ticker = Self::make_ticker(new_monitor.interval_secs);
        }
        self.monitor = new_monitor;
    }

    async fn on_outcome(&mut self, outcome: crate::model::ProbeOutcome) {
        if outcome.no_op {
            debug!(monitor_id = %self.monitor.id, "probe outcome is a no-op, skipping this tick");
            return;
        }

        self.sequence += 1;

        let windows = self.deps.config_source.maintenance_windows().await;
        let (verdict, _) = maintenance::evaluate(&windows, &self.monitor.id, Utc::now());
        let strategy = match verdict {
            MaintenanceVerdict::SuppressAlerts => Some(MaintenanceStrategy::SuppressAlerts),
            _ => None,
        };

        let transition = retry::apply(&mut self.retry_state, &self.monitor.id, self.sequence, &outcome, self.monitor.max_retries, strategy);

        if let Err(e) = self.deps.store.append(transition.heartbeat.clone()).await {
            warn!(monitor_id = %self.monitor.id, error = %e, "failed to persist heartbeat");
        }

        self.deps.hub.publish(&transition.heartbeat).await;

        let now = Utc::now();
        let dispatched = dispatch::should_dispatch(&transition.heartbeat, verdict, self.monitor.resend_interval_secs, self.resend_cursor, now);
        if dispatched {
            let channels = self.deps.config_source.channels().await;
            let outcomes = dispatch::dispatch(&self.deps.channel_registry, &channels, &self.monitor, &transition.heartbeat).await;
            for o in &outcomes {
                if !o.ok {
                    warn!(monitor_id = %self.monitor.id, channel_id = %o.channel_id, attempts = o.attempts, error = ?o.last_error, "notification channel failed");
                }
            }
        }
        dispatch::advance_cursor(&mut self.resend_cursor, &transition.heartbeat, dispatched, now);
    }
}

/// Top-level orchestrator: one `MonitorHandle` per active monitor, plus
/// the bounded shutdown drain the server binary runs on `ctrl_c` (§5,
/// supplemented feature: grace-period drain mirroring the teacher's
/// `hub.rs` stop sequence).
pub struct Scheduler {
    deps: SchedulerDeps,
    handles: tokio::sync::Mutex<std::collections::HashMap<String, MonitorHandle>>,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps) -> Self {
        Self {
            deps,
            handles: tokio::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub async fn start(&self, monitor: Monitor) {
        let id = monitor.id.clone();
        let handle = spawn(monitor, self.deps.clone());
        self.handles.lock().await.insert(id, handle);
    }

    pub async fn reconfigure(&self, monitor: Monitor) {
        let handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&monitor.id) {
            handle.reconfigure(monitor).await;
        }
    }

    /// Deactivate/delete (§3 lifecycle: "deletion cascades to stop the
    /// ticker"); heartbeat purge is the caller's responsibility via the
    /// store's `delete_by_monitor`.
    pub async fn stop_monitor(&self, monitor_id: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.remove(monitor_id) {
            handle.stop().await;
        }
    }

    /// Stops every monitor, bounded by `grace_period` (default 30s per
    /// §5). Monitors that don't observe cancellation within the grace
    /// period are abandoned, not force-killed — they hold no shared
    /// state the rest of the process needs back.
    pub async fn shutdown(&self, grace_period: Duration) {
        let handles = {
            let mut guard = self.handles.lock().await;
            std::mem::take(&mut *guard)
        };

        let stop_all = async {
            for handle in handles.values() {
                handle.stop().await;
            }
        };

        if tokio::time::timeout(grace_period, stop_all).await.is_err() {
            warn!("scheduler shutdown grace period elapsed before all monitors drained");
        }
    }

    pub async fn monitor_count(&self) -> usize {
        self.handles.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::default_registry as default_channel_registry;
    use crate::executor::default_registry;
    use crate::model::{Proxy, Status};
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyConfigSource;

    #[async_trait]
    impl ConfigSource for EmptyConfigSource {
        async fn channels(&self) -> Vec<NotificationChannel> {
            vec![]
        }
        async fn maintenance_windows(&self) -> Vec<MaintenanceWindow> {
            vec![]
        }
        async fn monitor(&self, _monitor_id: &str) -> Option<Monitor> {
            None
        }
    }

    fn test_monitor(interval_secs: u64) -> Monitor {
        Monitor {
            id: "m1".into(),
            name: "test".into(),
            kind: "push".into(),
            interval_secs,
            timeout_secs: 5,
            max_retries: 1,
            retry_interval_secs: 1,
            resend_interval_secs: 0,
            active: true,
            status: Status::Pending,
            config: serde_json::json!({}),
            proxy: None::<Proxy>,
            notification_channel_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            revision: 1,
        }
    }

    fn test_deps() -> SchedulerDeps {
        use crate::executor::push::PushTracker;
        SchedulerDeps {
            registry: Arc::new(default_registry(Arc::new(PushTracker::new()))),
            store: Arc::new(MemoryStore::new()),
            hub: Hub::new(),
            channel_registry: Arc::new(default_channel_registry()),
            config_source: Arc::new(EmptyConfigSource),
        }
    }

    #[tokio::test]
    async fn start_and_stop_monitor_survives_immediate_shutdown() {
        let scheduler = Scheduler::new(test_deps());
        scheduler.start(test_monitor(1)).await;
        assert_eq!(scheduler.monitor_count().await, 1);
        scheduler.shutdown(Duration::from_secs(1)).await;
        assert_eq!(scheduler.monitor_count().await, 0);
    }

    #[tokio::test]
    async fn reconfigure_replaces_running_monitor_without_panicking() {
        let scheduler = Scheduler::new(test_deps());
        scheduler.start(test_monitor(5)).await;
        let mut updated = test_monitor(5);
        updated.revision = 2;
        updated.timeout_secs = 10;
        scheduler.reconfigure(updated).await;
        scheduler.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn tick_eventually_persists_a_heartbeat() {
        let deps = test_deps();
        let store = deps.store.clone();
        let hub = deps.hub.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_task = seen.clone();

        deps.hub.subscribe("s1", ["m1".to_string()]).await;
        tokio::spawn(async move {
            loop {
                hub.notified("s1").await;
                seen_task.fetch_add(hub.drain("s1").await.len(), Ordering::SeqCst);
            }
        });

        let scheduler = Scheduler::new(deps);
        scheduler.start(test_monitor(1)).await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.shutdown(Duration::from_secs(1)).await;

        let latest = store.latest("m1", 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert!(seen.load(Ordering::SeqCst) >= 1);
    }
}
