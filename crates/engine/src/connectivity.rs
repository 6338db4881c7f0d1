//! Periodic backend reachability probing.
//!
//! One monitor per backend, owned by whoever wires the application
//! together and injected where needed. The probe itself never errors:
//! any failure to reach the backend is the `Unreachable` answer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use emberchat_core::backend::ChatBackend;
use emberchat_core::event::{ConnectivityState, DomainEvent, EventBus};

/// Default cadence between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Watches whether the model backend answers, on a fixed cadence.
///
/// `start()` probes immediately and then every interval until
/// `shutdown()`. State begins as `Unknown` and transitions are published
/// on the event bus; steady-state probes stay silent.
pub struct ConnectivityMonitor {
    backend: Arc<dyn ChatBackend>,
    events: Arc<EventBus>,
    interval: Duration,
    state: Arc<Mutex<ConnectivityState>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(backend: Arc<dyn ChatBackend>, events: Arc<EventBus>) -> Self {
        Self {
            backend,
            events,
            interval: DEFAULT_PROBE_INTERVAL,
            state: Arc::new(Mutex::new(ConnectivityState::Unknown)),
            task: Mutex::new(None),
        }
    }

    /// Override the probe cadence (from configuration).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The most recently observed state.
    pub fn state(&self) -> ConnectivityState {
        *lock(&self.state)
    }

    /// Spawn the probe loop. The first probe fires immediately. Calling
    /// `start` again replaces any running loop.
    pub fn start(&self) {
        let backend = Arc::clone(&self.backend);
        let events = Arc::clone(&self.events);
        let state = Arc::clone(&self.state);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                Self::probe(&backend, &state, &events).await;
            }
        });

        if let Some(previous) = lock_task(&self.task).replace(handle) {
            previous.abort();
        }
        debug!(interval_secs = interval.as_secs(), "connectivity monitor started");
    }

    /// Probe once, right now, outside the timer cadence.
    pub async fn probe_now(&self) -> ConnectivityState {
        Self::probe(&self.backend, &self.state, &self.events).await
    }

    /// Stop the probe loop. The last observed state remains readable.
    pub fn shutdown(&self) {
        if let Some(task) = lock_task(&self.task).take() {
            task.abort();
            debug!("connectivity monitor stopped");
        }
    }

    async fn probe(
        backend: &Arc<dyn ChatBackend>,
        state: &Arc<Mutex<ConnectivityState>>,
        events: &Arc<EventBus>,
    ) -> ConnectivityState {
        let observed = if backend.ping().await {
            ConnectivityState::Reachable
        } else {
            ConnectivityState::Unreachable
        };

        let mut current = lock(state);
        if *current != observed {
            *current = observed;
            drop(current);
            info!(?observed, "backend connectivity changed");
            events.publish(DomainEvent::ConnectivityChanged {
                state: observed,
                timestamp: Utc::now(),
            });
        }
        observed
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = lock_task(&self.task).take() {
            task.abort();
        }
    }
}

fn lock(state: &Mutex<ConnectivityState>) -> MutexGuard<'_, ConnectivityState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_task(task: &Mutex<Option<JoinHandle<()>>>) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use emberchat_core::backend::{ChatOutcome, ModelInfo, PromptContext};
    use emberchat_core::error::BackendError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ProbeBackend {
        reachable: AtomicBool,
        pings: AtomicUsize,
    }

    impl ProbeBackend {
        fn up() -> Arc<Self> {
            Arc::new(Self {
                reachable: AtomicBool::new(true),
                pings: AtomicUsize::new(0),
            })
        }

        fn set_reachable(&self, value: bool) {
            self.reachable.store(value, Ordering::SeqCst);
        }

        fn pings(&self) -> usize {
            self.pings.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for ProbeBackend {
        fn name(&self) -> &str {
            "probe"
        }

        async fn generate_with_history(&self, _: &PromptContext, _: &str) -> ChatOutcome {
            ChatOutcome::Failure("not a chat backend".into())
        }

        async fn generate_with_image(&self, _: &str, _: &str, _: &str) -> ChatOutcome {
            ChatOutcome::Failure("not a chat backend".into())
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> bool {
            self.pings.fetch_add(1, Ordering::SeqCst);
            self.reachable.load(Ordering::SeqCst)
        }
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn state_starts_unknown() {
        let monitor = ConnectivityMonitor::new(ProbeBackend::up(), Arc::new(EventBus::new(8)));
        assert_eq!(monitor.state(), ConnectivityState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn first_probe_fires_immediately() {
        let backend = ProbeBackend::up();
        let events = Arc::new(EventBus::new(8));
        let mut rx = events.subscribe();
        let monitor = ConnectivityMonitor::new(backend.clone(), events);

        monitor.start();
        settle().await;

        assert_eq!(monitor.state(), ConnectivityState::Reachable);
        assert_eq!(backend.pings(), 1);
        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::ConnectivityChanged { state, .. } => {
                assert_eq!(*state, ConnectivityState::Reachable);
            }
            other => panic!("expected ConnectivityChanged, got {other:?}"),
        }
        monitor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_publish_steady_state_stays_silent() {
        let backend = ProbeBackend::up();
        let events = Arc::new(EventBus::new(8));
        let mut rx = events.subscribe();
        let monitor =
            ConnectivityMonitor::new(backend.clone(), events).with_interval(Duration::from_secs(10));

        monitor.start();
        settle().await;
        assert_eq!(monitor.state(), ConnectivityState::Reachable);
        rx.try_recv().unwrap(); // Unknown -> Reachable

        // Two more probes with the backend still up: no new events.
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(backend.pings(), 3);

        // The backend goes away: one transition event.
        backend.set_reachable(false);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(monitor.state(), ConnectivityState::Unreachable);
        match rx.try_recv().unwrap().as_ref() {
            DomainEvent::ConnectivityChanged { state, .. } => {
                assert_eq!(*state, ConnectivityState::Unreachable);
            }
            other => panic!("expected ConnectivityChanged, got {other:?}"),
        }
        monitor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn probe_now_is_one_shot() {
        let backend = ProbeBackend::up();
        let events = Arc::new(EventBus::new(8));
        let monitor =
            ConnectivityMonitor::new(backend.clone(), events).with_interval(Duration::from_secs(10));

        monitor.start();
        settle().await;
        assert_eq!(backend.pings(), 1);

        // Manual probe runs immediately and reports.
        backend.set_reachable(false);
        let observed = monitor.probe_now().await;
        assert_eq!(observed, ConnectivityState::Unreachable);
        assert_eq!(backend.pings(), 2);

        // The timer cadence is undisturbed: the next scheduled probe
        // still lands on the original schedule.
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(backend.pings(), 3);
        monitor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_probing() {
        let backend = ProbeBackend::up();
        let monitor = ConnectivityMonitor::new(backend.clone(), Arc::new(EventBus::new(8)))
            .with_interval(Duration::from_secs(10));

        monitor.start();
        settle().await;
        monitor.shutdown();

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(backend.pings(), 1);
        // State remains readable after shutdown.
        assert_eq!(monitor.state(), ConnectivityState::Reachable);
    }

    #[tokio::test]
    async fn probe_works_without_start() {
        let backend = ProbeBackend::up();
        let monitor = ConnectivityMonitor::new(backend.clone(), Arc::new(EventBus::new(8)));

        assert_eq!(monitor.probe_now().await, ConnectivityState::Reachable);
        assert_eq!(monitor.state(), ConnectivityState::Reachable);
    }
}
