/// Dashboard poller
///
/// Owns the poll timer and the current dashboard state. Every tick fetches one
/// batch from a `MetricsSource`, normalizes it and swaps the whole state in a
/// `watch` channel; a failed tick keeps the previous view model. Ticks never
/// overlap: a tick or manual refresh that finds a poll in flight is skipped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::dispatcher::{MetricsSource, RawResults};
use super::normalizer::{normalize, DashboardViewModel};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// True until the first successful tick
    pub loading: bool,
    pub view: DashboardViewModel,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub successes: u64,
    pub failures: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            loading: true,
            view: DashboardViewModel::default(),
            last_success: None,
            last_error: None,
            successes: 0,
            failures: 0,
        }
    }
}

impl DashboardState {
    /// Time since the last successful tick
    pub fn age(&self) -> Option<Duration> {
        self.last_success
            .and_then(|at| Utc::now().signed_duration_since(at).to_std().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    Failed(String),
    /// A previous poll was still in flight
    Skipped,
}

pub struct DashboardPoller {
    source: Arc<dyn MetricsSource>,
    interval: Duration,
    state: Arc<watch::Sender<DashboardState>>,
    in_flight: Arc<Mutex<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DashboardPoller {
    pub fn new(source: Arc<dyn MetricsSource>, interval: Duration) -> Self {
        let (state, _) = watch::channel(DashboardState::default());

        Self {
            source,
            interval,
            state: Arc::new(state),
            in_flight: Arc::new(Mutex::new(())),
            handle: None,
        }
    }

    /// Start polling: one tick immediately, then one per interval.
    /// Calling `start` on a running poller does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        info!(
            source = %self.source.describe(),
            interval_secs = self.interval.as_secs(),
            "starting dashboard poller"
        );

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        let period = self.interval;

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                poll(source.as_ref(), &state, &in_flight).await;
            }
        }));
    }

    /// Stop the timer. No fetch starts after this returns.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("dashboard poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Poll once now, outside the timer
    pub async fn refresh(&self) -> PollOutcome {
        poll(self.source.as_ref(), &self.state, &self.in_flight).await
    }

    /// Poll once on a background task so the caller is not held up by the
    /// fetch. Subject to the same in-flight gate as the timer.
    pub fn spawn_refresh(&self) -> JoinHandle<PollOutcome> {
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move { poll(source.as_ref(), &state, &in_flight).await })
    }

    /// Normalize a batch and replace the current state with it
    pub fn apply_snapshot(&self, raw: &RawResults) {
        apply_snapshot(&self.state, raw);
    }

    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }
}

impl Drop for DashboardPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn poll(
    source: &dyn MetricsSource,
    state: &watch::Sender<DashboardState>,
    in_flight: &Mutex<()>,
) -> PollOutcome {
    let Ok(_guard) = in_flight.try_lock() else {
        debug!("previous poll still in flight, skipping");
        return PollOutcome::Skipped;
    };

    match source.fetch().await {
        Ok(raw) => {
            apply_snapshot(state, &raw);
            PollOutcome::Applied
        }
        Err(e) => {
            warn!(error = %e, "poll failed, keeping last view model");
            let message = e.to_string();
            state.send_modify(|current| {
                current.last_error = Some(message.clone());
                current.failures += 1;
            });
            PollOutcome::Failed(message)
        }
    }
}

fn apply_snapshot(state: &watch::Sender<DashboardState>, raw: &RawResults) {
    let view = normalize(raw);
    debug!(problems = view.problems().count(), "applying dashboard snapshot");

    // Counters are read and written under the same lock as the swap
    state.send_modify(|current| {
        *current = DashboardState {
            loading: false,
            view,
            last_success: Some(Utc::now()),
            last_error: None,
            successes: current.successes + 1,
            failures: current.failures,
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::{DispatchError, MockMetricsSource};
    use crate::core::test_support::canned_results;
    use crate::utils::constants::POLL_INTERVAL;
    use async_trait::async_trait;
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
        delay: Option<Duration>,
    }

    impl CountingSource {
        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn fetch(&self) -> Result<RawResults, DispatchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(canned_results())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_initial_state_is_zero_state() {
        let poller = DashboardPoller::new(Arc::new(MockMetricsSource::new()), POLL_INTERVAL);
        let state = poller.current();

        assert!(state.loading);
        assert_eq!(state.view, DashboardViewModel::default());
        assert!(state.last_success.is_none());
        assert!(state.age().is_none());
    }

    #[test]
    fn test_apply_snapshot_replaces_view() {
        let poller = DashboardPoller::new(Arc::new(MockMetricsSource::new()), POLL_INTERVAL);

        poller.apply_snapshot(&canned_results());
        let state = poller.current();

        assert!(!state.loading);
        assert_eq!(state.view, normalize(&canned_results()));
        assert_eq!(state.successes, 1);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_last_good_view() {
        let mut source = MockMetricsSource::new();
        let mut seq = Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(canned_results()));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(DispatchError::AllFailed(9)));

        let poller = DashboardPoller::new(Arc::new(source), POLL_INTERVAL);

        assert_eq!(poller.refresh().await, PollOutcome::Applied);
        let good = poller.current();

        assert!(matches!(poller.refresh().await, PollOutcome::Failed(_)));
        let after = poller.current();

        assert_eq!(after.view, good.view);
        assert_eq!(after.last_success, good.last_success);
        assert_eq!(after.last_error.as_deref(), Some("all 9 queries failed"));
        assert_eq!(after.failures, 1);
    }

    #[tokio::test]
    async fn test_failure_before_first_success_stays_loading() {
        let mut source = MockMetricsSource::new();
        source
            .expect_fetch()
            .returning(|| Err(DispatchError::AllFailed(9)));

        let poller = DashboardPoller::new(Arc::new(source), POLL_INTERVAL);
        poller.refresh().await;

        let state = poller.current();
        assert!(state.loading);
        assert_eq!(state.view, DashboardViewModel::default());
    }

    #[tokio::test]
    async fn test_snapshot_after_failure_keeps_failure_count() {
        let mut source = MockMetricsSource::new();
        source
            .expect_fetch()
            .returning(|| Err(DispatchError::AllFailed(9)));

        let poller = DashboardPoller::new(Arc::new(source), POLL_INTERVAL);
        poller.refresh().await;
        poller.apply_snapshot(&canned_results());

        let state = poller.current();
        assert_eq!(state.failures, 1);
        assert_eq!(state.successes, 1);
        assert!(state.last_error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_refresh_runs_in_background() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_secs(8)),
            ..Default::default()
        });
        let poller = DashboardPoller::new(source.clone(), POLL_INTERVAL);

        let task = poller.spawn_refresh();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.fetches(), 1);
        assert!(poller.current().loading);

        // A timer tick or second refresh while this one runs is skipped
        assert_eq!(poller.refresh().await, PollOutcome::Skipped);

        assert_eq!(task.await.unwrap(), PollOutcome::Applied);
        assert!(!poller.current().loading);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_snapshot() {
        let mut source = MockMetricsSource::new();
        source.expect_fetch().returning(|| Ok(canned_results()));

        let poller = DashboardPoller::new(Arc::new(source), POLL_INTERVAL);
        let mut rx = poller.subscribe();

        poller.refresh().await;
        rx.changed().await.unwrap();

        assert!(!rx.borrow_and_update().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_start_and_every_interval() {
        let source = Arc::new(CountingSource::default());
        let mut poller = DashboardPoller::new(source.clone(), POLL_INTERVAL);

        poller.start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(source.fetches(), 1);

        tokio::time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(source.fetches(), 2);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_poller_does_not_fetch_again() {
        let source = Arc::new(CountingSource::default());
        let mut poller = DashboardPoller::new(source.clone(), POLL_INTERVAL);

        poller.start();
        tokio::time::sleep(Duration::from_millis(30_000)).await;
        assert_eq!(source.fetches(), 1);

        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_poller_stops_timer() {
        let source = Arc::new(CountingSource::default());
        let mut poller = DashboardPoller::new(source.clone(), POLL_INTERVAL);

        poller.start();
        tokio::time::sleep(Duration::from_millis(30_000)).await;
        drop(poller);

        tokio::time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_while_in_flight_is_skipped() {
        let source = Arc::new(CountingSource {
            delay: Some(Duration::from_secs(90)),
            ..Default::default()
        });
        let mut poller = DashboardPoller::new(source.clone(), POLL_INTERVAL);

        poller.start();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(poller.refresh().await, PollOutcome::Skipped);
        assert_eq!(source.fetches(), 1);

        // The tick due at 60s waits for the slow fetch instead of overlapping it
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(source.fetches(), 1);
    }
}
