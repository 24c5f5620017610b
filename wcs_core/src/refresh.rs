//! Keeps the current schedule snapshot of one street up to date.
//!
//! Only one refresh runs at a time. A refresh requested while another one is in
//! flight waits for it and returns its outcome instead of fetching again.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    time::{interval, MissedTickBehavior},
};

use crate::{
    client::ScheduleSource,
    config::{ConfigError, ScheduleConfig},
    snapshot::{normalize, ScheduleSnapshot},
};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RefreshError {
    /// No snapshot has been produced yet.
    #[error("the schedule is not available yet: {0}")]
    NotReady(String),
    /// The refresh failed, the previous snapshot is still served.
    #[error("the schedule could not be refreshed: {0}")]
    Stale(String),
}

impl RefreshError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RefreshError::NotReady(_))
    }
}

impl From<ConfigError> for RefreshError {
    fn from(value: ConfigError) -> Self {
        RefreshError::NotReady(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Idle,
    Fetching,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshFailure {
    pub at: DateTime<Local>,
    pub error: String,
}

/// What consumers see. Replaced as a whole on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshState {
    pub status: RefreshStatus,
    pub snapshot: Option<Arc<ScheduleSnapshot>>,
    pub last_success: Option<DateTime<Local>>,
    pub last_failure: Option<RefreshFailure>,
}

impl RefreshState {
    fn idle() -> Self {
        Self {
            status: RefreshStatus::Idle,
            snapshot: None,
            last_success: None,
            last_failure: None,
        }
    }

    /// The outcome of the last finished refresh.
    fn outcome(&self) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        match (&self.snapshot, &self.last_failure) {
            (None, Some(failure)) => Err(RefreshError::NotReady(failure.error.clone())),
            (None, None) => Err(RefreshError::NotReady(String::from("no refresh has finished"))),
            (Some(_), Some(failure)) if self.status == RefreshStatus::Failed => {
                Err(RefreshError::Stale(failure.error.clone()))
            }
            (Some(snapshot), _) => Ok(snapshot.clone()),
        }
    }
}

pub struct Refresher<S> {
    source: S,
    config: ScheduleConfig,
    refresh_lock: Mutex<()>,
    finished_refreshes: AtomicU64,
    state: watch::Sender<Arc<RefreshState>>,
}

impl<S: ScheduleSource> Refresher<S> {
    pub fn new(source: S, config: ScheduleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(Arc::new(RefreshState::idle()));
        Ok(Self {
            source,
            config,
            refresh_lock: Mutex::new(()),
            finished_refreshes: AtomicU64::new(0),
            state,
        })
    }

    /// Create a refresher and run its first refresh.
    ///
    /// Fails with [`RefreshError::NotReady`] if no snapshot could be produced.
    pub async fn start(source: S, config: ScheduleConfig) -> Result<Self, RefreshError> {
        let refresher = Self::new(source, config)?;
        refresher.refresh().await?;
        Ok(refresher)
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// The current state.
    pub fn state(&self) -> Arc<RefreshState> {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<ScheduleSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    /// Get notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RefreshState>> {
        self.state.subscribe()
    }

    /// Fetch, parse and normalize the schedule and publish the result.
    ///
    /// On failure the previous snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<ScheduleSnapshot>, RefreshError> {
        let observed = self.finished_refreshes.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;
        if self.finished_refreshes.load(Ordering::Acquire) != observed {
            log::debug!("joined a refresh that was already in flight");
            return self.state().outcome();
        }

        let previous = self.state.borrow().status;
        self.publish(|state| state.status = RefreshStatus::Fetching);
        let cancel_guard = CancelGuard {
            state: &self.state,
            previous: Some(previous),
        };
        let result = self
            .source
            .fetch_entries(&self.config.municipality_id, &self.config.street)
            .await;
        cancel_guard.disarm();
        let now = Local::now();
        let outcome = match result {
            Ok(entries) => {
                let snapshot = Arc::new(normalize(entries, now.date_naive()).retrieved(now));
                log::info!(
                    "refreshed the schedule of {}: {} dates, next collection {:?}",
                    self.config.street,
                    snapshot.total_dates(),
                    snapshot.next_collection.as_ref().map(|next| next.date)
                );
                self.publish(|state| {
                    state.status = RefreshStatus::Ready;
                    state.snapshot = Some(snapshot.clone());
                    state.last_success = Some(now);
                });
                Ok(snapshot)
            }
            Err(err) => {
                let error = format!("{err:#}");
                log::error!("error refreshing the schedule of {}: {error}", self.config.street);
                self.publish(|state| {
                    state.status = RefreshStatus::Failed;
                    state.last_failure = Some(RefreshFailure {
                        at: now,
                        error: error.clone(),
                    });
                });
                Err(match self.snapshot() {
                    Some(_) => RefreshError::Stale(error),
                    None => RefreshError::NotReady(error),
                })
            }
        };
        self.finished_refreshes.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Refresh on every tick of the configured interval, forever.
    ///
    /// The first tick is skipped since [`Refresher::start`] already refreshed.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = self.refresh().await {
                log::warn!("scheduled refresh failed: {err}");
            }
        }
    }

    fn publish(&self, modify: impl FnOnce(&mut RefreshState)) {
        publish(&self.state, modify);
    }
}

/// Publish a modified copy of the state.
fn publish(state: &watch::Sender<Arc<RefreshState>>, modify: impl FnOnce(&mut RefreshState)) {
    let mut next = RefreshState::clone(&state.borrow());
    modify(&mut next);
    state.send_replace(Arc::new(next));
}

/// Puts the status from before a refresh back if the refresh is dropped mid-fetch.
struct CancelGuard<'a> {
    state: &'a watch::Sender<Arc<RefreshState>>,
    previous: Option<RefreshStatus>,
}

impl CancelGuard<'_> {
    fn disarm(mut self) {
        self.previous = None;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            log::warn!("refresh was cancelled before it finished");
            publish(self.state, |state| state.status = previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        str::FromStr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::time::{sleep, timeout};

    use crate::{
        client::ScheduleSource,
        config::{ConfigError, ScheduleConfig},
        refresh::{RefreshError, RefreshStatus, Refresher},
        schedule::RawCollectionEntry,
        waste_type::WasteType,
    };

    /// Replays scripted results, then keeps failing.
    #[derive(Default)]
    struct ScriptedSource {
        results: Mutex<VecDeque<Result<Vec<RawCollectionEntry>, String>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<Vec<RawCollectionEntry>, String>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ScheduleSource for ScriptedSource {
        async fn fetch_entries(
            &self,
            _municipality_id: &str,
            _street: &str,
        ) -> Result<Vec<RawCollectionEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.results.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(String::from("script exhausted")))
                .map_err(|err| anyhow!(err))
        }
    }

    fn entry(date: &str, waste_type: WasteType) -> RawCollectionEntry {
        RawCollectionEntry {
            date: NaiveDate::from_str(date).unwrap(),
            weekday: None,
            waste_type: Some(waste_type),
            label: String::from(waste_type.label()),
            color: String::from(waste_type.color()),
            color_mismatch: false,
        }
    }

    fn get_test_config() -> ScheduleConfig {
        ScheduleConfig::new("101", "Leśna")
    }

    fn calls(refresher: &Refresher<ScriptedSource>) -> usize {
        refresher.source.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_start_publishes_snapshot() {
        let source = ScriptedSource::new(vec![Ok(vec![entry("2099-01-07", WasteType::Glass)])]);
        let refresher = Refresher::start(source, get_test_config()).await.unwrap();
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Ready);
        assert!(state.last_success.is_some());
        assert!(state.last_failure.is_none());
        let snapshot = refresher.snapshot().unwrap();
        assert!(snapshot.retrieved_at.is_some());
        assert_eq!(
            snapshot.next_collection.as_ref().unwrap().waste_type,
            WasteType::Glass
        );
    }

    #[tokio::test]
    async fn test_start_with_empty_schedule() {
        let source = ScriptedSource::new(vec![Ok(vec![])]);
        let refresher = Refresher::start(source, get_test_config()).await.unwrap();
        let snapshot = refresher.snapshot().unwrap();
        assert_eq!(snapshot.waste_types.len(), 6);
        assert!(snapshot.next_collection.is_none());
    }

    #[tokio::test]
    async fn test_first_failure_is_not_ready() {
        let source = ScriptedSource::new(vec![Err(String::from("connection reset"))]);
        let err = Refresher::start(source, get_test_config())
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
        assert!(matches!(err, RefreshError::NotReady(message) if message == "connection reset"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_ready() {
        let source = ScriptedSource::new(vec![]);
        assert!(matches!(
            Refresher::new(source, ScheduleConfig::new("101", "")),
            Err(ConfigError::EmptyStreet)
        ));
        let source = ScriptedSource::new(vec![]);
        let err = Refresher::start(source, ScheduleConfig::new("", "Leśna"))
            .await
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_later_failure_keeps_snapshot() {
        let source = ScriptedSource::new(vec![
            Ok(vec![entry("2099-01-07", WasteType::Paper)]),
            Err(String::from("timed out")),
            Ok(vec![entry("2099-01-08", WasteType::Ash)]),
        ]);
        let refresher = Refresher::start(source, get_test_config()).await.unwrap();
        let first = refresher.snapshot().unwrap();

        let err = refresher.refresh().await.unwrap_err();
        assert_eq!(err, RefreshError::Stale(String::from("timed out")));
        assert!(!err.is_fatal());
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Failed);
        assert_eq!(state.last_failure.as_ref().unwrap().error, "timed out");
        assert!(Arc::ptr_eq(state.snapshot.as_ref().unwrap(), &first));

        let third = refresher.refresh().await.unwrap();
        assert!(!Arc::ptr_eq(&third, &first));
        assert_eq!(
            third.next_collection.as_ref().unwrap().waste_type,
            WasteType::Ash
        );
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Ready);
        assert!(state.last_failure.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_coalesced() {
        let source = ScriptedSource {
            delay: Duration::from_millis(50),
            ..ScriptedSource::new(vec![Ok(vec![entry("2099-01-07", WasteType::Mixed)])])
        };
        let refresher = Refresher::new(source, get_test_config()).unwrap();
        let (first, second) = tokio::join!(refresher.refresh(), refresher.refresh());
        assert_eq!(calls(&refresher), 1);
        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let source = ScriptedSource::new(vec![Ok(vec![]), Ok(vec![])]);
        let refresher = Refresher::start(source, get_test_config()).await.unwrap();
        let mut receiver = refresher.subscribe();
        refresher.refresh().await.unwrap();
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().status, RefreshStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_refresh_restores_status() {
        let source = ScriptedSource {
            delay: Duration::from_millis(200),
            ..ScriptedSource::new(vec![Ok(vec![entry("2099-01-07", WasteType::Paper)])])
        };
        let refresher = Refresher::new(source, get_test_config()).unwrap();

        let cancelled = timeout(Duration::from_millis(20), refresher.refresh()).await;
        assert!(cancelled.is_err());
        sleep(Duration::from_millis(400)).await;
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Idle);
        assert!(state.snapshot.is_none());
        assert!(state.last_failure.is_none());

        // the cancelled fetch did not count as finished, so this one fetches again
        let snapshot = refresher.refresh().await.unwrap();
        assert_eq!(calls(&refresher), 2);
        assert_eq!(
            snapshot.next_collection.as_ref().unwrap().waste_type,
            WasteType::Paper
        );

        let cancelled = timeout(Duration::from_millis(20), refresher.refresh()).await;
        assert!(cancelled.is_err());
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Ready);
        assert!(Arc::ptr_eq(state.snapshot.as_ref().unwrap(), &snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_every_tick() {
        let config = get_test_config().with_refresh_interval(Duration::from_secs(60 * 60));
        let source = ScriptedSource::new(vec![
            Ok(vec![entry("2099-01-07", WasteType::Glass)]),
            Err(String::from("timed out")),
            Ok(vec![entry("2099-01-08", WasteType::Ash)]),
        ]);
        let refresher = Arc::new(Refresher::start(source, config).await.unwrap());
        let first = refresher.snapshot().unwrap();
        let handle = tokio::spawn(refresher.clone().run());

        // the immediate first tick does not refresh
        sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(calls(&refresher), 1);

        sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(calls(&refresher), 2);
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Failed);
        assert!(Arc::ptr_eq(state.snapshot.as_ref().unwrap(), &first));

        sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(calls(&refresher), 3);
        let state = refresher.state();
        assert_eq!(state.status, RefreshStatus::Ready);
        assert_eq!(
            state.snapshot.as_ref().unwrap().next_collection.as_ref().unwrap().waste_type,
            WasteType::Ash
        );
        handle.abort();
    }
}
