use crate::services::clock::Clock;
use crate::services::error::PipelineError;
use crate::services::progress::{PipelineEvent, ProgressReporter};
use crate::services::storage::{ObjectEntry, StorageService};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_wait: Duration,
    pub check_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(900),
            check_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Polling,
    Found,
    TimedOut,
    Errored(String),
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStatus::Polling)
    }
}

/// State of one polling loop. Only lives as long as the loop.
#[derive(Debug)]
pub struct PollState {
    target_key: String,
    started_at: Instant,
    settings: PollSettings,
    attempts: u32,
    status: PollStatus,
}

impl PollState {
    pub fn new(target_key: impl Into<String>, started_at: Instant, settings: PollSettings) -> Self {
        Self {
            target_key: target_key.into(),
            started_at,
            settings,
            attempts: 0,
            status: PollStatus::Polling,
        }
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }

    pub fn status(&self) -> &PollStatus {
        &self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn has_expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.settings.max_wait
    }

    /// Elapsed share of the wait window, capped at 1.0
    pub fn progress(&self, now: Instant) -> f64 {
        if self.settings.max_wait.is_zero() {
            return 1.0;
        }
        (self.elapsed(now).as_secs_f64() / self.settings.max_wait.as_secs_f64()).min(1.0)
    }

    /// Apply the result of one listing call.
    ///
    /// The listing is prefix filtered, so only an entry whose key equals the
    /// target exactly counts as found.
    pub fn record_listing(&mut self, listing: anyhow::Result<Vec<ObjectEntry>>) -> &PollStatus {
        if self.status.is_terminal() {
            return &self.status;
        }
        self.attempts += 1;

        match listing {
            Ok(entries) => {
                if entries.iter().any(|entry| entry.key == self.target_key) {
                    self.status = PollStatus::Found;
                }
            }
            Err(e) => {
                self.status = PollStatus::Errored(e.to_string());
            }
        }
        &self.status
    }

    pub fn expire(&mut self) {
        if !self.status.is_terminal() {
            self.status = PollStatus::TimedOut;
        }
    }
}

/// Object whose presence a poll has confirmed.
///
/// Only the poller creates these, and a download link needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundObject {
    key: String,
    attempts: u32,
    waited: Duration,
}

impl FoundObject {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found(FoundObject),
    TimedOut { attempts: u32, max_wait: Duration },
    Errored(String),
}

impl PollOutcome {
    pub fn into_result(self, key: &str) -> Result<FoundObject, PipelineError> {
        match self {
            PollOutcome::Found(found) => Ok(found),
            PollOutcome::TimedOut { max_wait, .. } => Err(PipelineError::PollTimeout {
                key: key.to_string(),
                waited_secs: max_wait.as_secs(),
            }),
            PollOutcome::Errored(reason) => Err(PipelineError::StorageListError(reason)),
        }
    }
}

pub struct ReadinessPoller {
    storage: Arc<dyn StorageService>,
    clock: Arc<dyn Clock>,
}

impl ReadinessPoller {
    pub fn new(storage: Arc<dyn StorageService>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Poll `bucket` until `key` exists, the wait window closes, or a listing
    /// call fails. The deadline is only checked before each listing, so the
    /// loop can run up to one interval past `max_wait`.
    pub async fn wait_for(
        &self,
        bucket: &str,
        key: &str,
        settings: PollSettings,
        progress: &dyn ProgressReporter,
    ) -> PollOutcome {
        let mut state = PollState::new(key, self.clock.now(), settings);
        progress.report(PipelineEvent::Progress { fraction: 0.0 });

        loop {
            let now = self.clock.now();
            if state.has_expired(now) {
                state.expire();
                break;
            }
            progress.report(PipelineEvent::Progress {
                fraction: state.progress(now),
            });

            let listing = self.storage.list_objects(bucket, key).await;
            if state.record_listing(listing).is_terminal() {
                break;
            }

            tracing::debug!(
                bucket,
                key,
                attempt = state.attempts(),
                elapsed_ms = state.elapsed(now).as_millis() as u64,
                "File not there yet"
            );
            self.clock.sleep(settings.check_interval).await;
        }

        let elapsed = state.elapsed(self.clock.now());
        match state.status {
            PollStatus::Found => {
                progress.report(PipelineEvent::Progress { fraction: 1.0 });
                tracing::info!(bucket, key, attempts = state.attempts, "File found");
                PollOutcome::Found(FoundObject {
                    key: state.target_key,
                    attempts: state.attempts,
                    waited: elapsed,
                })
            }
            PollStatus::Errored(reason) => {
                tracing::error!(bucket, key, "Unexpected error while checking storage: {}", reason);
                PollOutcome::Errored(reason)
            }
            PollStatus::TimedOut | PollStatus::Polling => {
                tracing::warn!(
                    bucket,
                    key,
                    attempts = state.attempts,
                    "Polling timed out after {}s",
                    settings.max_wait.as_secs()
                );
                PollOutcome::TimedOut {
                    attempts: state.attempts,
                    max_wait: settings.max_wait,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use crate::services::progress::NoProgress;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Answers listing calls from a script; the last answer repeats.
    struct ScriptedStorage {
        script: Mutex<Vec<Result<Vec<&'static str>, &'static str>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedStorage {
        fn new(script: Vec<Result<Vec<&'static str>, &'static str>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl StorageService for ScriptedStorage {
        async fn list_objects(&self, _bucket: &str, _prefix: &str) -> anyhow::Result<Vec<ObjectEntry>> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            let answer = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            answer
                .map(|keys| keys.into_iter().map(ObjectEntry::new).collect())
                .map_err(|e| anyhow::anyhow!(e))
        }

        async fn presign_get(&self, _: &str, _: &str, _: Duration) -> anyhow::Result<String> {
            unreachable!("poller never presigns")
        }

        async fn bucket_exists(&self, _: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    fn clock() -> Arc<ManualClock> {
        let wall = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Arc::new(ManualClock::new(wall))
    }

    fn settings(max_wait: u64, interval: u64) -> PollSettings {
        PollSettings {
            max_wait: Duration::from_secs(max_wait),
            check_interval: Duration::from_secs(interval),
        }
    }

    const KEY: &str = "transcription_@foo_20240101_120000.csv";

    #[test]
    fn test_state_progress_is_capped() {
        let start = Instant::now();
        let state = PollState::new(KEY, start, settings(100, 5));
        assert_eq!(state.progress(start), 0.0);
        assert!((state.progress(start + Duration::from_secs(25)) - 0.25).abs() < 1e-9);
        assert_eq!(state.progress(start + Duration::from_secs(500)), 1.0);
    }

    #[test]
    fn test_state_ignores_prefix_matches() {
        let mut state = PollState::new(KEY, Instant::now(), settings(100, 5));
        let partial = format!("{}.part", KEY);
        let status = state.record_listing(Ok(vec![ObjectEntry::new(partial)]));
        assert_eq!(status, &PollStatus::Polling);

        let status = state.record_listing(Ok(vec![ObjectEntry::new(KEY)]));
        assert_eq!(status, &PollStatus::Found);
        assert_eq!(state.attempts(), 2);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut state = PollState::new(KEY, Instant::now(), settings(100, 5));
        state.record_listing(Err(anyhow::anyhow!("boom")));
        state.record_listing(Ok(vec![ObjectEntry::new(KEY)]));
        state.expire();
        assert_eq!(state.status(), &PollStatus::Errored("boom".to_string()));
        assert_eq!(state.attempts(), 1);
    }

    #[tokio::test]
    async fn test_found_on_first_check_without_sleeping() {
        let storage = Arc::new(ScriptedStorage::new(vec![Ok(vec![KEY])]));
        let clock = clock();
        let poller = ReadinessPoller::new(storage.clone(), clock.clone());

        let outcome = poller
            .wait_for("bucket", KEY, PollSettings::default(), &NoProgress)
            .await;

        match outcome {
            PollOutcome::Found(found) => {
                assert_eq!(found.key(), KEY);
                assert_eq!(found.attempts(), 1);
            }
            other => panic!("expected found, got {:?}", other),
        }
        assert_eq!(clock.sleep_count(), 0);
        assert_eq!(storage.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_wait_times_out_without_listing() {
        let storage = Arc::new(ScriptedStorage::new(vec![Ok(vec![KEY])]));
        let poller = ReadinessPoller::new(storage.clone(), clock());

        let outcome = poller
            .wait_for("bucket", KEY, settings(0, 5), &NoProgress)
            .await;

        assert_eq!(
            outcome,
            PollOutcome::TimedOut {
                attempts: 0,
                max_wait: Duration::ZERO
            }
        );
        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_listing_error_stops_after_one_attempt() {
        let storage = Arc::new(ScriptedStorage::new(vec![Err("AccessDenied")]));
        let clock = clock();
        let poller = ReadinessPoller::new(storage.clone(), clock.clone());

        let outcome = poller
            .wait_for("bucket", KEY, PollSettings::default(), &NoProgress)
            .await;

        assert_eq!(outcome, PollOutcome::Errored("AccessDenied".to_string()));
        assert_eq!(storage.calls(), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_non_matching_contents_time_out() {
        let noise = "transcription_@foo_20240101_120000.csv.tmp";
        let storage = Arc::new(ScriptedStorage::new(vec![Ok(vec![noise])]));
        let clock = clock();
        let poller = ReadinessPoller::new(storage.clone(), clock.clone());

        let outcome = poller
            .wait_for("bucket", KEY, PollSettings::default(), &NoProgress)
            .await;

        // 900s window checked every 5s: t = 0, 5, ..., 895
        assert_eq!(
            outcome,
            PollOutcome::TimedOut {
                attempts: 180,
                max_wait: Duration::from_secs(900)
            }
        );
        assert_eq!(storage.calls(), 180);
        assert_eq!(clock.elapsed(), Duration::from_secs(900));
    }

    #[tokio::test]
    async fn test_partial_last_interval_still_checks() {
        let storage = Arc::new(ScriptedStorage::new(vec![Ok(vec![])]));
        let poller = ReadinessPoller::new(storage.clone(), clock());

        poller
            .wait_for("bucket", KEY, settings(22, 5), &NoProgress)
            .await;

        // ceil(22 / 5): t = 0, 5, 10, 15, 20
        assert_eq!(storage.calls(), 5);
    }

    #[tokio::test]
    async fn test_progress_reports_elapsed_fraction() {
        let storage = Arc::new(ScriptedStorage::new(vec![
            Ok(vec![]),
            Ok(vec![]),
            Ok(vec![KEY]),
        ]));
        let poller = ReadinessPoller::new(storage, clock());
        let fractions = Mutex::new(Vec::new());
        let reporter = |event: PipelineEvent| {
            if let PipelineEvent::Progress { fraction } = event {
                fractions.lock().unwrap().push(fraction);
            }
        };

        let outcome = poller
            .wait_for("bucket", KEY, settings(20, 5), &reporter)
            .await;

        assert!(matches!(outcome, PollOutcome::Found(_)));
        assert_eq!(
            fractions.into_inner().unwrap(),
            vec![0.0, 0.0, 0.25, 0.5, 1.0]
        );
    }

    #[test]
    fn test_outcome_into_result() {
        let timed_out = PollOutcome::TimedOut {
            attempts: 3,
            max_wait: Duration::from_secs(15),
        };
        assert_eq!(
            timed_out.into_result(KEY),
            Err(PipelineError::PollTimeout {
                key: KEY.to_string(),
                waited_secs: 15
            })
        );
        assert_eq!(
            PollOutcome::Errored("x".to_string()).into_result(KEY),
            Err(PipelineError::StorageListError("x".to_string()))
        );
    }
}
