use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Time source for the pipeline: a monotonic instant for deadlines, wall time
/// for filenames and link expiry, and the sleep used between storage checks.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn local_timestamp(&self) -> NaiveDateTime;

    fn utc_now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn local_timestamp(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on or advanced by hand.
///
/// Sleeping returns immediately after moving the clock forward, so a full
/// 900 second poll window runs in microseconds.
pub struct ManualClock {
    origin: Instant,
    wall_origin: NaiveDateTime,
    offset_nanos: AtomicU64,
    sleeps: AtomicUsize,
}

impl ManualClock {
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset_nanos: AtomicU64::new(0),
            sleeps: AtomicUsize::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn local_timestamp(&self) -> NaiveDateTime {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall_origin + offset
    }

    /// The wall origin read as UTC
    fn utc_now(&self) -> DateTime<Utc> {
        self.local_timestamp().and_utc()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}
