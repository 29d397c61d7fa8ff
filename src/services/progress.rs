use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use utoipa::ToSchema;

/// Stage changes and progress of one extraction request.
///
/// `Progress` carries elapsed time over the poll deadline, in [0, 1]. The
/// backend job exposes no progress of its own, so this is only an
/// approximation of how long is left to wait.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineEvent {
    Accepted { filename: String },
    Waiting { key: String },
    Progress { fraction: f64 },
    Ready { key: String },
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Accepted { .. } => "accepted",
            PipelineEvent::Waiting { .. } => "waiting",
            PipelineEvent::Progress { .. } => "progress",
            PipelineEvent::Ready { .. } => "ready",
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: PipelineEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(PipelineEvent) + Send + Sync,
{
    fn report(&self, event: PipelineEvent) {
        self(event)
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: PipelineEvent) {}
}

/// Writes events to the log, progress only every ten percent
pub struct LogProgress {
    last_decile: AtomicU32,
}

impl LogProgress {
    pub fn new() -> Self {
        Self {
            last_decile: AtomicU32::new(0),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Accepted { filename } => {
                tracing::info!("📨 Extraction accepted, output file '{}'", filename);
            }
            PipelineEvent::Waiting { key } => {
                tracing::info!("⏳ Waiting for '{}' ...", key);
            }
            PipelineEvent::Progress { fraction } => {
                let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
                if decile > self.last_decile.fetch_max(decile, Ordering::SeqCst) {
                    tracing::info!("⌛ {}% of the wait window elapsed", decile * 10);
                }
            }
            PipelineEvent::Ready { key } => {
                tracing::info!("✅ File ready: {}", key);
            }
        }
    }
}
