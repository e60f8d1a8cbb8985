//! Structured progress reporting for pipeline runs.
//!
//! Summarizing a long document takes many model calls; the reporter lets the
//! CLI show where a run is without the pipeline knowing about terminals.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted while documents move through the pipeline.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Phase: "discover", "read", "chunk", "map", "combine", "transform", "write"
    pub phase: String,

    /// Current progress (documents found, chunks summarized, ...)
    pub current: u64,

    /// Total expected work (if known)
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    /// Human-readable message
    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a single user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let event = event.with_elapsed(elapsed);

            tracing::debug!(
                phase = %event.phase,
                current = event.current,
                total = ?event.total,
                message = %event.message,
                elapsed_secs = elapsed,
                "Progress event"
            );

            callback(event);
        }
    }

    pub fn discover(&self, found: u64, dir: &str) {
        self.emit(ProgressEvent::new(
            "discover",
            found,
            None,
            format!("{} documents in {}", found, dir),
        ));
    }

    pub fn read(&self, current: u64, total: u64, document: &str) {
        self.emit(ProgressEvent::new(
            "read",
            current,
            Some(total),
            format!("reading {}", document),
        ));
    }

    pub fn chunk(&self, chunks: u64, document: &str) {
        self.emit(ProgressEvent::new(
            "chunk",
            chunks,
            None,
            format!("{} chunks from {}", chunks, document),
        ));
    }

    pub fn map(&self, done: u64, total: u64) {
        self.emit(ProgressEvent::new(
            "map",
            done,
            Some(total),
            "chunk summaries".to_string(),
        ));
    }

    pub fn combine(&self, level: u64, groups: u64) {
        let message = if level == 0 {
            "final combine".to_string()
        } else {
            format!("collapse level {} ({} groups)", level, groups)
        };
        self.emit(ProgressEvent::new("combine", level, None, message));
    }

    pub fn transform(&self, artifact: &str, attempt: u64) {
        self.emit(ProgressEvent::new(
            "transform",
            attempt,
            None,
            format!("generating {}", artifact),
        ));
    }

    pub fn write(&self, path: &str) {
        self.emit(ProgressEvent::new("write", 1, None, format!("wrote {}", path)));
    }
}
