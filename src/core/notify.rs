use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Handle to the one chat message a batch keeps editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Outbound edge of the notifier. Production is the Telegram API; tests
/// plug in a recording sink.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<MessageRef>;
    async fn edit(&self, message: &MessageRef, text: &str) -> anyhow::Result<()>;
}

/// Content-aware edit throttle.
///
/// An edit goes out only when the rendered text changed AND the minimum
/// interval since the last edit has elapsed. Unchanged text never edits;
/// changed text arriving under the floor is held as pending and released
/// when the floor elapses, so updates are deferred rather than dropped.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_text: String,
    last_edit: Instant,
    pending: Option<String>,
}

impl Throttle {
    pub fn new(min_interval: Duration, initial_text: String, now: Instant) -> Self {
        Self {
            min_interval,
            last_text: initial_text,
            last_edit: now,
            pending: None,
        }
    }

    /// Offer a newly rendered text. Returns the text to edit with now, if
    /// any; otherwise the text is either identical (dropped) or pending.
    pub fn offer(&mut self, text: &str, now: Instant) -> Option<String> {
        if text == self.last_text {
            // Content converged back to what is already shown.
            self.pending = None;
            return None;
        }
        if now.duration_since(self.last_edit) >= self.min_interval {
            self.pending = None;
            self.last_text = text.to_string();
            self.last_edit = now;
            return Some(text.to_string());
        }
        self.pending = Some(text.to_string());
        None
    }

    /// When a deferred text is waiting, the instant it becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|_| self.last_edit + self.min_interval)
    }

    /// Release the pending text if its floor has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        if now.duration_since(self.last_edit) < self.min_interval {
            return None;
        }
        let text = self.pending.take()?;
        self.last_text = text.clone();
        self.last_edit = now;
        Some(text)
    }

    /// Terminal transition: bypass the interval floor, edit on any change.
    pub fn force(&mut self, text: &str, now: Instant) -> Option<String> {
        self.pending = None;
        if text == self.last_text {
            return None;
        }
        self.last_text = text.to_string();
        self.last_edit = now;
        Some(text.to_string())
    }
}

/// Owns the batch's status message and pushes throttled edits through the
/// sink. Edit failures are logged, never fatal to the worker.
pub struct Notifier {
    sink: Arc<dyn StatusSink>,
    message: MessageRef,
    throttle: Throttle,
}

impl Notifier {
    /// Send the initial status message and start throttling from now.
    pub async fn open(
        sink: Arc<dyn StatusSink>,
        initial_text: String,
        min_interval: Duration,
    ) -> anyhow::Result<Self> {
        let message = sink
            .send(&initial_text)
            .await
            .context("send initial status message")?;
        Ok(Self {
            sink,
            message,
            throttle: Throttle::new(min_interval, initial_text, Instant::now()),
        })
    }

    pub async fn update(&mut self, text: String) {
        if let Some(due) = self.throttle.offer(&text, Instant::now()) {
            self.edit(&due).await;
        }
    }

    /// Instant at which a deferred update must be flushed, if one waits.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    pub async fn flush_due(&mut self) {
        if let Some(due) = self.throttle.take_due(Instant::now()) {
            self.edit(&due).await;
        }
    }

    /// Terminal render (job finalized, batch complete): edit immediately
    /// whenever the content changed.
    pub async fn finalize(&mut self, text: String) {
        if let Some(due) = self.throttle.force(&text, Instant::now()) {
            self.edit(&due).await;
        }
    }

    async fn edit(&self, text: &str) {
        if let Err(e) = self.sink.edit(&self.message, text).await {
            warn!(error = %format!("{e:#}"), "status message edit failed");
        }
    }
}
