use std::time::Duration;

/// Fixed pause between consecutive documents.
///
/// Keeps the batch under the summarization backend's rate limit. The
/// orchestrator only waits *between* documents, never after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacingPolicy {
    delay: Duration,
}

impl PacingPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::fixed(Duration::from_secs(secs))
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the configured delay (no-op when zero).
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tracing::debug!(delay_ms = self.delay.as_millis(), "Pacing before next document");
            tokio::time::sleep(self.delay).await;
        }
    }
}
