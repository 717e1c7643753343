//! Progress reporting and cancellation for long-running batches

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Progress event emitted after each processed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Name of the batch (e.g. "auto_map")
    pub operation: String,
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
    /// Item just processed
    pub item: Option<String>,
}

/// Shared cancellation flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Batches stop before their next item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Caller-supplied progress channel and cancellation token for a batch
#[derive(Debug, Clone, Default)]
pub struct BatchControl {
    progress: Option<UnboundedSender<Progress>>,
    cancel: CancellationToken,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send progress events to `sender`
    pub fn with_progress(mut self, sender: UnboundedSender<Progress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report that `current` of `total` items are done
    pub fn report(&self, operation: &str, current: usize, total: usize, item: Option<&str>) {
        let Some(sender) = &self.progress else {
            return;
        };

        let percentage = if total == 0 {
            100
        } else {
            ((current * 100) as f64 / total as f64).round() as u8
        };

        // a dropped receiver only means nobody is listening any more
        let _ = sender.send(Progress {
            operation: operation.to_string(),
            current,
            total,
            percentage,
            item: item.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let control = BatchControl::new().with_cancellation(token.clone());

        assert!(!control.is_cancelled());
        token.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn test_report_sends_percentage() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let control = BatchControl::new().with_progress(sender);

        control.report("auto_map", 1, 3, Some("Mango Cooler"));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.current, 1);
        assert_eq!(event.total, 3);
        assert_eq!(event.percentage, 33);
        assert_eq!(event.item.as_deref(), Some("Mango Cooler"));
    }
}
