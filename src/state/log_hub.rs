//! Per-run log channels
//!
//! One broadcast channel per run. The CLI printer and SSE subscribers attach
//! here. Finishing a run drops its sender, so subscribers drain whatever is
//! buffered and then see the channel close.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::config::env::constants::LOG_CHANNEL_CAPACITY;
use crate::domain::LogLine;

pub struct LogHub {
    channels: RwLock<HashMap<String, broadcast::Sender<LogLine>>>,
}

impl LogHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create the channel for a run, or return the existing sender
    pub async fn create(&self, run_id: &str) -> broadcast::Sender<LogLine> {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(run_id) {
            return sender.clone();
        }

        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        channels.insert(run_id.to_string(), sender.clone());
        sender
    }

    /// Subscribe to a run's live logs; `None` once the run has finished
    pub async fn subscribe(&self, run_id: &str) -> Option<broadcast::Receiver<LogLine>> {
        let channels = self.channels.read().await;
        channels.get(run_id).map(|s| s.subscribe())
    }

    pub async fn sender(&self, run_id: &str) -> Option<broadcast::Sender<LogLine>> {
        let channels = self.channels.read().await;
        channels.get(run_id).cloned()
    }

    /// Drop a run's channel. Existing receivers drain buffered lines and see
    /// the close once the last sender clone is gone.
    pub async fn finish(&self, run_id: &str) {
        let mut channels = self.channels.write().await;
        channels.remove(run_id);
    }

    pub async fn count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_subscribe() {
        let hub = LogHub::new();

        let sender = hub.create("run-1").await;
        let mut receiver = hub.subscribe("run-1").await.unwrap();

        let _ = sender.send(LogLine::stdout(">>> git fetch origin"));

        let line = receiver.recv().await.unwrap();
        assert_eq!(line.stream, "stdout");
        assert_eq!(line.content, ">>> git fetch origin");
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let hub = LogHub::new();
        let first = hub.create("run-1").await;
        let mut rx = first.subscribe();

        // second create must hand back the same channel
        let second = hub.create("run-1").await;
        let _ = second.send(LogLine::stderr("warning"));
        assert_eq!(rx.recv().await.unwrap().content, "warning");
        assert_eq!(hub.count().await, 1);
    }

    #[tokio::test]
    async fn test_finish_closes_subscribers() {
        let hub = LogHub::new();

        let sender = hub.create("run-1").await;
        let mut rx = hub.subscribe("run-1").await.unwrap();

        let _ = sender.send(LogLine::stdout("last line"));
        hub.finish("run-1").await;
        drop(sender);

        // buffered line still delivered, then the channel closes
        assert_eq!(rx.recv().await.unwrap().content, "last line");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        // no late subscriptions
        assert!(hub.subscribe("run-1").await.is_none());
    }
}
