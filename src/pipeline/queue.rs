// Bounded ingestion queue between parsers and the aggregation task

use crate::error::{Result, TailstatError};
use crate::parser::{parse_line, LineOutcome};
use chrono::Utc;
use tokio::sync::mpsc;

/// Capacity of the ingestion queue. Producers wait once it is full.
pub const QUEUE_CAPACITY: usize = 10_000;

/// Receiving end, owned by the aggregation task
pub type QueueReceiver = mpsc::Receiver<LineOutcome>;

/// Create an ingestion queue with the standard capacity
pub fn ingestion_queue() -> (Producer, QueueReceiver) {
    ingestion_queue_with_capacity(QUEUE_CAPACITY)
}

/// Create an ingestion queue with an explicit capacity
pub fn ingestion_queue_with_capacity(capacity: usize) -> (Producer, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (Producer { tx }, rx)
}

/// Cloneable handle for one ingestion task.
///
/// Lines are parsed on the producer side so the aggregation task only ever
/// does bookkeeping.
#[derive(Debug, Clone)]
pub struct Producer {
    tx: mpsc::Sender<LineOutcome>,
}

impl Producer {
    /// Parse a raw line and queue the outcome, waiting while the queue is full
    pub async fn submit_line(&self, line: &str) -> Result<()> {
        self.send(parse_line(line, Utc::now())).await
    }

    /// Queue an already parsed outcome, waiting while the queue is full
    pub async fn send(&self, outcome: LineOutcome) -> Result<()> {
        self.tx
            .send(outcome)
            .await
            .map_err(|_| TailstatError::Pipeline("Ingestion queue closed".to_string()))
    }

    /// True once the aggregation task has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_queue_length_tracks_pending_lines() {
        let (producer, mut rx) = ingestion_queue_with_capacity(8);
        assert_eq!(rx.len(), 0);

        producer.submit_line("a b").await.unwrap();
        producer
            .submit_line("\"2024-05-01T00:00:00Z\" INFO a b ok")
            .await
            .unwrap();
        assert_eq!(rx.len(), 2);

        assert!(rx.recv().await.unwrap().is_err());
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let (producer, mut rx) = ingestion_queue_with_capacity(2);
        producer.submit_line("one").await.unwrap();
        producer.submit_line("two").await.unwrap();

        // Third send must wait until a slot frees up
        let blocked = tokio::time::timeout(Duration::from_millis(50), producer.submit_line("three")).await;
        assert!(blocked.is_err());

        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_millis(50), producer.submit_line("three"))
            .await
            .expect("slot freed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (producer, rx) = ingestion_queue_with_capacity(2);
        drop(rx);
        assert!(producer.is_closed());
        assert!(producer.submit_line("x").await.is_err());
    }
}
