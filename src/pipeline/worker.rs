// Aggregation task: single owner of the engine, fed by the ingestion queue
// and publishing one snapshot per tick

use crate::engine::{Aggregator, Snapshot, ThresholdPolicy, WindowPolicy};
use crate::pipeline::queue::{ingestion_queue, Producer, QueueReceiver};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Fixed recompute-and-publish cadence
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Receiving end of the snapshot hand-off, consumed by the display sink
pub type SnapshotReceiver = mpsc::Receiver<Snapshot>;

/// Running aggregation pipeline
pub struct Pipeline {
    /// Kept so new producers can be handed out at any time
    producer: Producer,
    /// Stops the aggregation task
    stop_tx: Option<oneshot::Sender<()>>,
    /// Handle to the aggregation task
    worker_handle: Option<tokio::task::JoinHandle<WorkerStats>>,
}

impl Pipeline {
    /// Spawn the aggregation task with the default window policy
    pub fn spawn(debug: bool) -> (Self, SnapshotReceiver) {
        Self::spawn_with_policy(debug, ThresholdPolicy)
    }

    /// Spawn the aggregation task with a custom window policy
    pub fn spawn_with_policy<P>(debug: bool, policy: P) -> (Self, SnapshotReceiver)
    where
        P: WindowPolicy + 'static,
    {
        let (producer, queue_rx) = ingestion_queue();
        // One slot: the task waits at the next publish until the sink has
        // taken the previous frame
        let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();

        let aggregator = Aggregator::with_policy(Utc::now(), policy);
        let worker_handle = Some(tokio::spawn(async move {
            aggregation_worker(aggregator, queue_rx, snapshot_tx, stop_rx, debug).await
        }));

        (
            Self {
                producer,
                stop_tx: Some(stop_tx),
                worker_handle,
            },
            snapshot_rx,
        )
    }

    /// Handle for an ingestion task
    pub fn producer(&self) -> Producer {
        self.producer.clone()
    }

    /// Stop the aggregation task and wait for it to exit
    pub async fn shutdown(mut self) -> WorkerStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match self.worker_handle.take() {
            Some(handle) => {
                tracing::info!("Waiting for aggregation task to stop...");
                let stats = handle.await.unwrap_or_default();
                tracing::info!(
                    "Aggregation task stopped: {} records, {} ticks",
                    stats.records,
                    stats.ticks
                );
                stats
            }
            None => WorkerStats::default(),
        }
    }
}

/// Totals reported by the aggregation task when it exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub records: u64,
    pub ticks: u64,
}

/// Consume records until the next tick fires, then publish a snapshot.
///
/// Records that arrive while a snapshot is being computed wait in the queue
/// and land in the following tick.
async fn aggregation_worker<P: WindowPolicy>(
    mut aggregator: Aggregator<P>,
    mut queue_rx: QueueReceiver,
    snapshot_tx: mpsc::Sender<Snapshot>,
    mut stop_rx: oneshot::Receiver<()>,
    debug: bool,
) -> WorkerStats {
    let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = WorkerStats::default();
    let mut queue_open = true;

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                tracing::debug!("Aggregation task received stop");
                break;
            }

            _ = ticker.tick() => {
                let depth = debug.then(|| queue_rx.len());
                let snapshot = aggregator.tick(Utc::now(), depth);
                stats.ticks += 1;

                tracing::trace!(
                    "Tick {}: {} in window, {} entries/sec",
                    stats.ticks,
                    snapshot.total_in_window,
                    snapshot.current_rate
                );

                // Publishing can wait on a slow sink, but never past a stop
                tokio::select! {
                    sent = snapshot_tx.send(snapshot) => {
                        if sent.is_err() {
                            tracing::info!("Display sink closed, stopping aggregation");
                            break;
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }

            outcome = queue_rx.recv(), if queue_open => {
                match outcome {
                    Some(outcome) => {
                        stats.records += 1;
                        aggregator.observe(outcome);
                    }
                    None => {
                        tracing::debug!("All producers gone; ticking on the current window");
                        queue_open = false;
                    }
                }
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipeline_creation() {
        let (pipeline, _snapshots) = Pipeline::spawn(false);
        assert!(!pipeline.producer().is_closed());

        // Clean shutdown before any tick
        let stats = pipeline.shutdown().await;
        assert_eq!(stats.ticks, 0);
    }

    #[tokio::test]
    async fn test_stop_while_sink_is_slow() {
        let (pipeline, snapshots) = Pipeline::spawn(false);

        // Nobody reads: the second publish blocks until shutdown interrupts it
        tokio::time::sleep(Duration::from_millis(2300)).await;
        let stats = pipeline.shutdown().await;
        assert!(stats.ticks >= 2);
        drop(snapshots);
    }
}
