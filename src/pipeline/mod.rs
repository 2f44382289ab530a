// Pipeline module: ingestion queue, aggregation task and the watch loop that
// wires a log source to the display sink

mod queue;
mod signals;
mod worker;

pub use queue::{
    ingestion_queue, ingestion_queue_with_capacity, Producer, QueueReceiver, QUEUE_CAPACITY,
};
pub use signals::{SignalHandler, StopSignal};
pub use worker::{Pipeline, SnapshotReceiver, WorkerStats, TICK_PERIOD};

use crate::config::Config;
use crate::display::{display_worker, DisplayMode};
use crate::error::{Result, TailstatError};
use crate::source::LogSource;
use std::io::Write;

/// Runs one log source through the pipeline until a stop signal
pub struct Watcher {
    source: LogSource,
    debug: bool,
    mode: DisplayMode,
}

impl Watcher {
    pub fn new(config: &Config, mode: DisplayMode) -> Result<Self> {
        Ok(Self {
            source: LogSource::from_config(&config.source)?,
            debug: config.display.debug,
            mode,
        })
    }

    /// Run until SIGINT/SIGTERM/SIGHUP, or until the source or the display
    /// sink fails.
    ///
    /// The source ending normally (stdin EOF) does not stop the report; the
    /// window keeps rolling until a signal arrives.
    pub async fn run(self) -> Result<()> {
        self.run_with_output(std::io::stdout()).await
    }

    /// Same as [`Watcher::run`], writing frames to `out`
    pub async fn run_with_output<W>(self, out: W) -> Result<()>
    where
        W: Write + Send + 'static,
    {
        let mut signal_handler = SignalHandler::new()?;

        let (pipeline, snapshots) = Pipeline::spawn(self.debug);
        let mut display = tokio::spawn(display_worker(snapshots, out, self.mode, self.debug));
        let mut display_done = false;

        let source_desc = self.source.describe();
        tracing::info!("Watching {}", source_desc);
        let mut reader = tokio::spawn(self.source.run(pipeline.producer()));
        let mut source_done = false;

        let result = loop {
            tokio::select! {
                joined = &mut reader, if !source_done => {
                    source_done = true;
                    match joined {
                        Ok(Ok(())) => {
                            tracing::info!("Source {} finished; report stays live", source_desc);
                        }
                        Ok(Err(e)) => break Err(e),
                        Err(e) => {
                            break Err(anyhow::Error::new(e).context("Source task failed").into());
                        }
                    }
                }

                joined = &mut display, if !display_done => {
                    display_done = true;
                    match joined {
                        Ok(Ok(frames)) => {
                            break Err(TailstatError::Pipeline(format!(
                                "Display sink stopped after {} frames",
                                frames
                            )));
                        }
                        Ok(Err(e)) => break Err(e),
                        Err(e) => {
                            break Err(anyhow::Error::new(e).context("Display task failed").into());
                        }
                    }
                }

                sig = signal_handler.wait() => {
                    tracing::info!("Stopping on {:?}", sig);
                    break Ok(());
                }
            }
        };

        if !source_done {
            reader.abort();
        }
        pipeline.shutdown().await;

        if !display_done {
            match display.await {
                Ok(Ok(frames)) => tracing::debug!("Rendered {} frames", frames),
                Ok(Err(e)) => tracing::warn!("Display sink error: {}", e),
                Err(e) => tracing::warn!("Display task failed: {}", e),
            }
        }

        result
    }
}
