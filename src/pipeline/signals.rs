// Stop-signal handling for the watch loop

use crate::error::{Result, TailstatError};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Signals the watch loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Terminate,
    Interrupt,
    Hangup,
}

/// Listens for SIGTERM, SIGINT and SIGHUP
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: install(SignalKind::terminate(), "SIGTERM")?,
            sigint: install(SignalKind::interrupt(), "SIGINT")?,
            sighup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for the next signal
    pub async fn wait(&mut self) -> StopSignal {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                StopSignal::Terminate
            }
            _ = self.sigint.recv() => {
                tracing::info!("Received SIGINT");
                StopSignal::Interrupt
            }
            _ = self.sighup.recv() => {
                tracing::info!("Received SIGHUP");
                StopSignal::Hangup
            }
        }
    }
}

fn install(kind: SignalKind, name: &str) -> Result<TokioSignal> {
    signal(kind).map_err(|e| TailstatError::Io {
        source: e,
        context: format!("Failed to setup {} handler", name),
    })
}
