// File follower: read a log file from the start and keep reading as it grows

use crate::error::{Result, TailstatError};
use crate::pipeline::Producer;
use crate::source::decode_line;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;

/// How long to wait at end of file before polling again
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Follow `path` until the ingestion queue closes.
///
/// A partial last line is held back until its newline arrives. When the
/// file shrinks below the read position (copy-truncate rotation) it is
/// reopened and read from the start. Bytes that are not valid UTF-8 are
/// replaced, so one bad line never ends the follower.
pub async fn follow_file(path: &Path, producer: Producer, poll: Duration) -> Result<()> {
    let mut reader = open(path).await?;
    tracing::info!("Following {}", path.display());

    let mut position: u64 = 0;
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = reader
            .read_until(b'\n', &mut pending)
            .await
            .map_err(|e| TailstatError::Io {
                source: e,
                context: format!("Failed to read {}", path.display()),
            })?;

        if read > 0 {
            position += read as u64;
            if pending.ends_with(b"\n") {
                if producer.submit_line(&decode_line(&pending)).await.is_err() {
                    tracing::debug!("Ingestion queue closed, stopping follower");
                    return Ok(());
                }
                pending.clear();
            }
            continue;
        }

        // End of file
        if producer.is_closed() {
            return Ok(());
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() < position => {
                tracing::info!("{} was truncated, reading from the start", path.display());
                reader = open(path).await?;
                position = 0;
                pending.clear();
            }
            Ok(_) => time::sleep(poll).await,
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}", path.display(), e);
                time::sleep(poll).await;
            }
        }
    }
}

async fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .await
        .map_err(|e| TailstatError::SourceUnavailable {
            source_desc: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(BufReader::new(file))
}
