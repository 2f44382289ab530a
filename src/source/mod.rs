//! Log sources
//!
//! Producers that read raw lines from standard input or a followed file and
//! push them onto the ingestion queue.
mod follow;

pub use follow::{follow_file, POLL_INTERVAL};

use crate::config::{SourceConfig, SourceKind};
use crate::error::{Result, TailstatError};
use crate::pipeline::Producer;
use std::borrow::Cow;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Where log lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    Stdin,
    File(PathBuf),
}

impl LogSource {
    /// Build from the `[source]` config section
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match config.kind {
            SourceKind::Stdin => Ok(LogSource::Stdin),
            SourceKind::File => config.path.clone().map(LogSource::File).ok_or_else(|| {
                TailstatError::Config("source.path is required for kind = \"file\"".to_string())
            }),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LogSource::Stdin => "stdin".to_string(),
            LogSource::File(path) => path.display().to_string(),
        }
    }

    /// Read from the source until it ends or the queue closes.
    ///
    /// A file that cannot be opened is a fatal `SourceUnavailable`; end of
    /// standard input simply ends this producer.
    pub async fn run(self, producer: Producer) -> Result<()> {
        match self {
            LogSource::Stdin => {
                let reader = BufReader::new(tokio::io::stdin());
                let lines = read_lines(reader, &producer).await?;
                tracing::info!("stdin closed after {} lines", lines);
                Ok(())
            }
            LogSource::File(path) => follow_file(&path, producer, POLL_INTERVAL).await,
        }
    }
}

/// Forward every line of a finite reader. Returns the number of lines read.
///
/// Lines are read as bytes; invalid UTF-8 is replaced rather than ending the
/// reader.
pub async fn read_lines<R>(mut reader: R, producer: &Producer) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| TailstatError::Io {
                source: e,
                context: "Failed to read log line".to_string(),
            })?;
        if read == 0 {
            break;
        }

        count += 1;
        if producer.submit_line(&decode_line(&buf)).await.is_err() {
            tracing::debug!("Ingestion queue closed, stopping reader");
            break;
        }
    }

    Ok(count)
}

/// Decode one raw line, dropping the line terminator. Invalid UTF-8
/// sequences become U+FFFD.
pub(crate) fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion_queue_with_capacity;

    #[tokio::test]
    async fn test_read_lines_forwards_everything() {
        let (producer, mut rx) = ingestion_queue_with_capacity(16);
        let input: &[u8] = b"\"2024-05-01T00:00:00Z\" ERROR a b boom\nshort\n\"2024-05-01T00:00:01Z\" INFO a b fine\n";

        let count = read_lines(input, &producer).await.unwrap();
        assert_eq!(count, 3);

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.record.message, "boom");
        assert!(rx.recv().await.unwrap().is_err());
        assert!(rx.recv().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_kept() {
        let (producer, mut rx) = ingestion_queue_with_capacity(16);
        let input: &[u8] = b"\"2024-05-01T00:00:00Z\" INFO a b ok\n\"2024-05-01T00:00:01Z\" ERROR a b bad \xff\xfe byte\n\"2024-05-01T00:00:02Z\" INFO a b after\n";

        let count = read_lines(input, &producer).await.unwrap();
        assert_eq!(count, 3);

        assert_eq!(rx.recv().await.unwrap().unwrap().record.message, "ok");
        let bad = rx.recv().await.unwrap().unwrap();
        assert_eq!(bad.record.message, "bad \u{FFFD}\u{FFFD} byte");
        assert_eq!(rx.recv().await.unwrap().unwrap().record.message, "after");
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"no newline"), "no newline");
    }

    #[test]
    fn test_file_source_requires_path() {
        let config = SourceConfig {
            kind: SourceKind::File,
            path: None,
        };
        assert!(LogSource::from_config(&config).is_err());

        let config = SourceConfig {
            kind: SourceKind::File,
            path: Some(PathBuf::from("/var/log/app.log")),
        };
        assert_eq!(
            LogSource::from_config(&config).unwrap(),
            LogSource::File(PathBuf::from("/var/log/app.log"))
        );
    }
}
