//! Record parsing
//!
//! Turns one raw log line into a typed [`Record`]. The expected layout is
//! whitespace separated:
//!
//! ```text
//! "2024-05-01T12:00:00Z" ERROR api-gateway worker-3 connection refused by upstream
//!  ^ timestamp           ^ level  ^ reserved  ^ reserved  ^ message (rest of line)
//! ```
//!
//! Parsing never panics. Short lines are rejected with
//! [`ParseError::MalformedLine`]; a bad timestamp is replaced by the ingestion
//! instant so the rest of the entry is still counted.
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of whitespace separated fields in a valid line
pub const MIN_FIELDS: usize = 5;

/// Index of the first message field; fields 2 and 3 are ignored
const MESSAGE_FIELD: usize = 4;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Info,
    Debug,
    /// Any level outside the three tracked ones (WARN, TRACE, ...)
    Other,
}

impl Severity {
    /// Classify a level token. Matching ignores case and surrounding brackets.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim_matches(|c| c == '[' || c == ']');
        if token.eq_ignore_ascii_case("ERROR") {
            Severity::Error
        } else if token.eq_ignore_ascii_case("INFO") {
            Severity::Info
        } else if token.eq_ignore_ascii_case("DEBUG") {
            Severity::Debug
        } else {
            Severity::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Other => "OTHER",
        }
    }
}

/// A single parsed log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub fn new(severity: Severity, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp,
        }
    }
}

/// A successfully parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub record: Record,
    /// The timestamp field was unreadable and ingestion time was used instead
    pub timestamp_fallback: bool,
}

/// Per-line parse failures. These are always recovered locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed line: expected at least 5 fields, found {fields}")]
    MalformedLine { fields: usize },

    #[error("malformed timestamp: {raw:?}")]
    MalformedTimestamp { raw: String },
}

/// What a producer pushes onto the ingestion queue for each raw line
pub type LineOutcome = std::result::Result<ParsedLine, ParseError>;

/// Parse one raw line, substituting `ingested_at` for an unreadable timestamp
pub fn parse_line(line: &str, ingested_at: DateTime<Utc>) -> LineOutcome {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::MalformedLine {
            fields: fields.len(),
        });
    }

    let (timestamp, timestamp_fallback) = match parse_timestamp(fields[0]) {
        Ok(ts) => (ts, false),
        Err(e) => {
            tracing::trace!("{}, using ingestion time", e);
            (ingested_at.trunc_subsecs(0), true)
        }
    };

    Ok(ParsedLine {
        record: Record {
            severity: Severity::from_token(fields[1]),
            message: fields[MESSAGE_FIELD..].join(" "),
            timestamp,
        },
        timestamp_fallback,
    })
}

/// Parse a strict ISO-8601 UTC instant (`2024-05-01T12:00:00Z`, fractional
/// seconds allowed), optionally wrapped in double quotes
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, ParseError> {
    let malformed = || ParseError::MalformedTimestamp {
        raw: raw.to_string(),
    };

    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    if !unquoted.ends_with('Z') || unquoted.as_bytes().get(10) != Some(&b'T') {
        return Err(malformed());
    }

    DateTime::parse_from_rfc3339(unquoted)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| malformed())
}
