//! Tailstat - live log-stream statistics
//!
//! Ingests a growing log file or standard input, classifies each entry by
//! severity and keeps a sliding-window summary (throughput, severity mix,
//! most frequent errors) that is refreshed once a second. The window size
//! adapts to the observed rate.

pub mod cli;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod source;

pub use error::{Result, TailstatError};
