//! Error types for the save path.
//!
//! Begin/end never return errors to the host: every recoverable condition
//! on the hot path is handled and logged where it is detected. Only report
//! generation has a fallible public surface.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort a report save.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("report pattern {pattern:?} contains an invalid time format specifier")]
    InvalidPattern { pattern: String },

    #[error("report pattern {pattern:?} expanded to an empty file name")]
    EmptyReportPath { pattern: String },

    #[error("report path is {len} bytes, over the {max} byte limit")]
    ReportPathTooLong { len: usize, max: usize },

    #[error("failed to write report {}: {source}", path.display())]
    ReportIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
