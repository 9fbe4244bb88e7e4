//! Layout of diagnostics written to stderr.
//!
//! Stdout carries protocol responses only, so every record the process
//! emits lands on stderr in the format chosen here. Records mirrored live
//! while a request is dispatched follow the same format; the copy embedded
//! in the response's `log` field is always text.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Record layout for the stderr stream.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per line, for collectors tailing stderr.
    #[default]
    Json,
    /// One timestamped text line per record, for operators reading a
    /// terminal.
    Compact,
}

impl LogFormat {
    /// Returns whether records are machine-readable objects.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Error raised when `--log-format` or `CPI_LOG_FORMAT` names no format.
pub type LogFormatParseError = strum::ParseError;
