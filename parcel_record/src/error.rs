use thiserror::Error;

/// Errors produced while reading or parsing records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The line ended before this field.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A numeric field did not parse.
    #[error("invalid {field}: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
    /// A numeric field parsed to NaN or infinity.
    #[error("{field} must be finite, got {value:?}")]
    NonFinite {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
    /// Error attributed to a line of a record file.
    #[error("line {line}: {source}")]
    AtLine {
        /// 1-based line number.
        line: usize,
        /// Underlying parse error.
        source: Box<RecordError>,
    },
    /// Underlying reader or writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
