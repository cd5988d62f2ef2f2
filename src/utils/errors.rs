use thiserror::Error as ErrorDerive;

/// Fatal errors raised by the duplicate marking engine. None of them are retried: the input or
/// the configuration has to change and the pass has to be run again.
#[derive(ErrorDerive, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed record '{read_name}': {reason}")]
    MalformedRecord { read_name: String, reason: String },

    #[error("Invalid cigar string '{cigar}': {reason}")]
    InvalidCigar { cigar: String, reason: String },

    #[error(
        "Found a record with sufficiently large clipping that we may have missed including it in an \
        early duplicate marking iteration. Please increase the minimum distance to at least {required} bp \
        to ensure it is considered (was {minimum_distance}). read={read_name} reference={reference_index} \
        unclipped_start={unclipped_start} window_floor={floor}"
    )]
    WindowInvariantViolation {
        read_name: String,
        reference_index: usize,
        unclipped_start: i64,
        floor: i64,
        required: i64,
        minimum_distance: i64,
    },

    #[error("Record '{read_name}' targets the duplicate set {key} which has already been closed.")]
    LateAdmission { read_name: String, key: String },

    #[error("Input is not coordinate sorted: {reason} (read={read_name})")]
    UnsortedInput { read_name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    pub(crate) fn malformed(read_name: &str, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            read_name: read_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsorted(read_name: &str, reason: impl Into<String>) -> Self {
        Error::UnsortedInput {
            read_name: read_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the configured minimum distance being too small.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::WindowInvariantViolation { .. } | Error::InvalidConfiguration(_)
        )
    }
}
