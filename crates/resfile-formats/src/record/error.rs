//! Record framing error types

use thiserror::Error;

/// Record-layer error type
#[derive(Debug, Error)]
pub enum RecordError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended inside a record (short read)
    #[error("truncated record {record}: stream ended while reading {context}")]
    Truncated {
        /// Number of the record being read (1-based)
        record: u64,
        /// Which part of the record was being read
        context: &'static str,
    },

    /// Header and trailer of a record disagree
    #[error("corrupt record {record}: header {header} does not match trailer {trailer}")]
    CorruptRecord {
        /// Number of the record being read (1-based)
        record: u64,
        /// Length stored in front of the payload
        header: i32,
        /// Length stored after the payload
        trailer: i32,
    },

    /// A record header holds a negative length
    #[error("invalid record length {length} in record {record}")]
    InvalidLength {
        /// Number of the record being read (1-based)
        record: u64,
        /// The negative length read from the stream
        length: i32,
    },

    /// A record does not fit the 4-byte length field
    #[error("record of {0} bytes exceeds the maximum record length")]
    RecordTooLarge(usize),

    /// A physical record is longer than the remaining logical payload
    #[error("record {record} holds {found} bytes but only {remaining} bytes remain in the array")]
    Overrun {
        /// Number of the record being read (1-based)
        record: u64,
        /// Bytes still expected for the logical array
        remaining: usize,
        /// Bytes announced by the record header
        found: usize,
    },

    /// Payload length handed to the stream does not match the open record
    #[error("payload of {actual} bytes does not match the active record of {expected} bytes")]
    PayloadMismatch {
        /// Length of the active record
        expected: usize,
        /// Length supplied by the caller
        actual: usize,
    },

    /// A record operation was attempted in the wrong bracket state
    #[error("record bracket violation: {0}")]
    Bracket(&'static str),

    /// A previous framing error left the stream position undefined
    #[error("stream is poisoned by an earlier corrupt record")]
    Poisoned,

    /// A record-framing operation was issued on a formatted (ASCII) stream,
    /// or a token operation on an unformatted one
    #[error("operation requires a {0} stream")]
    WrongVariant(&'static str),

    /// Malformed token in a formatted stream
    #[error("invalid token at byte {offset}: {reason}")]
    InvalidToken {
        /// Stream offset where the token started
        offset: u64,
        /// Description of the problem
        reason: String,
    },
}

impl RecordError {
    /// Whether this error means the bytes on disk are damaged, as opposed to
    /// an I/O failure or a programming error
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::CorruptRecord { .. }
                | Self::InvalidLength { .. }
                | Self::Overrun { .. }
                | Self::InvalidToken { .. }
        )
    }

    /// Whether this error came from the caller violating the stream contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::PayloadMismatch { .. }
                | Self::Bracket(_)
                | Self::RecordTooLarge(_)
                | Self::WrongVariant(_)
        )
    }
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;
