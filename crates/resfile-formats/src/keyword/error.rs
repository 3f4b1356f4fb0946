//! Keyword error types

use thiserror::Error;

use crate::record::RecordError;

use super::ElementType;

/// Keyword-specific error type
#[derive(Debug, Error)]
pub enum KeywordError {
    /// Error from the record layer
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Type tag that names no known element type
    #[error("unknown element type tag: {0:?}")]
    UnknownType(String),

    /// Variable-length string width outside 1..=99
    #[error("invalid string width: {0} (must be between 1 and 99)")]
    InvalidStringWidth(usize),

    /// Keyword name longer than the 8-byte field
    #[error("keyword name {0:?} is longer than 8 bytes")]
    NameTooLong(String),

    /// Keyword name with non-ASCII characters
    #[error("keyword name {0:?} is not ASCII")]
    InvalidName(String),

    /// Name field in a file that is not ASCII
    #[error("corrupt keyword name field {0:02x?}")]
    CorruptName([u8; 8]),

    /// Element count that cannot be stored on disk
    #[error("invalid element count: {0}")]
    InvalidCount(i64),

    /// Header sub-record with the wrong size
    #[error("invalid keyword header: expected {expected} bytes, got {actual}")]
    InvalidHeader {
        /// Size of a well-formed header sub-record
        expected: usize,
        /// Size of the record found
        actual: usize,
    },

    /// Operation requires keywords with matching shape or type
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Element accessed with an incompatible type
    #[error("type mismatch: keyword holds {actual}, requested {requested}")]
    TypeMismatch {
        /// Element type stored in the keyword
        actual: ElementType,
        /// Type the caller asked for
        requested: &'static str,
    },

    /// Element index past the end of the keyword
    #[error("index {index} out of range for keyword of {count} elements")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of elements in the keyword
        count: usize,
    },

    /// Integer arithmetic overflowed
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// Integer division by zero
    #[error("integer division by zero")]
    DivisionByZero,

    /// Value that the formatted variant cannot parse
    #[error("invalid value {text:?} for {element_type} element")]
    InvalidValue {
        /// Element type being parsed
        element_type: ElementType,
        /// Offending text
        text: String,
    },
}

impl KeywordError {
    /// Whether the bytes read from disk are damaged
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Record(e) => e.is_corruption(),
            Self::UnknownType(_)
            | Self::CorruptName(_)
            | Self::InvalidStringWidth(_)
            | Self::InvalidCount(_)
            | Self::InvalidHeader { .. }
            | Self::InvalidValue { .. } => true,
            _ => false,
        }
    }

    /// Whether the caller passed incompatible arguments
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Record(e) => e.is_contract_violation(),
            Self::NameTooLong(_)
            | Self::InvalidName(_)
            | Self::ContractViolation(_)
            | Self::TypeMismatch { .. }
            | Self::IndexOutOfRange { .. } => true,
            _ => false,
        }
    }
}

/// Result type for keyword operations
pub type KeywordResult<T> = Result<T, KeywordError>;
