//! Lazy keyword access to reservoir-simulation container files.
//!
//! Restart, summary, grid and init files written by reservoir simulators
//! are sequences of keywords (see [`resfile_formats::keyword`]). This crate
//! opens such a file as a [`Container`]:
//!
//! - **Index**: one scan over the keyword headers builds a
//!   [`ContainerIndex`] of names, types, counts and byte offsets without
//!   reading any payload.
//! - **Lazy entries**: payloads are decoded on first access and cached with
//!   a reference count ([`LazyIndex`]); callers release them when done, or
//!   wrap a batch of reads in a transaction.
//! - **Writes**: keywords can be appended, and a keyword of unchanged shape
//!   can be rewritten in place without touching the record framing.
//!
//! # Example
//!
//! ```rust,no_run
//! use resfile_store::{Container, ContainerConfig};
//!
//! # fn example() -> resfile_store::Result<()> {
//! let mut container = Container::open("CASE.UNRST", ContainerConfig::default())?;
//! println!("{} keywords", container.index().len());
//!
//! let pressure = container.get_keyword("PRESSURE", 0)?;
//! let first: f64 = container.keyword(pressure)?.get_as(0)?;
//! container.release(pressure)?;
//! # let _ = first;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use resfile_formats::keyword::KeywordError;
use resfile_formats::record::RecordError;
use thiserror::Error;

// Configuration
pub mod config;

// Keyword header index
pub mod index;

// Materialized keywords and their reference counts
pub mod lazy;

// Container session
mod container;

pub use config::{ContainerConfig, EndianMode};
pub use container::Container;
pub use index::{ContainerIndex, IndexEntry};
pub use lazy::{BlockHandle, InverseMap, LazyEntry, LazyIndex, Transaction};

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while working with a container.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record framing error.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Keyword decoding or access error.
    #[error("Keyword error: {0}")]
    Keyword(#[from] KeywordError),

    /// Binary structure error in a persisted index file.
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// A keyword read from disk no longer matches its index entry.
    #[error(
        "Index corruption at entry {position}: indexed {expected}, found {found} (file modified externally?)"
    )]
    IndexCorruption {
        /// Position of the entry in the index
        position: usize,
        /// Metadata recorded in the index
        expected: String,
        /// Metadata decoded from the file
        found: String,
    },

    /// Caller passed arguments that break the operation's contract.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Write attempted on a container opened read-only.
    #[error("Container is read-only: {}", .0.display())]
    ReadOnly(PathBuf),

    /// Payload cannot be dropped while references are outstanding.
    #[error("Keyword {name} is still referenced ({refs} outstanding)")]
    StillReferenced {
        /// Keyword name
        name: String,
        /// Outstanding reference count
        refs: usize,
    },

    /// Handle that does not refer to a materialized keyword.
    #[error("Unknown keyword handle: {0}")]
    UnknownHandle(u64),

    /// Keyword not present in the index.
    #[error("Keyword not found: {name} (occurrence {occurrence})")]
    NotFound {
        /// Keyword name
        name: String,
        /// Requested occurrence
        occurrence: usize,
    },

    /// Persisted index file is malformed.
    #[error("Invalid index file: {0}")]
    InvalidIndexFile(String),

    /// File is neither record framed nor formatted.
    #[error("Unrecognized container format: {}", .0.display())]
    UnrecognizedFormat(PathBuf),

    /// Operation not available for this container variant.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    /// Whether the bytes on disk are damaged or changed behind our back.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Record(e) => e.is_corruption(),
            Self::Keyword(e) => e.is_corruption(),
            Self::IndexCorruption { .. }
            | Self::InvalidIndexFile(_)
            | Self::UnrecognizedFormat(_) => true,
            _ => false,
        }
    }

    /// Whether the caller violated an operation's contract.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Self::Record(e) => e.is_contract_violation(),
            Self::Keyword(e) => e.is_contract_violation(),
            Self::ContractViolation(_)
            | Self::ReadOnly(_)
            | Self::StillReferenced { .. }
            | Self::UnknownHandle(_)
            | Self::Unsupported(_) => true,
            _ => false,
        }
    }
}

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let corrupt = StorageError::from(RecordError::CorruptRecord {
            record: 3,
            header: 8,
            trailer: 9,
        });
        assert!(corrupt.is_corruption());
        assert!(!corrupt.is_contract_violation());

        let busy = StorageError::StillReferenced {
            name: "PRES".to_string(),
            refs: 2,
        };
        assert!(busy.is_contract_violation());
        assert_eq!(
            busy.to_string(),
            "Keyword PRES is still referenced (2 outstanding)"
        );

        let io = StorageError::from(std::io::Error::other("disk gone"));
        assert!(!io.is_corruption());
        assert!(!io.is_contract_violation());
    }
}
