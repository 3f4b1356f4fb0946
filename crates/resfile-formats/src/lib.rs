//! Record framing and typed keyword codecs for reservoir-simulation files
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Numeric widening accessors
#![allow(clippy::doc_markdown)] // Fortran/ECLIPSE terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Bit-exact payload comparisons
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate implements the two lowest layers of the restart/summary/grid
//! container format written by reservoir simulators:
//!
//! - **Records**: Fortran unformatted sequential records, i.e. a 4-byte
//!   length header, the payload, and a 4-byte trailer repeating the length.
//!   See [`record::RecordStream`].
//! - **Keywords**: named, typed arrays (`INTE`, `REAL`, `DOUB`, `LOGI`,
//!   `CHAR`, `MESS`, `C0NN`) whose payload is split over several physical
//!   records. See [`keyword::Keyword`].
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: every keyword that can be decoded can be
//!   encoded back to identical bytes
//! - **No Global State**: byte order and formatted/unformatted mode travel
//!   with the stream, never through process-wide flags
//! - **Typed Errors**: framing mismatches and short reads surface as
//!   [`record::RecordError`], never as silently truncated data
//!
//! # Example
//!
//! ```rust
//! use resfile_formats::keyword::Keyword;
//! use resfile_formats::record::RecordStream;
//! use std::io::Cursor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = RecordStream::big_endian(Cursor::new(Vec::new()));
//! Keyword::from_values("PRES", &[1.0_f32, 2.0, 3.0])?.encode(&mut stream)?;
//!
//! stream.rewind()?;
//! let pres = Keyword::decode(&mut stream)?.expect("one keyword");
//! assert_eq!(pres.get_as::<f64>(2)?, 3.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Typed keyword arrays: element types, header sub-record, codecs and
/// arithmetic
pub mod keyword;
/// Physical record framing for Fortran sequential files
///
/// This module owns the byte stream of a container file. It frames
/// records, swaps the length fields when the file byte order differs from
/// the host, transfers payloads split over several records, and offers the
/// whitespace-token primitives of the ASCII variant of the format.
pub mod record;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;
