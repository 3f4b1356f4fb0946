//! Physical record layer
//!
//! A Fortran program writing `write(unit) array` for a 100-element integer
//! array produces
//!
//! ```text
//! | 400 | array ...... | 400 |
//! ```
//!
//! on disk: a 4-byte length, the payload, and the same 4-byte length again.
//! [`RecordStream`] reads and writes these records transparently, swaps the
//! length fields when the file byte order differs from the host, and can
//! spread one logical payload over several physical records.
//!
//! The ASCII ("formatted") variant of the container has no records; for it
//! the stream offers whitespace-separated tokens instead (see
//! [`RecordStream::read_token`]).

mod detect;
mod error;
mod stream;
mod text;

pub use detect::{guess_endianness, looks_like_formatted, looks_like_record_framed};
pub use error::{RecordError, RecordResult};
pub use stream::RecordStream;
pub use text::Token;

use binrw::Endian;

/// Size of the length fields framing every record
pub const RECORD_MARKER_SIZE: usize = 4;

/// Largest payload one record can describe
pub const MAX_RECORD_LENGTH: usize = i32::MAX as usize;

/// How a container file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access to an existing file
    Read,
    /// Create or truncate the file for writing
    Write,
    /// Read and write an existing file without truncating it
    ReadWrite,
    /// Create the file if needed and position writes at its end
    Append,
}

impl OpenMode {
    /// Whether the mode allows writing
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Read)
    }

    pub(crate) fn options(self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        match self {
            Self::Read => options.read(true),
            Self::Write => options.write(true).create(true).truncate(true),
            Self::ReadWrite => options.read(true).write(true),
            Self::Append => options.read(true).write(true).create(true),
        };
        options
    }
}

/// Byte order of the machine running this code
pub const fn native_endian() -> Endian {
    if cfg!(target_endian = "little") {
        Endian::Little
    } else {
        Endian::Big
    }
}

/// The byte order opposite to `endian`
pub const fn opposite_endian(endian: Endian) -> Endian {
    match endian {
        Endian::Big => Endian::Little,
        Endian::Little => Endian::Big,
    }
}

/// File byte order implied by an `endian_flip` flag
///
/// `endian_flip == true` means the file is stored in the byte order opposite
/// to the host.
pub const fn endian_from_flip(endian_flip: bool) -> Endian {
    if endian_flip {
        opposite_endian(native_endian())
    } else {
        native_endian()
    }
}

pub(crate) fn decode_i32(bytes: [u8; 4], endian: Endian) -> i32 {
    match endian {
        Endian::Big => i32::from_be_bytes(bytes),
        Endian::Little => i32::from_le_bytes(bytes),
    }
}

pub(crate) fn encode_i32(value: i32, endian: Endian) -> [u8; 4] {
    match endian {
        Endian::Big => value.to_be_bytes(),
        Endian::Little => value.to_le_bytes(),
    }
}
