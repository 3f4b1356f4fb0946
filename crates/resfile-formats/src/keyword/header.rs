//! Keyword header sub-record

use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinWrite};

use super::element::ElementType;
use super::error::{KeywordError, KeywordResult};
use crate::record::RecordStream;

/// Width of the name field
pub const NAME_LENGTH: usize = 8;

/// Size of the header sub-record payload
pub const HEADER_SIZE: usize = 16;

/// Header sub-record exactly as stored: name, element count, type tag
///
/// Byte order comes from the stream it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct RawKeywordHeader {
    /// Space-padded name
    pub name: [u8; NAME_LENGTH],
    /// Number of elements
    pub count: i32,
    /// Four-character type tag
    pub tag: [u8; 4],
}

/// Validated keyword header
///
/// Fields are only reachable through accessors, so every header satisfies
/// the on-disk limits: an ASCII name of at most 8 bytes, a valid element
/// type and a count that fits an `i32`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeywordHeader {
    pub(crate) name: String,
    pub(crate) element_type: ElementType,
    pub(crate) count: usize,
}

/// Strip padding and check that a name fits the 8-byte field
pub fn normalize_name(name: &str) -> KeywordResult<String> {
    let trimmed = name.trim_end_matches([' ', '\0']);
    if !trimmed.is_ascii() {
        return Err(KeywordError::InvalidName(name.to_string()));
    }
    if trimmed.len() > NAME_LENGTH {
        return Err(KeywordError::NameTooLong(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Decode a name field read from a file
///
/// The field must be ASCII so that it survives a rewrite byte for byte.
pub(crate) fn name_from_field(field: [u8; NAME_LENGTH]) -> KeywordResult<String> {
    if !field.is_ascii() {
        return Err(KeywordError::CorruptName(field));
    }
    let name: String = field.iter().copied().map(char::from).collect();
    normalize_name(&name)
}

/// Check that an element count is representable on disk
pub(crate) fn validate_count(count: usize) -> KeywordResult<usize> {
    if i32::try_from(count).is_err() {
        return Err(KeywordError::InvalidCount(count as i64));
    }
    Ok(count)
}

impl KeywordHeader {
    /// Create a header, validating name, element type and count
    pub fn new(name: &str, element_type: ElementType, count: usize) -> KeywordResult<Self> {
        Ok(Self {
            name: normalize_name(name)?,
            element_type: element_type.validate()?,
            count: validate_count(count)?,
        })
    }

    /// Name with trailing padding removed
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    /// Payload size in bytes
    pub fn payload_bytes(&self) -> usize {
        self.count * self.element_type.element_size()
    }

    /// Number of physical data records following the header
    pub fn data_records(&self) -> usize {
        self.element_type.record_count(self.count)
    }

    /// Validate a raw header
    pub fn from_raw(raw: &RawKeywordHeader) -> KeywordResult<Self> {
        let element_type = ElementType::from_tag(raw.tag)?;
        let count =
            usize::try_from(raw.count).map_err(|_| KeywordError::InvalidCount(i64::from(raw.count)))?;
        let name = name_from_field(raw.name)?;
        Self::new(&name, element_type, count)
    }

    /// Build the on-disk form
    pub fn to_raw(&self) -> RawKeywordHeader {
        let mut name = [b' '; NAME_LENGTH];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        RawKeywordHeader {
            name,
            // validate_count keeps this in range
            count: i32::try_from(self.count).unwrap_or(i32::MAX),
            tag: self.element_type.tag(),
        }
    }

    /// Read the next header sub-record
    ///
    /// Returns `Ok(None)` at a clean end-of-file.
    pub fn read<S: Read + Seek>(stream: &mut RecordStream<S>) -> KeywordResult<Option<Self>> {
        if stream.is_formatted() {
            return super::formatted::read_header(stream);
        }

        let Some(length) = stream.begin_read()? else {
            return Ok(None);
        };
        if length != HEADER_SIZE {
            // Leave the stream past this record so the caller sees a
            // consistent position.
            stream.end_read()?;
            return Err(KeywordError::InvalidHeader {
                expected: HEADER_SIZE,
                actual: length,
            });
        }

        let mut bytes = [0u8; HEADER_SIZE];
        stream.read_payload(&mut bytes)?;
        stream.end_read()?;

        let raw = RawKeywordHeader::read_options(&mut Cursor::new(&bytes[..]), stream.endian(), ())?;
        Self::from_raw(&raw).map(Some)
    }

    /// Write the header sub-record
    pub fn write<S: Write + Seek>(&self, stream: &mut RecordStream<S>) -> KeywordResult<()> {
        if stream.is_formatted() {
            return super::formatted::write_header(self, stream);
        }

        let mut bytes = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        self.to_raw().write_options(&mut bytes, stream.endian(), ())?;
        stream.write_record(bytes.get_ref())?;
        Ok(())
    }

    /// Skip the payload belonging to this header without decoding it
    pub fn skip_data<S: Read + Seek>(&self, stream: &mut RecordStream<S>) -> KeywordResult<()> {
        if stream.is_formatted() {
            return super::formatted::skip_values(self, stream);
        }
        stream.skip_chunked(self.payload_bytes())?;
        Ok(())
    }
}
