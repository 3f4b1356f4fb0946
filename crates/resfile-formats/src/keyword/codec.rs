//! Keyword encoding and decoding through a record stream

use std::borrow::Cow;
use std::io::{Cursor, Read, Seek, Write};

use binrw::Endian;

use super::{Keyword, KeywordError, KeywordHeader, KeywordResult, formatted};
use crate::record::{RECORD_MARKER_SIZE, RecordError, RecordStream, native_endian};

/// Reverse the bytes of every `element_size`-byte element
fn swap_elements(bytes: &mut [u8], element_size: usize) {
    if element_size > 1 {
        for element in bytes.chunks_exact_mut(element_size) {
            element.reverse();
        }
    }
}

/// Fail with `Truncated` when fewer than `needed` bytes are left
///
/// Counts come from the file, so they are checked against the stream
/// length before a buffer of that size is allocated.
pub(super) fn ensure_available<S: Read + Seek>(
    stream: &mut RecordStream<S>,
    needed: u64,
    context: &'static str,
) -> KeywordResult<()> {
    if needed > stream.remaining()? {
        return Err(RecordError::Truncated {
            record: stream.record_count() + 1,
            context,
        }
        .into());
    }
    Ok(())
}

impl KeywordHeader {
    /// Bytes the keyword occupies in an unformatted file, framing included
    pub fn encoded_len(&self) -> u64 {
        let framing = 2 * RECORD_MARKER_SIZE as u64;
        let header = super::HEADER_SIZE as u64 + framing;
        header + self.payload_bytes() as u64 + self.data_records() as u64 * framing
    }

    /// Move to the next keyword called `name` without indexing the stream
    ///
    /// Headers are read and payloads skipped from the current position
    /// onwards. With `wrap` the search restarts once from the beginning of
    /// the stream. When found, the stream is left at the start of the
    /// keyword and its header is returned; otherwise the position is
    /// restored and `Ok(None)` returned.
    pub fn seek_named<S: Read + Seek>(
        stream: &mut RecordStream<S>,
        name: &str,
        wrap: bool,
    ) -> KeywordResult<Option<Self>> {
        let name = super::normalize_name(name)?;
        let start = stream.position()?;

        if let Some(header) = Self::scan_for(stream, &name)? {
            return Ok(Some(header));
        }
        if wrap {
            stream.rewind()?;
            if let Some(header) = Self::scan_for(stream, &name)? {
                return Ok(Some(header));
            }
        }

        stream.seek_to(start)?;
        Ok(None)
    }

    fn scan_for<S: Read + Seek>(
        stream: &mut RecordStream<S>,
        name: &str,
    ) -> KeywordResult<Option<Self>> {
        loop {
            let offset = stream.position()?;
            let Some(header) = Self::read(stream)? else {
                return Ok(None);
            };
            if header.name == name {
                stream.seek_to(offset)?;
                return Ok(Some(header));
            }
            header.skip_data(stream)?;
        }
    }
}

impl Keyword {
    /// Decode the next keyword
    ///
    /// Returns `Ok(None)` when the stream is cleanly at end-of-file.
    pub fn decode<S: Read + Seek>(stream: &mut RecordStream<S>) -> KeywordResult<Option<Self>> {
        let Some(header) = KeywordHeader::read(stream)? else {
            return Ok(None);
        };
        Self::decode_with_header(stream, header).map(Some)
    }

    /// Decode the payload of a keyword whose header was already read
    pub fn decode_with_header<S: Read + Seek>(
        stream: &mut RecordStream<S>,
        header: KeywordHeader,
    ) -> KeywordResult<Self> {
        if stream.is_formatted() {
            return formatted::read_values(stream, header);
        }

        let framing = header.data_records() as u64 * 2 * RECORD_MARKER_SIZE as u64;
        ensure_available(stream, header.payload_bytes() as u64 + framing, "keyword payload")?;

        let mut data = vec![0u8; header.payload_bytes()];
        stream.read_chunked(&mut data)?;
        if header.element_type.is_numeric() && stream.endian() != native_endian() {
            swap_elements(&mut data, header.element_type.element_size());
        }
        Ok(Self::from_parts(header, data))
    }

    /// Encode header and payload
    pub fn encode<S: Write + Seek>(&self, stream: &mut RecordStream<S>) -> KeywordResult<()> {
        self.header().write(stream)?;
        self.encode_data(stream)
    }

    /// Encode only the payload
    ///
    /// Used to rewrite a keyword in place after its header.
    pub fn encode_data<S: Write + Seek>(&self, stream: &mut RecordStream<S>) -> KeywordResult<()> {
        if stream.is_formatted() {
            return formatted::write_values(self, stream);
        }

        let bytes = self.disk_bytes(stream.endian());
        stream.write_chunked(&bytes, self.element_type().max_record_bytes())?;
        Ok(())
    }

    /// Payload as stored in a file of the given byte order
    pub fn disk_bytes(&self, endian: Endian) -> Cow<'_, [u8]> {
        if self.element_type().is_numeric() && endian != native_endian() {
            let mut bytes = self.raw_bytes().to_vec();
            swap_elements(&mut bytes, self.element_type().element_size());
            Cow::Owned(bytes)
        } else {
            Cow::Borrowed(self.raw_bytes())
        }
    }

    /// Encode into a standalone unformatted byte buffer
    pub fn to_bytes(&self, endian: Endian) -> KeywordResult<Vec<u8>> {
        let mut stream = RecordStream::new(Cursor::new(Vec::new()), endian);
        self.encode(&mut stream)?;
        Ok(stream.into_inner().into_inner())
    }

    /// Decode one keyword from an unformatted byte buffer
    pub fn from_bytes(bytes: &[u8], endian: Endian) -> KeywordResult<Self> {
        let mut stream = RecordStream::new(Cursor::new(bytes), endian);
        Self::decode(&mut stream)?.ok_or(KeywordError::Record(RecordError::Truncated {
            record: 1,
            context: "keyword header",
        }))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keyword::{ElementType, NUMERIC_BLOCK_SIZE, STRING_BLOCK_SIZE};
    use crate::test_utils::{sample_keywords, stream_with};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_big_endian_bytes() {
        let kw = Keyword::from_values("COUNT", &[42_i32]).unwrap();
        let bytes = kw.to_bytes(Endian::Big).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&16_i32.to_be_bytes());
        expected.extend_from_slice(b"COUNT   ");
        expected.extend_from_slice(&1_i32.to_be_bytes());
        expected.extend_from_slice(b"INTE");
        expected.extend_from_slice(&16_i32.to_be_bytes());
        expected.extend_from_slice(&4_i32.to_be_bytes());
        expected.extend_from_slice(&42_i32.to_be_bytes());
        expected.extend_from_slice(&4_i32.to_be_bytes());

        assert_eq!(bytes, expected);
        assert_eq!(kw.header().encoded_len(), expected.len() as u64);
    }

    #[test]
    fn test_sequential_decode() {
        let keywords = sample_keywords();
        let mut stream = stream_with(&keywords, Endian::Little);

        let mut decoded = Vec::new();
        while let Some(kw) = Keyword::decode(&mut stream).unwrap() {
            decoded.push(kw);
        }
        assert_eq!(decoded, keywords);
    }

    #[test]
    fn test_chunk_boundaries() {
        for count in [NUMERIC_BLOCK_SIZE - 1, NUMERIC_BLOCK_SIZE, NUMERIC_BLOCK_SIZE + 1] {
            let values: Vec<f64> = (0..count).map(|i| i as f64 * 0.5).collect();
            let kw = Keyword::from_values("PRESSURE", &values).unwrap();

            let mut stream = RecordStream::big_endian(Cursor::new(Vec::new()));
            kw.encode(&mut stream).unwrap();
            assert_eq!(
                stream.record_count() as usize,
                1 + ElementType::Real64.record_count(count)
            );

            stream.rewind().unwrap();
            assert_eq!(Keyword::decode(&mut stream).unwrap(), Some(kw));
        }
    }

    #[test]
    fn test_strings_never_split() {
        let values: Vec<String> = (0..STRING_BLOCK_SIZE + 3).map(|i| format!("W{i}")).collect();
        let kw = Keyword::from_strings_with_width("WELLS", 11, &values).unwrap();

        let mut stream = RecordStream::big_endian(Cursor::new(Vec::new()));
        kw.encode(&mut stream).unwrap();
        stream.rewind().unwrap();

        let header = KeywordHeader::read(&mut stream).unwrap().unwrap();
        assert_eq!(stream.read_record().unwrap().unwrap().len(), STRING_BLOCK_SIZE * 11);
        assert_eq!(stream.read_record().unwrap().unwrap().len(), 3 * 11);
        assert_eq!(header.data_records(), 2);
    }

    #[test]
    fn test_message_has_no_payload_records() {
        let kw = Keyword::message("ENDSOL").unwrap();
        let bytes = kw.to_bytes(Endian::Big).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Keyword::from_bytes(&bytes, Endian::Big).unwrap(), kw);
    }

    #[test]
    fn test_skip_data() {
        let keywords = sample_keywords();
        let mut stream = stream_with(&keywords, Endian::Big);

        let mut names = Vec::new();
        while let Some(header) = KeywordHeader::read(&mut stream).unwrap() {
            header.skip_data(&mut stream).unwrap();
            names.push(header.name);
        }
        let expected: Vec<String> = keywords.iter().map(|k| k.name().to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_seek_named() {
        let keywords = sample_keywords();
        let mut stream = stream_with(&keywords, Endian::Big);

        let header = KeywordHeader::seek_named(&mut stream, "PRES", false).unwrap().unwrap();
        assert_eq!(header.name(), "PRES");
        let offset = stream.position().unwrap();
        assert_eq!(offset, keywords[0].header().encoded_len());
        assert_eq!(Keyword::decode(&mut stream).unwrap().as_ref(), Some(&keywords[1]));

        // Past PRES only NAME is left; without wrapping the position stays
        let after = stream.position().unwrap();
        assert_eq!(KeywordHeader::seek_named(&mut stream, "COUNT", false).unwrap(), None);
        assert_eq!(stream.position().unwrap(), after);

        let header = KeywordHeader::seek_named(&mut stream, "COUNT  ", true).unwrap().unwrap();
        assert_eq!(header.name(), "COUNT");
        assert_eq!(stream.position().unwrap(), 0);

        assert_eq!(KeywordHeader::seek_named(&mut stream, "MISSING", true).unwrap(), None);
        assert_eq!(stream.position().unwrap(), 0);
    }

    #[test]
    fn test_seek_named_formatted() {
        let keywords = sample_keywords();
        let mut stream = RecordStream::formatted(Cursor::new(Vec::new()));
        for kw in &keywords {
            kw.encode(&mut stream).unwrap();
        }
        stream.rewind().unwrap();

        KeywordHeader::seek_named(&mut stream, "NAME", false).unwrap().unwrap();
        assert_eq!(Keyword::decode(&mut stream).unwrap().as_ref(), Some(&keywords[2]));
    }

    #[test]
    fn test_truncated_payload_detected() {
        let kw = Keyword::from_values("SWAT", &[0.1_f32; 10]).unwrap();
        let mut bytes = kw.to_bytes(Endian::Big).unwrap();
        bytes.truncate(bytes.len() - 6);

        let err = Keyword::from_bytes(&bytes, Endian::Big).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_huge_count_is_truncation_not_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16_i32.to_be_bytes());
        bytes.extend_from_slice(b"HUGE    ");
        bytes.extend_from_slice(&i32::MAX.to_be_bytes());
        bytes.extend_from_slice(b"DOUB");
        bytes.extend_from_slice(&16_i32.to_be_bytes());

        let err = Keyword::from_bytes(&bytes, Endian::Big).unwrap_err();
        assert!(matches!(
            err,
            KeywordError::Record(RecordError::Truncated {
                context: "keyword payload",
                ..
            })
        ));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_empty_buffer() {
        assert!(matches!(
            Keyword::from_bytes(&[], Endian::Big),
            Err(KeywordError::Record(RecordError::Truncated { .. }))
        ));
    }
}
