//! Heuristics for recognizing container files

use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

use binrw::Endian;

use super::{RECORD_MARKER_SIZE, decode_i32};

/// Run `probe` and put the reader back where it was, whatever the outcome
fn with_restored_position<R, T>(
    reader: &mut R,
    probe: impl FnOnce(&mut R) -> io::Result<T>,
) -> io::Result<T>
where
    R: Seek,
{
    let start = reader.stream_position()?;
    let result = probe(reader);
    reader.seek(SeekFrom::Start(start))?;
    result
}

fn read_marker<R: Read>(reader: &mut R, endian: Endian) -> io::Result<Option<i32>> {
    let mut marker = [0u8; RECORD_MARKER_SIZE];
    match reader.read_exact(&mut marker) {
        Ok(()) => Ok(Some(decode_i32(marker, endian))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether the stream starts with Fortran record framing in `endian` order
///
/// Reads a length, skips that many bytes and compares the trailer. Empty
/// records are inconclusive, so scanning continues past them; the first
/// non-empty record with a matching trailer settles the question. The stream
/// position is restored before returning.
pub fn looks_like_record_framed<R: Read + Seek>(reader: &mut R, endian: Endian) -> io::Result<bool> {
    with_restored_position(reader, |reader| {
        let end = reader.seek(SeekFrom::End(0))?;
        let mut offset = reader.seek(SeekFrom::Start(0))?;

        loop {
            let Some(header) = read_marker(reader, endian)? else {
                return Ok(false);
            };
            let Ok(length) = u64::try_from(header) else {
                return Ok(false);
            };

            let trailer_at = offset + RECORD_MARKER_SIZE as u64 + length;
            if trailer_at + RECORD_MARKER_SIZE as u64 > end {
                return Ok(false);
            }
            reader.seek(SeekFrom::Start(trailer_at))?;

            let Some(trailer) = read_marker(reader, endian)? else {
                return Ok(false);
            };
            if trailer != header {
                return Ok(false);
            }
            if length > 0 {
                return Ok(true);
            }
            offset = trailer_at + RECORD_MARKER_SIZE as u64;
        }
    })
}

/// Find the byte order in which the stream is record framed
///
/// Big-endian is tried first since that is what simulators write; returns
/// `None` when neither order yields valid framing.
pub fn guess_endianness<R: Read + Seek>(reader: &mut R) -> io::Result<Option<Endian>> {
    for endian in [Endian::Big, Endian::Little] {
        if looks_like_record_framed(reader, endian)? {
            return Ok(Some(endian));
        }
    }
    Ok(None)
}

/// Whether the stream holds the formatted (ASCII) variant
///
/// Formatted files open with a quoted keyword name, so the first non-blank
/// byte is a single quote. The stream position is restored before returning.
pub fn looks_like_formatted<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    with_restored_position(reader, |reader| {
        reader.seek(SeekFrom::Start(0))?;
        let mut byte = [0u8; 1];
        loop {
            match reader.read(&mut byte) {
                Ok(0) => return Ok(false),
                Ok(_) if matches!(byte[0], b' ' | b'\n' | b'\r' | b'\t') => {}
                Ok(_) => return Ok(byte[0] == b'\''),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    })
}
