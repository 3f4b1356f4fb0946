//! Record stream over a seekable byte stream

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use binrw::Endian;

use super::error::{RecordError, RecordResult};
use super::text::Lookahead;
use super::{
    MAX_RECORD_LENGTH, OpenMode, RECORD_MARKER_SIZE, decode_i32, encode_i32, endian_from_flip,
    native_endian,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// The record currently bracketed by a begin/end pair
#[derive(Debug, Clone, Copy)]
struct ActiveRecord {
    length: usize,
    transferred: usize,
    direction: Direction,
}

/// Fortran sequential record stream
///
/// Every record operation is bracketed: [`begin_read`](Self::begin_read)
/// reads the length header, the payload is transferred, and
/// [`end_read`](Self::end_read) reads the trailer and checks that it matches
/// the header. Writing is symmetric. A header/trailer mismatch poisons the
/// stream; later record operations fail with [`RecordError::Poisoned`] and
/// the caller is expected to close it.
///
/// The stream is not synchronized. One stream belongs to one session; share
/// it across threads only behind caller-supplied locking.
#[derive(Debug)]
pub struct RecordStream<S = File> {
    inner: S,
    path: Option<PathBuf>,
    endian: Endian,
    formatted: bool,
    active: Option<ActiveRecord>,
    record_count: u64,
    poisoned: bool,
    pub(super) lookahead: Lookahead,
}

impl<S> RecordStream<S> {
    /// Wrap `inner`, storing record lengths in `endian` byte order
    pub fn new(inner: S, endian: Endian) -> Self {
        Self {
            inner,
            path: None,
            endian,
            formatted: false,
            active: None,
            record_count: 0,
            poisoned: false,
            lookahead: Lookahead::default(),
        }
    }

    /// Wrap `inner` as a big-endian stream, the byte order simulators write
    pub fn big_endian(inner: S) -> Self {
        Self::new(inner, Endian::Big)
    }

    /// Wrap `inner` as a formatted (ASCII) stream
    pub fn formatted(inner: S) -> Self {
        Self::new(inner, native_endian()).with_formatted(true)
    }

    /// Switch between the binary and the formatted variant
    pub fn with_formatted(mut self, formatted: bool) -> Self {
        self.formatted = formatted;
        self
    }

    /// Byte order of multi-byte values in the file
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Whether file values must be byte-swapped to match the host
    pub fn endian_flip(&self) -> bool {
        self.endian != native_endian()
    }

    /// Whether this is the formatted (ASCII) variant
    pub fn is_formatted(&self) -> bool {
        self.formatted
    }

    /// Number of physical records started on this stream so far
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Length of the record currently open, if any
    pub fn active_header(&self) -> Option<usize> {
        self.active.map(|active| active.length)
    }

    /// Whether an earlier framing error made the stream unusable
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Forget the open record and any poisoning after an error
    ///
    /// The position is left where the failure happened; the caller must
    /// seek to a known record boundary before reading again.
    pub fn reset(&mut self) {
        self.active = None;
        self.poisoned = false;
    }

    /// Path of the underlying file, when opened through [`RecordStream::open`]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream
    ///
    /// Moving the position behind the stream's back while a record is open
    /// breaks the bracket invariant. For formatted streams the underlying
    /// position may be ahead of [`RecordStream::position`] while tokens are
    /// buffered.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the underlying stream
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn check_binary(&self) -> RecordResult<()> {
        if self.poisoned {
            return Err(RecordError::Poisoned);
        }
        if self.formatted {
            return Err(RecordError::WrongVariant("unformatted"));
        }
        Ok(())
    }

    pub(crate) fn check_formatted(&self) -> RecordResult<()> {
        if self.poisoned {
            return Err(RecordError::Poisoned);
        }
        if !self.formatted {
            return Err(RecordError::WrongVariant("formatted"));
        }
        Ok(())
    }

    fn poison(&mut self, error: RecordError) -> RecordError {
        self.poisoned = true;
        self.active = None;
        error
    }
}

impl RecordStream<File> {
    /// Open a file as a record stream
    ///
    /// `endian_flip` selects the byte order relative to the host; use
    /// [`RecordStream::open_with_endian`] to name it directly.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, endian_flip: bool) -> RecordResult<Self> {
        Self::open_with_endian(path, mode, endian_from_flip(endian_flip))
    }

    /// Open a file with an explicit file byte order
    pub fn open_with_endian(
        path: impl AsRef<Path>,
        mode: OpenMode,
        endian: Endian,
    ) -> RecordResult<Self> {
        let path = path.as_ref();
        let mut file = mode.options().open(path)?;
        if mode == OpenMode::Append {
            file.seek(SeekFrom::End(0))?;
        }

        let mut stream = Self::new(file, endian);
        stream.path = Some(path.to_path_buf());
        Ok(stream)
    }
}

impl<S: Seek> RecordStream<S> {
    /// Current byte offset, excluding bytes buffered by the token reader
    pub fn position(&mut self) -> RecordResult<u64> {
        let position = self.inner.stream_position()?;
        Ok(position - self.lookahead.unread() as u64)
    }

    /// Move the underlying stream back over bytes the token reader buffered
    pub(super) fn discard_lookahead(&mut self) -> RecordResult<()> {
        let unread = self.lookahead.unread();
        if unread > 0 {
            self.inner.seek(SeekFrom::Current(-(unread as i64)))?;
        }
        self.lookahead.clear();
        Ok(())
    }

    /// Move to an absolute byte offset
    ///
    /// Not allowed while a record is open.
    pub fn seek_to(&mut self, offset: u64) -> RecordResult<()> {
        if self.active.is_some() {
            return Err(RecordError::Bracket("seek while a record is open"));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.lookahead.clear();
        Ok(())
    }

    /// Move back to the start of the stream
    pub fn rewind(&mut self) -> RecordResult<()> {
        self.seek_to(0)
    }

    /// Move to the end of the stream and return its length
    pub fn seek_end(&mut self) -> RecordResult<u64> {
        if self.active.is_some() {
            return Err(RecordError::Bracket("seek while a record is open"));
        }
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.lookahead.clear();
        Ok(end)
    }

    /// Total length of the stream in bytes
    pub fn stream_len(&mut self) -> RecordResult<u64> {
        let current = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        if current != end {
            self.inner.seek(SeekFrom::Start(current))?;
        }
        Ok(end)
    }

    /// Bytes between the current position and the end of the stream
    pub fn remaining(&mut self) -> RecordResult<u64> {
        let position = self.position()?;
        Ok(self.stream_len()?.saturating_sub(position))
    }

    /// Whether the position is at (or past) the end of the stream
    pub fn at_eof(&mut self) -> RecordResult<bool> {
        Ok(self.remaining()? == 0)
    }
}

impl<S: Read + Seek> RecordStream<S> {
    /// Next byte for the token reader, refilling its buffer as needed
    pub(super) fn read_byte(&mut self) -> RecordResult<Option<u8>> {
        if let Some(byte) = self.lookahead.next() {
            return Ok(Some(byte));
        }
        if self.lookahead.refill(&mut self.inner)? == 0 {
            return Ok(None);
        }
        Ok(self.lookahead.next())
    }

    /// Start reading a record and return its payload length
    ///
    /// Returns `Ok(None)` when the stream is cleanly at end-of-file. A
    /// partial length field is reported as [`RecordError::Truncated`].
    pub fn begin_read(&mut self) -> RecordResult<Option<usize>> {
        self.check_binary()?;
        if self.active.is_some() {
            return Err(RecordError::Bracket("begin_read while a record is open"));
        }

        let Some(marker) = self.read_marker("record header")? else {
            return Ok(None);
        };
        self.record_count += 1;

        let header = decode_i32(marker, self.endian);
        let Ok(length) = usize::try_from(header) else {
            let record = self.record_count;
            return Err(self.poison(RecordError::InvalidLength {
                record,
                length: header,
            }));
        };

        self.active = Some(ActiveRecord {
            length,
            transferred: 0,
            direction: Direction::Read,
        });
        Ok(Some(length))
    }

    /// Copy the whole payload of the open record into `buffer`
    ///
    /// `buffer` must be exactly as long as the active record.
    pub fn read_payload(&mut self, buffer: &mut [u8]) -> RecordResult<()> {
        let active = self.expect_active(Direction::Read)?;
        if active.transferred != 0 || buffer.len() != active.length {
            return Err(RecordError::PayloadMismatch {
                expected: active.length - active.transferred,
                actual: buffer.len(),
            });
        }

        self.read_exact_or_truncated(buffer, "record payload")?;
        self.mark_transferred(active.length);
        Ok(())
    }

    /// Finish the open record by reading and checking its trailer
    pub fn end_read(&mut self) -> RecordResult<()> {
        let active = self.expect_active(Direction::Read)?;
        if active.transferred < active.length {
            // Payload was not consumed; step over the remainder.
            let remaining = (active.length - active.transferred) as i64;
            self.inner.seek(SeekFrom::Current(remaining))?;
        }

        let Some(marker) = self.read_marker("record trailer")? else {
            self.active = None;
            return Err(RecordError::Truncated {
                record: self.record_count,
                context: "record trailer",
            });
        };

        let trailer = decode_i32(marker, self.endian);
        let header = active.length as i32;
        if trailer != header {
            let record = self.record_count;
            return Err(self.poison(RecordError::CorruptRecord {
                record,
                header,
                trailer,
            }));
        }

        self.active = None;
        Ok(())
    }

    /// Skip the next record without copying its payload
    ///
    /// Returns the skipped payload length, or `Ok(None)` at end-of-file.
    pub fn skip_record(&mut self) -> RecordResult<Option<usize>> {
        let Some(length) = self.begin_read()? else {
            return Ok(None);
        };
        self.end_read()?;
        Ok(Some(length))
    }

    /// Skip `count` records; running into end-of-file is an error
    pub fn skip_records(&mut self, count: usize) -> RecordResult<()> {
        for _ in 0..count {
            if self.skip_record()?.is_none() {
                return Err(RecordError::Truncated {
                    record: self.record_count + 1,
                    context: "record header",
                });
            }
        }
        Ok(())
    }

    /// Read the next record into a fresh buffer
    ///
    /// Returns `Ok(None)` at end-of-file.
    pub fn read_record(&mut self) -> RecordResult<Option<Vec<u8>>> {
        let Some(length) = self.begin_read()? else {
            return Ok(None);
        };
        if length as u64 > self.remaining()? {
            self.active = None;
            return Err(RecordError::Truncated {
                record: self.record_count,
                context: "record payload",
            });
        }
        let mut buffer = vec![0u8; length];
        self.read_payload(&mut buffer)?;
        self.end_read()?;
        Ok(Some(buffer))
    }

    /// Read the next record, which must be exactly `buffer.len()` bytes long
    pub fn read_record_into(&mut self, buffer: &mut [u8]) -> RecordResult<()> {
        let Some(length) = self.begin_read()? else {
            return Err(RecordError::Truncated {
                record: self.record_count + 1,
                context: "record header",
            });
        };
        if length != buffer.len() {
            self.active = None;
            return Err(RecordError::PayloadMismatch {
                expected: length,
                actual: buffer.len(),
            });
        }
        self.read_payload(buffer)?;
        self.end_read()
    }

    /// Fill `buffer` from as many consecutive records as it takes
    ///
    /// The record lengths come from the file; a record that would overflow
    /// `buffer` is an [`RecordError::Overrun`]. Returns the number of
    /// physical records consumed.
    pub fn read_chunked(&mut self, buffer: &mut [u8]) -> RecordResult<usize> {
        let mut filled = 0;
        let mut records = 0;

        while filled < buffer.len() {
            let length = self.begin_chunk(buffer.len() - filled)?;
            self.read_payload(&mut buffer[filled..filled + length])?;
            self.end_read()?;

            filled += length;
            records += 1;
        }

        Ok(records)
    }

    /// Skip records until `total_bytes` of payload have been passed
    ///
    /// Returns the number of physical records skipped.
    pub fn skip_chunked(&mut self, total_bytes: usize) -> RecordResult<usize> {
        let mut skipped = 0;
        let mut records = 0;

        while skipped < total_bytes {
            let length = self.begin_chunk(total_bytes - skipped)?;
            self.end_read()?;

            skipped += length;
            records += 1;
        }

        Ok(records)
    }

    fn begin_chunk(&mut self, remaining: usize) -> RecordResult<usize> {
        let Some(length) = self.begin_read()? else {
            return Err(RecordError::Truncated {
                record: self.record_count + 1,
                context: "chunked payload",
            });
        };
        if length > remaining {
            let record = self.record_count;
            return Err(self.poison(RecordError::Overrun {
                record,
                remaining,
                found: length,
            }));
        }
        Ok(length)
    }

    fn read_marker(&mut self, context: &'static str) -> RecordResult<Option<[u8; 4]>> {
        let mut marker = [0u8; RECORD_MARKER_SIZE];
        let mut filled = 0;

        while filled < marker.len() {
            match self.inner.read(&mut marker[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(None),
            RECORD_MARKER_SIZE => Ok(Some(marker)),
            _ => Err(RecordError::Truncated {
                record: self.record_count + 1,
                context,
            }),
        }
    }

    fn read_exact_or_truncated(
        &mut self,
        buffer: &mut [u8],
        context: &'static str,
    ) -> RecordResult<()> {
        self.inner.read_exact(buffer).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                self.active = None;
                RecordError::Truncated {
                    record: self.record_count,
                    context,
                }
            } else {
                RecordError::Io(e)
            }
        })
    }
}

impl<S: Write + Seek> RecordStream<S> {
    /// Start writing a record of `length` payload bytes
    pub fn begin_write(&mut self, length: usize) -> RecordResult<()> {
        self.check_binary()?;
        if self.active.is_some() {
            return Err(RecordError::Bracket("begin_write while a record is open"));
        }
        if length > MAX_RECORD_LENGTH {
            return Err(RecordError::RecordTooLarge(length));
        }

        self.inner
            .write_all(&encode_i32(length as i32, self.endian))?;
        self.record_count += 1;
        self.active = Some(ActiveRecord {
            length,
            transferred: 0,
            direction: Direction::Write,
        });
        Ok(())
    }

    /// Write part of the payload of the open record
    pub fn write_payload(&mut self, data: &[u8]) -> RecordResult<()> {
        let active = self.expect_active(Direction::Write)?;
        if active.transferred + data.len() > active.length {
            return Err(RecordError::PayloadMismatch {
                expected: active.length - active.transferred,
                actual: data.len(),
            });
        }

        self.inner.write_all(data)?;
        self.mark_transferred(data.len());
        Ok(())
    }

    /// Finish the open record by writing its trailer
    ///
    /// The whole payload announced in [`begin_write`](Self::begin_write)
    /// must have been written.
    pub fn end_write(&mut self) -> RecordResult<()> {
        let active = self.expect_active(Direction::Write)?;
        if active.transferred != active.length {
            return Err(RecordError::PayloadMismatch {
                expected: active.length,
                actual: active.transferred,
            });
        }

        self.inner
            .write_all(&encode_i32(active.length as i32, self.endian))?;
        self.active = None;
        Ok(())
    }

    /// Write `data` as one complete record
    pub fn write_record(&mut self, data: &[u8]) -> RecordResult<()> {
        self.begin_write(data.len())?;
        self.write_payload(data)?;
        self.end_write()
    }

    /// Write `data` as consecutive records of at most `max_record_bytes`
    ///
    /// Empty data produces no records. Returns the number of records
    /// written.
    pub fn write_chunked(&mut self, data: &[u8], max_record_bytes: usize) -> RecordResult<usize> {
        let max_record_bytes = max_record_bytes.clamp(1, MAX_RECORD_LENGTH);
        let mut records = 0;

        for chunk in data.chunks(max_record_bytes) {
            self.write_record(chunk)?;
            records += 1;
        }

        Ok(records)
    }

    /// Flush buffered writes to the underlying stream
    pub fn flush(&mut self) -> RecordResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<S> RecordStream<S> {
    fn expect_active(&self, direction: Direction) -> RecordResult<ActiveRecord> {
        if self.poisoned {
            return Err(RecordError::Poisoned);
        }
        match self.active {
            Some(active) if active.direction == direction => Ok(active),
            Some(_) => Err(RecordError::Bracket("record is open in the other direction")),
            None => Err(RecordError::Bracket("no record is open")),
        }
    }

    fn mark_transferred(&mut self, bytes: usize) {
        if let Some(active) = self.active.as_mut() {
            active.transferred += bytes;
        }
    }
}
