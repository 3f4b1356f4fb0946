//! Whitespace tokens for the formatted (ASCII) variant

use std::io::{self, ErrorKind, Read, Seek, Write};

use super::error::{RecordError, RecordResult};
use super::stream::RecordStream;

/// Bytes fetched from the underlying stream per refill of the token reader
pub const TEXT_BUFFER_SIZE: usize = 8 * 1024;

/// One whitespace-delimited token read from a formatted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text; quotes are stripped, inner spaces of quoted tokens kept
    pub text: String,
    /// Whether the token was enclosed in single quotes
    pub quoted: bool,
    /// Stream offset of the first byte of the token
    pub offset: u64,
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\n' | b'\r' | b'\t')
}

/// Read-ahead buffer behind the token reader
///
/// The underlying position runs ahead of the logical one by
/// [`Lookahead::unread`] bytes until the buffer is cleared.
#[derive(Debug, Default)]
pub(super) struct Lookahead {
    data: Vec<u8>,
    pos: usize,
}

impl Lookahead {
    pub(super) fn unread(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(super) fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    pub(super) fn next(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    pub(super) fn refill<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        self.data.resize(TEXT_BUFFER_SIZE, 0);
        self.pos = 0;
        loop {
            match reader.read(&mut self.data) {
                Ok(n) => {
                    self.data.truncate(n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.data.clear();
                    return Err(e);
                }
            }
        }
    }
}

impl<S: Read + Seek> RecordStream<S> {
    /// Read the next token from a formatted stream
    ///
    /// A token is either a run of non-blank bytes or a single-quoted string
    /// that may contain blanks. Returns `Ok(None)` at end-of-file.
    pub fn read_token(&mut self) -> RecordResult<Option<Token>> {
        self.check_formatted()?;

        let Some((first, offset)) = self.skip_blanks()? else {
            return Ok(None);
        };

        let mut bytes = Vec::new();
        let quoted = first == b'\'';
        if quoted {
            loop {
                match self.read_byte()? {
                    None => return Err(self.truncated("quoted token")),
                    Some(b'\'') => break,
                    Some(byte) => bytes.push(byte),
                }
            }
        } else {
            bytes.push(first);
            while let Some(byte) = self.read_byte()? {
                if is_blank(byte) {
                    break;
                }
                bytes.push(byte);
            }
        }

        let text = String::from_utf8(bytes).map_err(|e| RecordError::InvalidToken {
            offset,
            reason: e.to_string(),
        })?;
        Ok(Some(Token {
            text,
            quoted,
            offset,
        }))
    }

    /// Read the next token and fail on end-of-file
    pub fn expect_token(&mut self, context: &'static str) -> RecordResult<Token> {
        self.read_token()?
            .ok_or_else(|| self.truncated(context))
    }

    /// Read a quoted field of exactly `width` bytes
    ///
    /// The bytes between the quotes are taken as they are, so the field may
    /// itself contain quotes and blanks. Returns `Ok(None)` at end-of-file.
    pub fn read_quoted_field(
        &mut self,
        width: usize,
        context: &'static str,
    ) -> RecordResult<Option<Vec<u8>>> {
        self.check_formatted()?;

        let Some((first, offset)) = self.skip_blanks()? else {
            return Ok(None);
        };
        if first != b'\'' {
            return Err(RecordError::InvalidToken {
                offset,
                reason: format!("expected quoted {context}"),
            });
        }

        let mut field = Vec::with_capacity(width);
        for _ in 0..width {
            let byte = self.read_byte()?.ok_or_else(|| self.truncated("quoted token"))?;
            field.push(byte);
        }
        match self.read_byte()? {
            Some(b'\'') => Ok(Some(field)),
            Some(_) => Err(RecordError::InvalidToken {
                offset,
                reason: format!("{context} is not {width} bytes wide"),
            }),
            None => Err(self.truncated("quoted token")),
        }
    }

    /// Read a quoted field of exactly `width` bytes and fail on end-of-file
    pub fn expect_quoted_field(
        &mut self,
        width: usize,
        context: &'static str,
    ) -> RecordResult<Vec<u8>> {
        self.read_quoted_field(width, context)?
            .ok_or_else(|| self.truncated(context))
    }

    /// First non-blank byte and its offset, or `None` at end-of-file
    fn skip_blanks(&mut self) -> RecordResult<Option<(u8, u64)>> {
        loop {
            match self.read_byte()? {
                None => return Ok(None),
                Some(byte) if is_blank(byte) => {}
                Some(byte) => {
                    let offset = self.position()?.saturating_sub(1);
                    return Ok(Some((byte, offset)));
                }
            }
        }
    }

    fn truncated(&self, context: &'static str) -> RecordError {
        RecordError::Truncated {
            record: self.record_count(),
            context,
        }
    }
}

impl<S: Write + Seek> RecordStream<S> {
    /// Append raw text to a formatted stream
    pub fn write_text(&mut self, text: impl AsRef<[u8]>) -> RecordResult<()> {
        self.check_formatted()?;
        self.discard_lookahead()?;
        self.get_mut().write_all(text.as_ref())?;
        Ok(())
    }
}
