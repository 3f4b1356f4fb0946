//! Persisted index files
//!
//! Scanning a large unified restart file touches every keyword header. The
//! index can be saved next to the data file and reloaded later, as long as
//! the data file has not changed since:
//!
//! ```text
//! "RFIX" | version: u16 | source_len: u16 | source name | entry_count: u32
//! entry_count x { name: [u8; 8] | count: i32 | offset: u64 | tag: [u8; 4] }
//! ```
//!
//! All integers are little-endian.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite, binrw};
use resfile_formats::keyword::{KeywordHeader, NAME_LENGTH, RawKeywordHeader};
use tracing::debug;

use super::{ContainerIndex, IndexEntry};
use crate::{Result, StorageError};

/// Magic bytes at the start of an index file
pub const INDEX_MAGIC: [u8; 4] = *b"RFIX";

/// Current index file version
pub const INDEX_VERSION: u16 = 1;

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(little, magic = b"RFIX")]
struct IndexFileHeader {
    version: u16,
    #[br(temp)]
    #[bw(calc = source.len() as u16)]
    source_len: u16,
    #[br(count = source_len)]
    source: Vec<u8>,
    entry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
struct IndexFileEntry {
    name: [u8; NAME_LENGTH],
    count: i32,
    offset: u64,
    tag: [u8; 4],
}

impl IndexFileEntry {
    fn from_entry(entry: &IndexEntry) -> Self {
        let raw = entry.header().to_raw();
        Self {
            name: raw.name,
            count: raw.count,
            offset: entry.offset,
            tag: raw.tag,
        }
    }

    fn to_entry(self) -> Result<IndexEntry> {
        let raw = RawKeywordHeader {
            name: self.name,
            count: self.count,
            tag: self.tag,
        };
        let header = KeywordHeader::from_raw(&raw)
            .map_err(|e| StorageError::InvalidIndexFile(e.to_string()))?;
        Ok(IndexEntry::new(header, self.offset))
    }
}

/// File name component of `path`, as stored in index files
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether an index file can be trusted for `data_path`
///
/// Both files must exist and the data file must not be newer than the
/// index file.
pub fn index_is_fresh(data_path: &Path, index_path: &Path) -> std::io::Result<bool> {
    let (Ok(data), Ok(index)) = (fs::metadata(data_path), fs::metadata(index_path)) else {
        return Ok(false);
    };
    Ok(data.modified()? <= index.modified()?)
}

impl ContainerIndex {
    /// Serialize the index, tagged with the name of its source file
    pub fn write_persisted<W: Write + Seek>(&self, writer: &mut W, source: &str) -> Result<()> {
        if source.len() > usize::from(u16::MAX) {
            return Err(StorageError::ContractViolation(format!(
                "source name of {} bytes does not fit the index file",
                source.len()
            )));
        }
        let entry_count = u32::try_from(self.len()).map_err(|_| {
            StorageError::ContractViolation(format!("{} entries do not fit the index file", self.len()))
        })?;

        let header = IndexFileHeader {
            version: INDEX_VERSION,
            source: source.as_bytes().to_vec(),
            entry_count,
        };
        header.write(writer)?;
        for entry in self.entries() {
            IndexFileEntry::from_entry(entry).write(writer)?;
        }
        Ok(())
    }

    /// Deserialize an index and return it with its source file name
    pub fn read_persisted<R: Read + Seek>(reader: &mut R) -> Result<(String, Self)> {
        let header = IndexFileHeader::read(reader).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => {
                StorageError::InvalidIndexFile("missing RFIX magic".to_string())
            }
            other => StorageError::BinRw(other),
        })?;
        if header.version != INDEX_VERSION {
            return Err(StorageError::InvalidIndexFile(format!(
                "unsupported version {}",
                header.version
            )));
        }

        let mut index = Self::new();
        for _ in 0..header.entry_count {
            index.push(IndexFileEntry::read(reader)?.to_entry()?);
        }

        let source = String::from_utf8_lossy(&header.source).into_owned();
        Ok((source, index))
    }

    /// Write the index for `data_path` to `index_path`
    pub fn save(&self, data_path: &Path, index_path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(index_path)?);
        self.write_persisted(&mut writer, &source_name(data_path))?;
        writer.flush()?;
        debug!(
            "Wrote index of {} keywords to {}",
            self.len(),
            index_path.display()
        );
        Ok(())
    }

    /// Load the index saved for `data_path`
    ///
    /// Returns `Ok(None)` when the index file is missing, older than the data
    /// file, or was written for a different file.
    pub fn load(data_path: &Path, index_path: &Path) -> Result<Option<Self>> {
        if !index_is_fresh(data_path, index_path)? {
            return Ok(None);
        }

        let mut reader = BufReader::new(File::open(index_path)?);
        let (source, index) = Self::read_persisted(&mut reader)?;
        if source != source_name(data_path) {
            debug!(
                "Index file {} belongs to {source}, not {}",
                index_path.display(),
                data_path.display()
            );
            return Ok(None);
        }
        Ok(Some(index))
    }
}
