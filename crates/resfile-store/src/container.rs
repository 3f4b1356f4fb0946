//! Container sessions
//!
//! A [`Container`] owns the record stream of one open file together with
//! its lazy index. It is the surface the domain layers use: open, list
//! keywords, fetch one by name and occurrence, append, rewrite in place,
//! close.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use binrw::Endian;
use resfile_formats::keyword::Keyword;
use resfile_formats::record::{OpenMode, RecordStream, guess_endianness, looks_like_formatted};
use tracing::{debug, info, warn};

use crate::config::ContainerConfig;
use crate::index::{ContainerIndex, IndexEntry};
use crate::lazy::{BlockHandle, LazyIndex, Transaction};
use crate::{Result, StorageError};

/// An open container file
#[derive(Debug)]
pub struct Container<S = File> {
    stream: RecordStream<S>,
    lazy: LazyIndex,
    writable: bool,
}

impl Container<File> {
    /// Open a container and index its keywords
    ///
    /// The variant and byte order are taken from `config` or detected from
    /// the file. An empty file is a valid, empty container.
    pub fn open(path: impl AsRef<Path>, config: ContainerConfig) -> Result<Self> {
        let path = path.as_ref();
        let stream = open_stream(path, &config)?;
        let container = Self::from_stream(stream, &config)?;
        info!(
            "Opened {} with {} keywords ({}, {:?})",
            path.display(),
            container.index().len(),
            if container.is_formatted() { "formatted" } else { "unformatted" },
            container.endian()
        );
        Ok(container)
    }

    /// Open a container using a persisted index when it is still fresh
    ///
    /// Falls back to a full scan when the index file is missing, stale,
    /// unreadable or belongs to another file.
    pub fn open_with_index(
        path: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
        config: ContainerConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let index_path = index_path.as_ref();

        let index = match ContainerIndex::load(path, index_path) {
            Ok(index) => index,
            Err(e) if e.is_corruption() || matches!(e, StorageError::BinRw(_)) => {
                warn!("Ignoring index file {}: {e}", index_path.display());
                None
            }
            Err(e) => return Err(e),
        };
        let Some(index) = index else {
            debug!("No usable index at {}, scanning", index_path.display());
            return Self::open(path, config);
        };

        let stream = open_stream(path, &config)?;
        info!(
            "Opened {} with {} keywords from {}",
            path.display(),
            index.len(),
            index_path.display()
        );
        Ok(Self {
            stream,
            lazy: LazyIndex::new(index),
            writable: config.writable,
        })
    }

    /// Create an empty container, truncating any existing file
    ///
    /// `Auto` byte order creates a big-endian file.
    pub fn create(path: impl AsRef<Path>, config: ContainerConfig) -> Result<Self> {
        let path = path.as_ref();
        let endian = config.endian.fixed().unwrap_or(Endian::Big);
        drop(RecordStream::open_with_endian(path, OpenMode::Write, endian)?);

        let stream = RecordStream::open_with_endian(path, OpenMode::ReadWrite, endian)?
            .with_formatted(config.formatted.unwrap_or(false));
        info!("Created {}", path.display());
        Ok(Self {
            stream,
            lazy: LazyIndex::default(),
            writable: true,
        })
    }

    /// Persist the index next to the data file
    pub fn write_index(&self, index_path: impl AsRef<Path>) -> Result<()> {
        let path = self
            .stream
            .path()
            .ok_or(StorageError::Unsupported("index files for unnamed streams"))?;
        self.index().save(path, index_path.as_ref())
    }
}

fn open_stream(path: &Path, config: &ContainerConfig) -> Result<RecordStream<File>> {
    let mode = if config.writable {
        OpenMode::ReadWrite
    } else {
        OpenMode::Read
    };

    let mut file = File::open(path)?;
    let formatted = match config.formatted {
        Some(formatted) => formatted,
        None => looks_like_formatted(&mut file)?,
    };
    let endian = match config.endian.fixed() {
        Some(endian) => endian,
        None if formatted => Endian::Big,
        None => detect_endian(&mut file, path)?,
    };
    drop(file);

    Ok(RecordStream::open_with_endian(path, mode, endian)?.with_formatted(formatted))
}

fn detect_endian(file: &mut File, path: &Path) -> Result<Endian> {
    if let Some(endian) = guess_endianness(file)? {
        return Ok(endian);
    }
    if file.metadata()?.len() == 0 {
        return Ok(Endian::Big);
    }
    Err(StorageError::UnrecognizedFormat(path.to_path_buf()))
}

impl<S: Read + Seek> Container<S> {
    /// Index an already open record stream
    pub fn from_stream(mut stream: RecordStream<S>, config: &ContainerConfig) -> Result<Self> {
        let index = ContainerIndex::scan(&mut stream, config.tolerate_truncation)?;
        Ok(Self {
            stream,
            lazy: LazyIndex::new(index),
            writable: config.writable,
        })
    }

    /// Keyword index
    pub fn index(&self) -> &ContainerIndex {
        self.lazy.index()
    }

    /// Lazy entries with their load state
    pub fn lazy(&self) -> &LazyIndex {
        &self.lazy
    }

    /// Byte order of the file
    pub fn endian(&self) -> Endian {
        self.stream.endian()
    }

    /// Whether this is the formatted (ASCII) variant
    pub fn is_formatted(&self) -> bool {
        self.stream.is_formatted()
    }

    /// Whether write operations are allowed
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Path of the file, when opened from one
    pub fn path(&self) -> Option<&Path> {
        self.stream.path()
    }

    /// Whether occurrence `occurrence` of `name` exists
    pub fn has_keyword(&self, name: &str, occurrence: usize) -> bool {
        self.index().get(name, occurrence).is_some()
    }

    /// Materialize occurrence `occurrence` of `name` and take a reference
    pub fn get_keyword(&mut self, name: &str, occurrence: usize) -> Result<BlockHandle> {
        self.lazy.materialize_named(name, occurrence, &mut self.stream)
    }

    /// Like [`Container::get_keyword`], but `None` for a missing keyword
    pub fn handle_for(&mut self, name: &str, occurrence: usize) -> Result<Option<BlockHandle>> {
        match self.get_keyword(name, occurrence) {
            Ok(handle) => Ok(Some(handle)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Materialize the keyword at index position `position`
    pub fn get_keyword_at(&mut self, position: usize) -> Result<BlockHandle> {
        self.lazy.materialize(position, &mut self.stream)
    }

    /// Materialize every keyword
    pub fn load_all(&mut self) -> Result<Vec<BlockHandle>> {
        self.lazy.load_all(&mut self.stream)
    }

    /// Keyword behind a handle
    pub fn keyword(&mut self, handle: BlockHandle) -> Result<&Keyword> {
        self.lazy.keyword(handle)
    }

    /// Mutable keyword behind a handle; see [`Container::save_keyword`]
    pub fn keyword_mut(&mut self, handle: BlockHandle) -> Result<&mut Keyword> {
        self.lazy.keyword_mut(handle)
    }

    /// Index entry a handle was materialized from
    pub fn entry_for(&mut self, handle: BlockHandle) -> Option<&IndexEntry> {
        self.lazy.entry_for(handle)
    }

    /// Give back a reference taken by `get_keyword`
    pub fn release(&mut self, handle: BlockHandle) -> Result<usize> {
        self.lazy.release(handle)
    }

    /// Free an unreferenced payload
    pub fn drop_keyword(&mut self, handle: BlockHandle) -> Result<()> {
        self.lazy.drop_handle(handle)
    }

    /// Snapshot reference counts; see [`LazyIndex::start_transaction`]
    pub fn start_transaction(&self) -> Transaction {
        self.lazy.start_transaction()
    }

    /// Unload what was loaded since `transaction` started
    pub fn end_transaction(&mut self, transaction: Transaction) {
        self.lazy.end_transaction(transaction);
    }

    /// Close the container
    pub fn close(self) -> Result<()> {
        match self.stream.path() {
            Some(path) => info!("Closed {}", path.display()),
            None => info!("Closed container"),
        }
        Ok(())
    }
}

impl<S: Read + Write + Seek> Container<S> {
    fn check_writable(&self) -> Result<()> {
        if self.writable {
            return Ok(());
        }
        Err(StorageError::ReadOnly(
            self.stream.path().map(Path::to_path_buf).unwrap_or_default(),
        ))
    }

    /// Write `block` at the end of the file and index it
    ///
    /// Returns the index position of the new entry.
    pub fn append_keyword(&mut self, block: &Keyword) -> Result<usize> {
        self.check_writable()?;
        let offset = self.stream.seek_end()?;
        block.encode(&mut self.stream)?;
        self.stream.flush()?;

        let position = self.lazy.push(IndexEntry::new(block.header(), offset));
        debug!("Appended {} at offset {offset}", block.name());
        Ok(position)
    }

    /// Overwrite the payload of occurrence `occurrence` of `name`
    ///
    /// `block` must have the same name, type and count.
    pub fn replace_keyword_in_place(
        &mut self,
        name: &str,
        occurrence: usize,
        block: &Keyword,
    ) -> Result<()> {
        self.check_writable()?;
        let position = self
            .index()
            .position_of(name, occurrence)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
                occurrence,
            })?;
        self.lazy.replace_in_place(position, block, &mut self.stream)
    }

    /// Write an edited materialized keyword back to where it was read from
    pub fn save_keyword(&mut self, handle: BlockHandle) -> Result<()> {
        self.check_writable()?;
        self.lazy.save(handle, &mut self.stream)
    }

    /// Flush buffered writes
    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn memory_container(writable: bool) -> Container<Cursor<Vec<u8>>> {
        let mut stream = RecordStream::new(Cursor::new(Vec::new()), Endian::Big);
        Keyword::from_values("COUNT", &[42_i32]).unwrap().encode(&mut stream).unwrap();
        Container::from_stream(stream, &ContainerConfig::default().with_writable(writable))
            .unwrap()
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut container = memory_container(false);
        let block = Keyword::from_values("COUNT", &[1_i32]).unwrap();
        assert!(matches!(
            container.append_keyword(&block),
            Err(StorageError::ReadOnly(_))
        ));
        assert!(matches!(
            container.replace_keyword_in_place("COUNT", 0, &block),
            Err(StorageError::ReadOnly(_))
        ));
        assert_eq!(container.index().len(), 1);
    }

    #[test]
    fn test_append_indexes_new_keyword() {
        let mut container = memory_container(true);
        let block = Keyword::from_values("PRES", &[1.0_f32, 2.0]).unwrap();
        let position = container.append_keyword(&block).unwrap();
        assert_eq!(position, 1);
        assert_eq!(container.index().get("PRES", 0).unwrap().offset, 36);

        let handle = container.get_keyword("PRES", 0).unwrap();
        assert_eq!(container.keyword(handle).unwrap(), &block);
        assert_eq!(container.handle_for("PRES", 1).unwrap(), None);
    }
}
