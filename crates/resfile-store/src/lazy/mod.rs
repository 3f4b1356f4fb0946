//! Lazily materialized keywords
//!
//! Every index entry gets a [`LazyEntry`]. The payload is decoded the first
//! time the keyword is requested and cached with a reference count; each
//! [`LazyIndex::materialize`] must be paired with a [`LazyIndex::release`].
//! A payload can be dropped once nobody holds it, which keeps memory bounded
//! when walking through the report steps of a large restart file.
//!
//! Materialized keywords are addressed through [`BlockHandle`]s. The
//! [`InverseMap`] maps a handle back to the entry it came from, so an edited
//! keyword can be written back to its own offset.
//!
//! ```text
//!            materialize                 release
//! Unloaded ──────────────► Loaded(1) ◄──────────► Loaded(n)
//!     ▲                        │        materialize
//!     └────── drop_payload ────┘ (refs == 0)
//! ```

mod inverse_map;

pub use inverse_map::InverseMap;

use std::fmt;
use std::io::{Read, Seek, Write};

use resfile_formats::keyword::{Keyword, KeywordHeader};
use resfile_formats::record::RecordStream;
use tracing::debug;

use crate::index::{ContainerIndex, IndexEntry};
use crate::{Result, StorageError};

/// Identity of one materialization of a keyword
///
/// Handles are handed out in increasing order and never reused, so a handle
/// kept past [`LazyIndex::drop_payload`] can never alias a later load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHandle(pub(crate) u64);

impl BlockHandle {
    /// Numeric id of the handle
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index entry with its optional decoded payload
#[derive(Debug, Clone)]
pub struct LazyEntry {
    entry: IndexEntry,
    block: Option<Keyword>,
    handle: Option<BlockHandle>,
    refs: usize,
}

impl LazyEntry {
    fn new(entry: IndexEntry) -> Self {
        Self {
            entry,
            block: None,
            handle: None,
            refs: 0,
        }
    }

    /// Metadata recorded by the index scan
    pub fn entry(&self) -> &IndexEntry {
        &self.entry
    }

    /// Decoded keyword, if loaded
    pub fn block(&self) -> Option<&Keyword> {
        self.block.as_ref()
    }

    /// Handle of the current materialization
    pub fn handle(&self) -> Option<BlockHandle> {
        self.handle
    }

    /// Outstanding references
    pub fn refs(&self) -> usize {
        self.refs
    }

    /// Whether the payload is in memory
    pub fn is_loaded(&self) -> bool {
        self.block.is_some()
    }

    fn unload(&mut self) -> Option<BlockHandle> {
        self.block = None;
        self.refs = 0;
        self.handle.take()
    }
}

/// Reference counts captured by [`LazyIndex::start_transaction`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a transaction must be passed to end_transaction"]
pub struct Transaction {
    refs: Vec<usize>,
}

impl Transaction {
    /// Number of entries covered by the snapshot
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether the snapshot covers no entries
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Container index with lazily decoded payloads
#[derive(Debug, Clone, Default)]
pub struct LazyIndex {
    index: ContainerIndex,
    entries: Vec<LazyEntry>,
    inverse: InverseMap,
    next_handle: u64,
}

impl LazyIndex {
    /// Wrap an index; nothing is loaded yet
    pub fn new(index: ContainerIndex) -> Self {
        let entries = index.entries().iter().cloned().map(LazyEntry::new).collect();
        Self {
            index,
            entries,
            inverse: InverseMap::new(),
            next_handle: 1,
        }
    }

    /// The underlying index
    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lazy entry at `position`
    pub fn entry(&self, position: usize) -> Option<&LazyEntry> {
        self.entries.get(position)
    }

    /// All lazy entries in file order
    pub fn entries(&self) -> &[LazyEntry] {
        &self.entries
    }

    /// Number of entries whose payload is in memory
    pub fn loaded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_loaded()).count()
    }

    /// Append a trailing entry for a keyword written after the scan
    pub fn push(&mut self, entry: IndexEntry) -> usize {
        self.index.push(entry.clone());
        self.entries.push(LazyEntry::new(entry));
        self.entries.len() - 1
    }

    /// Decode the keyword at `position`, or take another reference to it
    ///
    /// The header found on disk must match the indexed metadata exactly;
    /// a mismatch means the file changed after it was indexed.
    pub fn materialize<S: Read + Seek>(
        &mut self,
        position: usize,
        stream: &mut RecordStream<S>,
    ) -> Result<BlockHandle> {
        let lazy = self
            .entries
            .get_mut(position)
            .ok_or_else(|| no_entry(position))?;

        if let Some(handle) = lazy.handle.filter(|_| lazy.block.is_some()) {
            lazy.refs += 1;
            return Ok(handle);
        }

        stream.seek_to(lazy.entry.offset)?;
        let header = KeywordHeader::read(stream)?;
        let header = verify_header(position, &lazy.entry, header)?;
        let block = Keyword::decode_with_header(stream, header)?;

        let handle = BlockHandle(self.next_handle);
        self.next_handle += 1;
        lazy.block = Some(block);
        lazy.handle = Some(handle);
        lazy.refs = 1;
        self.inverse.insert(handle, position);

        debug!(
            "Materialized {} at offset {} as {handle}",
            lazy.entry.describe(),
            lazy.entry.offset
        );
        Ok(handle)
    }

    /// Materialize occurrence `occurrence` of `name`
    pub fn materialize_named<S: Read + Seek>(
        &mut self,
        name: &str,
        occurrence: usize,
        stream: &mut RecordStream<S>,
    ) -> Result<BlockHandle> {
        let position = self
            .index
            .position_of(name, occurrence)
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
                occurrence,
            })?;
        self.materialize(position, stream)
    }

    /// Materialize every entry, taking one reference to each
    pub fn load_all<S: Read + Seek>(
        &mut self,
        stream: &mut RecordStream<S>,
    ) -> Result<Vec<BlockHandle>> {
        (0..self.entries.len())
            .map(|position| self.materialize(position, stream))
            .collect()
    }

    /// Index position a handle was materialized from
    pub fn find_entry_for(&mut self, handle: BlockHandle) -> Option<usize> {
        self.inverse.find_entry_for(handle)
    }

    /// Index entry a handle was materialized from
    pub fn entry_for(&mut self, handle: BlockHandle) -> Option<&IndexEntry> {
        let position = self.inverse.find_entry_for(handle)?;
        self.entries.get(position).map(LazyEntry::entry)
    }

    fn loaded(&mut self, handle: BlockHandle) -> Result<(usize, &mut LazyEntry)> {
        let position = self
            .inverse
            .find_entry_for(handle)
            .ok_or(StorageError::UnknownHandle(handle.0))?;
        let lazy = self
            .entries
            .get_mut(position)
            .filter(|lazy| lazy.handle == Some(handle))
            .ok_or(StorageError::UnknownHandle(handle.0))?;
        Ok((position, lazy))
    }

    /// Materialized keyword behind `handle`
    pub fn keyword(&mut self, handle: BlockHandle) -> Result<&Keyword> {
        let (_, lazy) = self.loaded(handle)?;
        lazy.block
            .as_ref()
            .ok_or(StorageError::UnknownHandle(handle.0))
    }

    /// Mutable access to the materialized keyword behind `handle`
    ///
    /// Edits stay in memory until written with [`LazyIndex::save`].
    pub fn keyword_mut(&mut self, handle: BlockHandle) -> Result<&mut Keyword> {
        let (_, lazy) = self.loaded(handle)?;
        lazy.block
            .as_mut()
            .ok_or(StorageError::UnknownHandle(handle.0))
    }

    /// Give back one reference and return how many remain
    pub fn release(&mut self, handle: BlockHandle) -> Result<usize> {
        let (_, lazy) = self.loaded(handle)?;
        if lazy.refs == 0 {
            return Err(StorageError::ContractViolation(format!(
                "release of {handle} without an outstanding reference"
            )));
        }
        lazy.refs -= 1;
        Ok(lazy.refs)
    }

    /// Free the payload at `position`, keeping its metadata
    ///
    /// Dropping an unloaded entry does nothing.
    pub fn drop_payload(&mut self, position: usize) -> Result<()> {
        let lazy = self
            .entries
            .get_mut(position)
            .ok_or_else(|| no_entry(position))?;
        if lazy.refs > 0 {
            return Err(StorageError::StillReferenced {
                name: lazy.entry.name().to_string(),
                refs: lazy.refs,
            });
        }
        if let Some(handle) = lazy.unload() {
            self.inverse.remove(handle);
            debug!("Dropped payload of {}", lazy.entry.describe());
        }
        Ok(())
    }

    /// Free the payload behind `handle`
    pub fn drop_handle(&mut self, handle: BlockHandle) -> Result<()> {
        let (position, _) = self.loaded(handle)?;
        self.drop_payload(position)
    }

    /// Overwrite the payload of the keyword at `position` on disk
    ///
    /// `block` must have the indexed name, type and count. Only the data
    /// records after the header are rewritten, so every offset in the index
    /// stays valid. A cached copy is updated to the new contents.
    pub fn replace_in_place<S: Read + Write + Seek>(
        &mut self,
        position: usize,
        block: &Keyword,
        stream: &mut RecordStream<S>,
    ) -> Result<()> {
        let lazy = self
            .entries
            .get(position)
            .ok_or_else(|| no_entry(position))?;
        write_payload(position, &lazy.entry, block, stream)?;

        if let Some(cached) = self.entries.get_mut(position).and_then(|e| e.block.as_mut()) {
            cached.clone_from(block);
        }
        Ok(())
    }

    /// Write the materialized keyword behind `handle` back to its offset
    pub fn save<S: Read + Write + Seek>(
        &mut self,
        handle: BlockHandle,
        stream: &mut RecordStream<S>,
    ) -> Result<()> {
        let (position, lazy) = self.loaded(handle)?;
        let block = lazy
            .block
            .as_ref()
            .ok_or(StorageError::UnknownHandle(handle.0))?;
        write_payload(position, &lazy.entry, block, stream)
    }

    /// Snapshot the reference count of every entry
    pub fn start_transaction(&self) -> Transaction {
        Transaction {
            refs: self.entries.iter().map(LazyEntry::refs).collect(),
        }
    }

    /// Undo the references taken since `transaction` started
    ///
    /// Entries that were unreferenced at the start are unloaded; the others
    /// get their old reference count back.
    pub fn end_transaction(&mut self, transaction: Transaction) {
        let mut dropped = 0;
        for (lazy, refs) in self.entries.iter_mut().zip(transaction.refs) {
            if refs == 0 {
                if let Some(handle) = lazy.unload() {
                    self.inverse.remove(handle);
                    dropped += 1;
                }
            } else if lazy.is_loaded() {
                lazy.refs = refs;
            }
        }
        debug!("Transaction ended, dropped {dropped} payloads");
    }
}

fn no_entry(position: usize) -> StorageError {
    StorageError::ContractViolation(format!("no index entry at position {position}"))
}

fn verify_header(
    position: usize,
    entry: &IndexEntry,
    header: Option<KeywordHeader>,
) -> Result<KeywordHeader> {
    match header {
        Some(header) if entry.matches(&header) => Ok(header),
        Some(header) => Err(StorageError::IndexCorruption {
            position,
            expected: entry.describe(),
            found: format!(
                "{} {} x {}",
                header.name(),
                header.element_type(),
                header.count()
            ),
        }),
        None => Err(StorageError::IndexCorruption {
            position,
            expected: entry.describe(),
            found: "end of file".to_string(),
        }),
    }
}

fn write_payload<S: Read + Write + Seek>(
    position: usize,
    entry: &IndexEntry,
    block: &Keyword,
    stream: &mut RecordStream<S>,
) -> Result<()> {
    if stream.is_formatted() {
        return Err(StorageError::Unsupported(
            "in-place replacement in formatted files",
        ));
    }
    if !entry.matches(&block.header()) {
        return Err(StorageError::ContractViolation(format!(
            "in-place replacement of {} with {} {} x {}",
            entry.describe(),
            block.name(),
            block.element_type(),
            block.count()
        )));
    }

    stream.seek_to(entry.offset)?;
    let header = KeywordHeader::read(stream)?;
    verify_header(position, entry, header)?;
    block.encode_data(stream)?;
    stream.flush()?;

    debug!(
        "Rewrote payload of {} at offset {}",
        entry.describe(),
        entry.offset
    );
    Ok(())
}
