//! Keyword header index
//!
//! The index is built by reading every keyword header in the file and
//! skipping its payload. Each entry records the byte offset of the header
//! record, so a keyword can later be decoded with one seek.
//!
//! Names may repeat (one `PRESSURE` per report step in a unified restart
//! file); each repetition is an *occurrence*, numbered from 0 in file order.

mod persist;

pub use persist::{INDEX_MAGIC, INDEX_VERSION, index_is_fresh};

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::ops::Range;

use resfile_formats::keyword::{ElementType, KeywordHeader};
use resfile_formats::record::RecordStream;
use tracing::{debug, warn};

use crate::Result;

/// One keyword header and its location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    header: KeywordHeader,
    /// Byte offset of the header record
    pub offset: u64,
}

impl IndexEntry {
    /// Create an entry for `header` found at `offset`
    pub fn new(header: KeywordHeader, offset: u64) -> Self {
        Self { header, offset }
    }

    /// Header this entry describes
    pub fn header(&self) -> &KeywordHeader {
        &self.header
    }

    /// Keyword name
    pub fn name(&self) -> &str {
        self.header.name()
    }

    /// Element type
    pub fn element_type(&self) -> ElementType {
        self.header.element_type()
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.header.count()
    }

    /// Whether `header` matches name, type and count of this entry
    pub fn matches(&self, header: &KeywordHeader) -> bool {
        self.header == *header
    }

    /// Human-readable `NAME TYPE x COUNT` summary
    pub fn describe(&self) -> String {
        format!("{} {} x {}", self.name(), self.element_type(), self.count())
    }
}

/// Ordered index of the keywords in a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerIndex {
    entries: Vec<IndexEntry>,
    positions: HashMap<String, Vec<usize>>,
}

impl ContainerIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a list of entries in file order
    pub fn from_entries(entries: Vec<IndexEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.push(entry);
        }
        index
    }

    /// Scan every keyword header in the stream
    ///
    /// The stream is rewound first; payloads are skipped, never decoded.
    pub fn build<S: Read + Seek>(stream: &mut RecordStream<S>) -> Result<Self> {
        Self::scan(stream, false)
    }

    /// Scan the stream, optionally stopping at the first damaged keyword
    ///
    /// With `tolerate_truncation` a keyword that cannot be read ends the
    /// scan; the keywords before it are kept.
    pub fn scan<S: Read + Seek>(
        stream: &mut RecordStream<S>,
        tolerate_truncation: bool,
    ) -> Result<Self> {
        stream.rewind()?;
        let mut index = Self::new();

        loop {
            let offset = stream.position()?;
            match Self::scan_one(stream) {
                Ok(Some(header)) => index.push(IndexEntry::new(header, offset)),
                Ok(None) => break,
                Err(e) if tolerate_truncation && e.is_corruption() => {
                    stream.reset();
                    warn!(
                        "Stopping index scan at offset {offset} after {} keywords: {e}",
                        index.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Indexed {} keywords", index.len());
        Ok(index)
    }

    fn scan_one<S: Read + Seek>(stream: &mut RecordStream<S>) -> Result<Option<KeywordHeader>> {
        let Some(header) = KeywordHeader::read(stream)? else {
            return Ok(None);
        };
        header.skip_data(stream)?;
        Ok(Some(header))
    }

    /// Append an entry after the last one
    pub fn push(&mut self, entry: IndexEntry) {
        let position = self.entries.len();
        self.positions
            .entry(entry.name().to_string())
            .or_default()
            .push(position);
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in file order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entry at `position`
    pub fn entry(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    /// Positions of every entry named `name`, in file order
    pub fn occurrences(&self, name: &str) -> &[usize] {
        self.positions.get(name).map_or(&[], Vec::as_slice)
    }

    /// Position of occurrence `occurrence` of `name`
    pub fn position_of(&self, name: &str, occurrence: usize) -> Option<usize> {
        self.occurrences(name).get(occurrence).copied()
    }

    /// Entry for occurrence `occurrence` of `name`
    pub fn get(&self, name: &str, occurrence: usize) -> Option<&IndexEntry> {
        self.position_of(name, occurrence)
            .and_then(|position| self.entries.get(position))
    }

    /// Whether any entry is named `name`
    pub fn has(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Number of entries named `name`
    pub fn count_named(&self, name: &str) -> usize {
        self.occurrences(name).len()
    }

    /// Distinct names in order of first appearance
    pub fn distinct_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(position, entry)| self.occurrences(entry.name()).first() == Some(position))
            .map(|(_, entry)| entry.name())
            .collect()
    }

    /// Entry positions of a block of keywords
    ///
    /// The block starts at occurrence `occurrence` of `start` (or at the
    /// first entry when `start` is `None`) and runs up to, not including,
    /// the next entry named `end`, or to the end of the index when `end` is
    /// `None` or never appears. Returns `None` when the start keyword has
    /// fewer occurrences.
    pub fn block(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        occurrence: usize,
    ) -> Option<Range<usize>> {
        let first = match start {
            Some(name) => self.position_of(name, occurrence)?,
            None if self.entries.is_empty() => return None,
            None => 0,
        };

        let last = end
            .and_then(|end| {
                self.entries[first + 1..]
                    .iter()
                    .position(|entry| entry.name() == end)
                    .map(|offset| first + 1 + offset)
            })
            .unwrap_or(self.entries.len());

        Some(first..last)
    }

    /// Block starting at occurrence `occurrence` of `name` and ending before
    /// its next occurrence, e.g. one report step delimited by `SEQNUM`
    pub fn report_block(&self, name: &str, occurrence: usize) -> Option<Range<usize>> {
        self.block(Some(name), Some(name), occurrence)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::Endian;
    use pretty_assertions::assert_eq;
    use resfile_formats::keyword::Keyword;
    use std::io::Cursor;

    fn entry(name: &str, offset: u64) -> IndexEntry {
        IndexEntry::new(KeywordHeader::new(name, ElementType::Int32, 1).unwrap(), offset)
    }

    fn restart_index() -> ContainerIndex {
        ContainerIndex::from_entries(
            ["SEQNUM", "INTEHEAD", "PRESSURE", "SEQNUM", "INTEHEAD", "PRESSURE", "SWAT"]
                .iter()
                .enumerate()
                .map(|(i, name)| entry(name, i as u64 * 100))
                .collect(),
        )
    }

    #[test]
    fn test_lookup_by_occurrence() {
        let index = restart_index();
        assert_eq!(index.len(), 7);
        assert_eq!(index.occurrences("PRESSURE"), &[2, 5]);
        assert_eq!(index.get("PRESSURE", 1).unwrap().offset, 500);
        assert!(index.get("PRESSURE", 2).is_none());
        assert!(index.get("MISSING", 0).is_none());
        assert_eq!(index.count_named("SEQNUM"), 2);
        assert!(index.has("SWAT"));
        assert!(!index.has("SGAS"));
        assert_eq!(
            index.distinct_names(),
            vec!["SEQNUM", "INTEHEAD", "PRESSURE", "SWAT"]
        );
    }

    #[test]
    fn test_blocks() {
        let index = restart_index();
        assert_eq!(index.report_block("SEQNUM", 0), Some(0..3));
        assert_eq!(index.report_block("SEQNUM", 1), Some(3..7));
        assert_eq!(index.report_block("SEQNUM", 2), None);
        assert_eq!(index.block(Some("INTEHEAD"), Some("SWAT"), 0), Some(1..6));
        assert_eq!(index.block(None, Some("SEQNUM"), 0), Some(0..3));
        assert_eq!(index.block(Some("PRESSURE"), None, 1), Some(5..7));
        assert_eq!(ContainerIndex::new().block(None, None, 0), None);
    }

    #[test]
    fn test_build_records_header_offsets() {
        let keywords = vec![
            Keyword::from_values("COUNT", &[42_i32]).unwrap(),
            Keyword::from_values("PRES", &[1.0_f32, 2.0, 3.0]).unwrap(),
            Keyword::from_strings("NAME", &["AAAAAAAA", "BBBBBBBB"]).unwrap(),
        ];
        let mut stream = RecordStream::new(Cursor::new(Vec::new()), Endian::Big);
        for kw in &keywords {
            kw.encode(&mut stream).unwrap();
        }

        let index = ContainerIndex::build(&mut stream).unwrap();
        let mut offset = 0;
        for (entry, kw) in index.entries().iter().zip(&keywords) {
            assert!(entry.matches(&kw.header()));
            assert_eq!(entry.offset, offset);
            offset += kw.header().encoded_len();
        }
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_tolerant_scan_keeps_intact_prefix() {
        let mut stream = RecordStream::new(Cursor::new(Vec::new()), Endian::Big);
        Keyword::from_values("A", &[1_i32]).unwrap().encode(&mut stream).unwrap();
        Keyword::from_values("B", &[2.0_f64; 10]).unwrap().encode(&mut stream).unwrap();
        let mut bytes = stream.into_inner().into_inner();
        bytes.truncate(bytes.len() - 20);

        let mut stream = RecordStream::new(Cursor::new(bytes), Endian::Big);
        assert!(ContainerIndex::build(&mut stream).unwrap_err().is_corruption());

        let index = ContainerIndex::scan(&mut stream, true).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.entry(0).unwrap().name(), "A");
    }
}
