//! Keyword (typed block) implementation
//!
//! A keyword is a named, typed array. On disk it is a 16-byte header
//! sub-record (name, element count, type tag) followed by the payload spread
//! over as many physical records as the per-type block size requires.
//!
//! # Features
//!
//! - Closed [`ElementType`] set with tag parsing and block-size rules
//! - Binary and formatted (ASCII) codecs
//! - Generic numeric accessors with widening conversions
//! - Checked element-wise arithmetic
//! - Approximate comparison within absolute and relative tolerances

mod arith;
mod codec;
mod compare;
mod element;
mod error;
mod formatted;
mod header;
mod value;

pub use compare::Tolerance;
pub use element::{
    ElementType, FIXED_STRING_WIDTH, MAX_STRING_WIDTH, NUMERIC_BLOCK_SIZE, STRING_BLOCK_SIZE,
};
pub use error::{KeywordError, KeywordResult};
pub use header::{HEADER_SIZE, KeywordHeader, NAME_LENGTH, RawKeywordHeader, normalize_name};
pub use value::{BinaryOp, Numeric, Stored};

use header::validate_count;

/// On-disk value of a true logical element
pub const LOGICAL_TRUE: i32 = -1;

/// On-disk value of a false logical element
pub const LOGICAL_FALSE: i32 = 0;

/// Named, typed array
///
/// The payload is kept in host byte order. Strings are stored as raw
/// space-padded bytes, logicals as `i32` -1/0. The buffer length always equals
/// `count * element_type.element_size()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    name: String,
    element_type: ElementType,
    count: usize,
    data: Vec<u8>,
}

impl Keyword {
    /// Create a keyword of zeros, or of blanks for string types
    pub fn new(name: &str, element_type: ElementType, count: usize) -> KeywordResult<Self> {
        let header = KeywordHeader::new(name, element_type, count)?;
        Ok(Self::from_header(header))
    }

    /// Create an empty keyword shaped like `header`
    pub fn from_header(header: KeywordHeader) -> Self {
        let data = vec![header.element_type.fill_byte(); header.payload_bytes()];
        Self {
            name: header.name,
            element_type: header.element_type,
            count: header.count,
            data,
        }
    }

    /// Assemble a keyword from a header and a host-order payload
    pub(crate) fn from_parts(header: KeywordHeader, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), header.payload_bytes());
        Self {
            name: header.name,
            element_type: header.element_type,
            count: header.count,
            data,
        }
    }

    /// Create a keyword holding `values`
    pub fn from_values<T: Numeric>(name: &str, values: &[T]) -> KeywordResult<Self> {
        let mut keyword = Self::new(name, T::ELEMENT_TYPE, values.len())?;
        keyword.store_values(values);
        Ok(keyword)
    }

    /// Create a `LOGI` keyword
    pub fn from_bools(name: &str, values: &[bool]) -> KeywordResult<Self> {
        let mut keyword = Self::new(name, ElementType::Bool32, values.len())?;
        for (index, value) in values.iter().enumerate() {
            keyword.set_bool(index, *value)?;
        }
        Ok(keyword)
    }

    /// Create a `CHAR` keyword; every value must fit 8 bytes
    pub fn from_strings<S: AsRef<str>>(name: &str, values: &[S]) -> KeywordResult<Self> {
        Self::from_strings_as(name, ElementType::FixedString8, values)
    }

    /// Create a `C0NN` keyword of the given width
    pub fn from_strings_with_width<S: AsRef<str>>(
        name: &str,
        width: usize,
        values: &[S],
    ) -> KeywordResult<Self> {
        Self::from_strings_as(name, ElementType::variable_string(width)?, values)
    }

    fn from_strings_as<S: AsRef<str>>(
        name: &str,
        element_type: ElementType,
        values: &[S],
    ) -> KeywordResult<Self> {
        let mut keyword = Self::new(name, element_type, values.len())?;
        for (index, value) in values.iter().enumerate() {
            keyword.set_str(index, value.as_ref())?;
        }
        Ok(keyword)
    }

    /// Create a `MESS` marker keyword
    pub fn message(name: &str) -> KeywordResult<Self> {
        Self::new(name, ElementType::Message, 0)
    }

    /// Keyword name without padding
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

    /// Whether the keyword has no elements
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Header describing this keyword
    pub fn header(&self) -> KeywordHeader {
        KeywordHeader {
            name: self.name.clone(),
            element_type: self.element_type,
            count: self.count,
        }
    }

    /// Payload in host byte order
    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rename the keyword
    pub fn rename(&mut self, name: &str) -> KeywordResult<()> {
        self.name = normalize_name(name)?;
        Ok(())
    }

    /// Whether name, type and count match
    pub fn header_eq(&self, other: &Self) -> bool {
        self.name == other.name && self.element_type == other.element_type && self.count == other.count
    }

    /// Whether type, count and payload bytes match, ignoring the name
    pub fn content_eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type && self.count == other.count && self.data == other.data
    }

    /// Change the number of elements; new ones are zeros or blanks
    pub fn resize(&mut self, count: usize) -> KeywordResult<()> {
        self.count = validate_count(count)?;
        self.data
            .resize(count * self.element_type.element_size(), self.element_type.fill_byte());
        Ok(())
    }

    fn check_index(&self, index: usize) -> KeywordResult<()> {
        if index >= self.count {
            return Err(KeywordError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        Ok(())
    }

    fn element_bytes(&self, index: usize) -> &[u8] {
        let size = self.element_type.element_size();
        &self.data[index * size..(index + 1) * size]
    }

    fn element_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        let size = self.element_type.element_size();
        &mut self.data[index * size..(index + 1) * size]
    }

    fn mismatch(&self, requested: &'static str) -> KeywordError {
        KeywordError::TypeMismatch {
            actual: self.element_type,
            requested,
        }
    }

    /// Read element `index` as the stored numeric value
    pub fn get_stored(&self, index: usize) -> KeywordResult<Stored> {
        self.check_index(index)?;
        let bytes = self.element_bytes(index);
        match self.element_type {
            ElementType::Int32 => Ok(Stored::Int(i32::from_ne_slice(bytes))),
            ElementType::Real32 => Ok(Stored::Real(f32::from_ne_slice(bytes))),
            ElementType::Real64 => Ok(Stored::Double(f64::from_ne_slice(bytes))),
            _ => Err(self.mismatch("numeric")),
        }
    }

    /// Read element `index` as `T`, converting from the stored type
    ///
    /// Floating targets accept any numeric storage; `i32` accepts only
    /// `INTE` storage.
    pub fn get_as<T: Numeric>(&self, index: usize) -> KeywordResult<T> {
        let stored = self.get_stored(index)?;
        T::from_stored(stored).ok_or_else(|| self.mismatch(T::NAME))
    }

    /// Read element `index`, which must be stored exactly as `T`
    pub fn get<T: Numeric>(&self, index: usize) -> KeywordResult<T> {
        self.expect_type::<T>()?;
        self.check_index(index)?;
        Ok(T::from_ne_slice(self.element_bytes(index)))
    }

    /// Overwrite element `index`, which must be stored exactly as `T`
    pub fn set<T: Numeric>(&mut self, index: usize, value: T) -> KeywordResult<()> {
        self.expect_type::<T>()?;
        self.check_index(index)?;
        value.write_ne_slice(self.element_bytes_mut(index));
        Ok(())
    }

    /// Set every element to `value`
    pub fn fill<T: Numeric>(&mut self, value: T) -> KeywordResult<()> {
        self.expect_type::<T>()?;
        let size = self.element_type.element_size();
        for chunk in self.data.chunks_exact_mut(size) {
            value.write_ne_slice(chunk);
        }
        Ok(())
    }

    /// All elements, which must be stored exactly as `T`
    pub fn values<T: Numeric>(&self) -> KeywordResult<Vec<T>> {
        self.expect_type::<T>()?;
        Ok(self.iter_values::<T>().collect())
    }

    /// All elements converted to `T`
    pub fn to_vec_as<T: Numeric>(&self) -> KeywordResult<Vec<T>> {
        (0..self.count).map(|index| self.get_as(index)).collect()
    }

    pub(crate) fn expect_type<T: Numeric>(&self) -> KeywordResult<()> {
        if self.element_type != T::ELEMENT_TYPE {
            return Err(self.mismatch(T::NAME));
        }
        Ok(())
    }

    pub(crate) fn iter_values<T: Numeric>(&self) -> impl Iterator<Item = T> {
        let size = self.element_type.element_size().max(1);
        self.data.chunks_exact(size).map(T::from_ne_slice)
    }

    /// Replace the payload with `values`; the caller has checked the type
    pub(crate) fn store_values<T: Numeric>(&mut self, values: &[T]) {
        let size = self.element_type.element_size();
        for (chunk, value) in self.data.chunks_exact_mut(size).zip(values) {
            value.write_ne_slice(chunk);
        }
    }

    /// Read logical element `index`; only -1 is true
    pub fn get_bool(&self, index: usize) -> KeywordResult<bool> {
        if self.element_type != ElementType::Bool32 {
            return Err(self.mismatch("bool"));
        }
        self.check_index(index)?;
        Ok(i32::from_ne_slice(self.element_bytes(index)) == LOGICAL_TRUE)
    }

    /// Write logical element `index`
    pub fn set_bool(&mut self, index: usize, value: bool) -> KeywordResult<()> {
        if self.element_type != ElementType::Bool32 {
            return Err(self.mismatch("bool"));
        }
        self.check_index(index)?;
        let stored = if value { LOGICAL_TRUE } else { LOGICAL_FALSE };
        stored.write_ne_slice(self.element_bytes_mut(index));
        Ok(())
    }

    /// Read string element `index` with trailing padding removed
    pub fn get_str(&self, index: usize) -> KeywordResult<String> {
        if !self.element_type.is_string() {
            return Err(self.mismatch("string"));
        }
        self.check_index(index)?;
        let bytes = self.element_bytes(index);
        Ok(String::from_utf8_lossy(bytes)
            .trim_end_matches([' ', '\0'])
            .to_string())
    }

    /// Write string element `index`, padding it with spaces
    pub fn set_str(&mut self, index: usize, value: &str) -> KeywordResult<()> {
        if !self.element_type.is_string() {
            return Err(self.mismatch("string"));
        }
        self.check_index(index)?;
        let width = self.element_type.element_size();
        if value.len() > width {
            return Err(KeywordError::ContractViolation(format!(
                "string {value:?} does not fit a {width}-byte element"
            )));
        }

        let slot = self.element_bytes_mut(index);
        slot.fill(b' ');
        slot[..value.len()].copy_from_slice(value.as_bytes());
        Ok(())
    }
}
