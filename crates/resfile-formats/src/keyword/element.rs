//! Element types and their on-disk tags

use std::fmt;
use std::str::FromStr;

use super::error::{KeywordError, KeywordResult};

/// Maximum elements per physical record for numeric and logical payloads
pub const NUMERIC_BLOCK_SIZE: usize = 1000;

/// Maximum elements per physical record for string payloads
pub const STRING_BLOCK_SIZE: usize = 105;

/// Width of a fixed `CHAR` element
pub const FIXED_STRING_WIDTH: usize = 8;

/// Largest width a `C0NN` string element may declare
pub const MAX_STRING_WIDTH: usize = 99;

/// Element type of a keyword array
///
/// The set is closed: every tag a container file may carry maps to exactly
/// one variant, and `VariableString` carries the width encoded in its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    /// 32-bit signed integer (`INTE`)
    Int32,
    /// 32-bit IEEE float (`REAL`)
    Real32,
    /// 64-bit IEEE float (`DOUB`)
    Real64,
    /// 4-byte logical (`LOGI`): -1 is true, anything else false
    Bool32,
    /// Zero-width marker keyword (`MESS`)
    Message,
    /// Fixed 8-byte string (`CHAR`)
    FixedString8,
    /// String of 1..=99 bytes (`C0NN`)
    VariableString(u8),
}

impl ElementType {
    /// Create a variable-width string type, validating the width
    pub fn variable_string(width: usize) -> KeywordResult<Self> {
        match u8::try_from(width) {
            Ok(w) if (1..=MAX_STRING_WIDTH).contains(&width) => Ok(Self::VariableString(w)),
            _ => Err(KeywordError::InvalidStringWidth(width)),
        }
    }

    /// Check the width carried by a `VariableString`
    pub fn validate(self) -> KeywordResult<Self> {
        match self {
            Self::VariableString(width) => Self::variable_string(usize::from(width)),
            other => Ok(other),
        }
    }

    /// Parse a 4-character type tag
    pub fn from_tag(tag: [u8; 4]) -> KeywordResult<Self> {
        match &tag {
            b"INTE" => Ok(Self::Int32),
            b"REAL" => Ok(Self::Real32),
            b"DOUB" => Ok(Self::Real64),
            b"LOGI" => Ok(Self::Bool32),
            b"MESS" => Ok(Self::Message),
            b"CHAR" => Ok(Self::FixedString8),
            [b'C', digits @ ..] if digits.iter().all(u8::is_ascii_digit) => {
                let width = digits
                    .iter()
                    .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0'));
                Self::variable_string(width)
            }
            _ => Err(KeywordError::UnknownType(
                String::from_utf8_lossy(&tag).into_owned(),
            )),
        }
    }

    /// The 4-character tag written to disk
    pub fn tag(self) -> [u8; 4] {
        match self {
            Self::Int32 => *b"INTE",
            Self::Real32 => *b"REAL",
            Self::Real64 => *b"DOUB",
            Self::Bool32 => *b"LOGI",
            Self::Message => *b"MESS",
            Self::FixedString8 => *b"CHAR",
            Self::VariableString(width) => {
                let width = usize::from(width);
                [
                    b'C',
                    b'0' + (width / 100) as u8,
                    b'0' + (width / 10 % 10) as u8,
                    b'0' + (width % 10) as u8,
                ]
            }
        }
    }

    /// Bytes per element; zero for `Message`
    pub fn element_size(self) -> usize {
        match self {
            Self::Int32 | Self::Real32 | Self::Bool32 => 4,
            Self::Real64 => 8,
            Self::Message => 0,
            Self::FixedString8 => FIXED_STRING_WIDTH,
            Self::VariableString(width) => width as usize,
        }
    }

    /// Whether the elements are stored as multi-byte numbers subject to byte
    /// swapping
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int32 | Self::Real32 | Self::Real64 | Self::Bool32)
    }

    /// Whether the elements are strings
    pub fn is_string(self) -> bool {
        matches!(self, Self::FixedString8 | Self::VariableString(_))
    }

    /// Byte used for new, unset elements
    pub(crate) fn fill_byte(self) -> u8 {
        if self.is_string() { b' ' } else { 0 }
    }

    /// Whether arithmetic is defined on the elements
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Int32 | Self::Real32 | Self::Real64)
    }

    /// Maximum number of elements one physical record carries
    pub fn block_size(self) -> usize {
        match self {
            Self::Message | Self::FixedString8 | Self::VariableString(_) => STRING_BLOCK_SIZE,
            _ => NUMERIC_BLOCK_SIZE,
        }
    }

    /// Maximum payload bytes of one physical record
    pub fn max_record_bytes(self) -> usize {
        self.block_size() * self.element_size()
    }

    /// Number of physical records a payload of `count` elements occupies
    pub fn record_count(self, count: usize) -> usize {
        let total = count * self.element_size();
        if total == 0 {
            0
        } else {
            total.div_ceil(self.max_record_bytes())
        }
    }

    /// Values per line in the formatted variant
    pub fn columns(self) -> usize {
        match self {
            Self::Int32 => 6,
            Self::Real32 => 4,
            Self::Real64 => 3,
            Self::Bool32 => 25,
            Self::Message => 1,
            Self::FixedString8 | Self::VariableString(_) => 7,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        f.write_str(&String::from_utf8_lossy(&tag))
    }
}

impl FromStr for ElementType {
    type Err = KeywordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| KeywordError::UnknownType(s.to_string()))?;
        Self::from_tag(tag)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_tags() {
        for ty in [
            ElementType::Int32,
            ElementType::Real32,
            ElementType::Real64,
            ElementType::Bool32,
            ElementType::Message,
            ElementType::FixedString8,
        ] {
            assert_eq!(ElementType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert_eq!("DOUB".parse::<ElementType>().unwrap(), ElementType::Real64);
    }

    #[test]
    fn test_variable_string_tags() {
        let ty = ElementType::variable_string(10).unwrap();
        assert_eq!(&ty.tag(), b"C010");
        assert_eq!(ty.element_size(), 10);
        assert_eq!(ty.to_string(), "C010");
        assert_eq!(ElementType::from_tag(*b"C099").unwrap(), ElementType::VariableString(99));
        assert_eq!(ElementType::from_tag(*b"C001").unwrap(), ElementType::VariableString(1));
    }

    #[test]
    fn test_invalid_tags() {
        assert!(matches!(
            ElementType::from_tag(*b"C000"),
            Err(KeywordError::InvalidStringWidth(0))
        ));
        assert!(matches!(
            ElementType::from_tag(*b"C100"),
            Err(KeywordError::InvalidStringWidth(100))
        ));
        assert!(matches!(
            ElementType::from_tag(*b"INTX"),
            Err(KeywordError::UnknownType(_))
        ));
        assert!(matches!(
            ElementType::from_tag(*b"C1A2"),
            Err(KeywordError::UnknownType(_))
        ));
        assert!("INT".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_validate_width() {
        assert_eq!(
            ElementType::VariableString(99).validate().unwrap(),
            ElementType::VariableString(99)
        );
        assert_eq!(ElementType::Int32.validate().unwrap(), ElementType::Int32);
        for width in [0, 100, 150] {
            assert!(matches!(
                ElementType::VariableString(width).validate(),
                Err(KeywordError::InvalidStringWidth(w)) if w == usize::from(width)
            ));
        }
    }

    #[test]
    fn test_record_counts() {
        assert_eq!(ElementType::Int32.record_count(0), 0);
        assert_eq!(ElementType::Int32.record_count(1000), 1);
        assert_eq!(ElementType::Int32.record_count(1001), 2);
        assert_eq!(ElementType::Real64.max_record_bytes(), 8000);
        assert_eq!(ElementType::FixedString8.record_count(106), 2);
        assert_eq!(ElementType::Message.record_count(5), 0);
    }
}
