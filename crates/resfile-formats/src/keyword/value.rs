//! Numeric element types and the conversions between them

use std::fmt::Debug;

use super::element::ElementType;
use super::error::{KeywordError, KeywordResult};

/// A numeric element read from a keyword, tagged with its storage type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stored {
    /// Value of an `INTE` element
    Int(i32),
    /// Value of a `REAL` element
    Real(f32),
    /// Value of a `DOUB` element
    Double(f64),
}

/// Element-wise binary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs / rhs`
    Div,
}

impl BinaryOp {
    /// Operation name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Rust types that keyword elements can be read as
///
/// Implemented for `i32`, `f32` and `f64`, matching `INTE`, `REAL` and
/// `DOUB` storage.
pub trait Numeric: Copy + PartialOrd + Debug + Default + sealed::Sealed {
    /// Storage type whose elements are exactly this Rust type
    const ELEMENT_TYPE: ElementType;

    /// Name used in type mismatch errors
    const NAME: &'static str;

    /// Decode one element from native-order bytes
    fn from_ne_slice(bytes: &[u8]) -> Self;

    /// Encode one element into native-order bytes
    fn write_ne_slice(self, out: &mut [u8]);

    /// Convert a stored value, widening or narrowing as the accessor allows
    fn from_stored(value: Stored) -> Option<Self>;

    /// Apply `op` with the overflow rules of this type
    fn apply(self, op: BinaryOp, rhs: Self) -> KeywordResult<Self>;

    /// Absolute value
    fn checked_abs(self) -> KeywordResult<Self>;
}

impl Numeric for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::Int32;
    const NAME: &'static str = "i32";

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Self::from_ne_bytes(buf)
    }

    fn write_ne_slice(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }

    fn from_stored(value: Stored) -> Option<Self> {
        match value {
            Stored::Int(v) => Some(v),
            Stored::Real(_) | Stored::Double(_) => None,
        }
    }

    fn apply(self, op: BinaryOp, rhs: Self) -> KeywordResult<Self> {
        let result = match op {
            BinaryOp::Add => self.checked_add(rhs),
            BinaryOp::Sub => self.checked_sub(rhs),
            BinaryOp::Mul => self.checked_mul(rhs),
            BinaryOp::Div => {
                if rhs == 0 {
                    return Err(KeywordError::DivisionByZero);
                }
                self.checked_div(rhs)
            }
        };
        result.ok_or(KeywordError::Overflow(op.name()))
    }

    fn checked_abs(self) -> KeywordResult<Self> {
        Self::checked_abs(self).ok_or(KeywordError::Overflow("abs"))
    }
}

macro_rules! impl_float {
    ($ty:ty, $element:expr, $name:literal, $size:literal) => {
        impl Numeric for $ty {
            const ELEMENT_TYPE: ElementType = $element;
            const NAME: &'static str = $name;

            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $size];
                buf.copy_from_slice(bytes);
                Self::from_ne_bytes(buf)
            }

            fn write_ne_slice(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            fn from_stored(value: Stored) -> Option<Self> {
                Some(match value {
                    Stored::Int(v) => v as $ty,
                    Stored::Real(v) => v as $ty,
                    Stored::Double(v) => v as $ty,
                })
            }

            fn apply(self, op: BinaryOp, rhs: Self) -> KeywordResult<Self> {
                Ok(match op {
                    BinaryOp::Add => self + rhs,
                    BinaryOp::Sub => self - rhs,
                    BinaryOp::Mul => self * rhs,
                    BinaryOp::Div => self / rhs,
                })
            }

            fn checked_abs(self) -> KeywordResult<Self> {
                Ok(self.abs())
            }
        }
    };
}

impl_float!(f32, ElementType::Real32, "f32", 4);
impl_float!(f64, ElementType::Real64, "f64", 8);
