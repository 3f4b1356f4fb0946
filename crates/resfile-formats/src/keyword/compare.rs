//! Approximate comparison of keyword payloads
//!
//! Results from two simulator runs rarely match bit for bit. Floating point
//! keywords can be compared within an absolute and a relative tolerance;
//! every other type is compared exactly.

use super::{ElementType, Keyword, KeywordError, KeywordResult};

/// Absolute and relative tolerance for floating point elements
///
/// A zero bound is not checked. With both bounds zero the comparison is
/// exact.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tolerance {
    /// Largest accepted `|a - b|`
    pub abs: f64,
    /// Largest accepted `|a - b| / (|a| + |b|)`
    pub rel: f64,
}

impl Tolerance {
    /// Bit-exact comparison
    pub const EXACT: Self = Self { abs: 0.0, rel: 0.0 };

    /// Tolerance with both bounds
    pub const fn new(abs: f64, rel: f64) -> Self {
        Self { abs, rel }
    }

    /// Only an absolute bound
    pub const fn absolute(abs: f64) -> Self {
        Self { abs, rel: 0.0 }
    }

    /// Only a relative bound
    pub const fn relative(rel: f64) -> Self {
        Self { abs: 0.0, rel }
    }

    /// Whether no bound is set
    pub fn is_exact(self) -> bool {
        self.abs <= 0.0 && self.rel <= 0.0
    }

    /// Whether `a` and `b` are equal within the bounds
    pub fn accepts(self, a: f64, b: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return a.is_nan() && b.is_nan();
        }
        if a == b {
            return true;
        }
        if self.is_exact() {
            return false;
        }

        let diff = (a - b).abs();
        if self.abs > 0.0 && diff > self.abs {
            return false;
        }
        if self.rel > 0.0 && diff / (a.abs() + b.abs()) > self.rel {
            return false;
        }
        true
    }
}

impl Keyword {
    /// Whether type, count and payload match, floats within `tolerance`
    ///
    /// The name is ignored, like [`Keyword::content_eq`].
    pub fn approx_eq(&self, other: &Self, tolerance: Tolerance) -> bool {
        if !self.same_shape(other) {
            return false;
        }
        if !self.compares_numerically(tolerance) {
            return self.content_eq(other);
        }
        (0..self.count()).all(|index| self.element_eq(other, index, tolerance))
    }

    /// Index of the first element at or after `offset` that differs
    ///
    /// Floats are compared within `tolerance`. Returns `Ok(None)` when the
    /// rest of the payload matches.
    pub fn first_different(
        &self,
        other: &Self,
        offset: usize,
        tolerance: Tolerance,
    ) -> KeywordResult<Option<usize>> {
        if !self.same_shape(other) {
            return Err(KeywordError::ContractViolation(format!(
                "cannot compare {} x {} with {} x {}",
                self.element_type(),
                self.count(),
                other.element_type(),
                other.count()
            )));
        }
        if offset >= self.count() {
            return Err(KeywordError::IndexOutOfRange {
                index: offset,
                count: self.count(),
            });
        }

        Ok((offset..self.count()).find(|&index| !self.element_eq(other, index, tolerance)))
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.element_type() == other.element_type() && self.count() == other.count()
    }

    fn compares_numerically(&self, tolerance: Tolerance) -> bool {
        !tolerance.is_exact()
            && matches!(self.element_type(), ElementType::Real32 | ElementType::Real64)
    }

    /// Element equality; both keywords have the same shape and `index` is
    /// in range
    fn element_eq(&self, other: &Self, index: usize, tolerance: Tolerance) -> bool {
        if self.compares_numerically(tolerance) {
            match (self.get_as::<f64>(index), other.get_as::<f64>(index)) {
                (Ok(a), Ok(b)) => tolerance.accepts(a, b),
                _ => false,
            }
        } else {
            self.element_bytes(index) == other.element_bytes(index)
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_bounds() {
        assert!(Tolerance::EXACT.accepts(1.0, 1.0));
        assert!(!Tolerance::EXACT.accepts(1.0, 1.0 + 1e-12));

        let abs = Tolerance::absolute(0.1);
        assert!(abs.accepts(1.0, 1.05));
        assert!(!abs.accepts(1.0, 1.2));

        let rel = Tolerance::relative(0.01);
        assert!(rel.accepts(1000.0, 1010.0));
        assert!(!rel.accepts(1.0, 1.1));

        let both = Tolerance::new(0.5, 0.01);
        assert!(!both.accepts(1000.0, 1001.0));
        assert!(both.accepts(1000.0, 1000.4));

        assert!(abs.accepts(f64::NAN, f64::NAN));
        assert!(!abs.accepts(f64::NAN, 1.0));
    }

    #[test]
    fn test_approx_eq() {
        let a = Keyword::from_values("PRES", &[250.0_f32, 251.0]).unwrap();
        let b = Keyword::from_values("PRESSURE", &[250.01_f32, 251.0]).unwrap();
        assert!(!a.approx_eq(&b, Tolerance::EXACT));
        assert!(a.approx_eq(&b, Tolerance::absolute(0.1)));
        assert!(!a.approx_eq(&b, Tolerance::relative(1e-6)));

        let ints = Keyword::from_values("PRES", &[250_i32, 251]).unwrap();
        assert!(!a.approx_eq(&ints, Tolerance::absolute(1.0)));

        let c = Keyword::from_values("X", &[1_i32, 2]).unwrap();
        let d = Keyword::from_values("X", &[1_i32, 3]).unwrap();
        assert!(!c.approx_eq(&d, Tolerance::absolute(5.0)));
        assert!(c.approx_eq(&c.clone(), Tolerance::EXACT));
    }

    #[test]
    fn test_first_different() {
        let a = Keyword::from_values("SWAT", &[0.1_f64, 0.2, 0.3, 0.4]).unwrap();
        let b = Keyword::from_values("SWAT", &[0.1_f64, 0.2001, 0.3, 0.5]).unwrap();

        assert_eq!(a.first_different(&b, 0, Tolerance::EXACT).unwrap(), Some(1));
        assert_eq!(a.first_different(&b, 0, Tolerance::absolute(0.01)).unwrap(), Some(3));
        assert_eq!(a.first_different(&b, 2, Tolerance::EXACT).unwrap(), Some(3));
        assert_eq!(a.first_different(&a, 0, Tolerance::EXACT).unwrap(), None);

        assert!(matches!(
            a.first_different(&b, 4, Tolerance::EXACT),
            Err(KeywordError::IndexOutOfRange { index: 4, count: 4 })
        ));
        let short = Keyword::from_values("SWAT", &[0.1_f64]).unwrap();
        assert!(matches!(
            a.first_different(&short, 0, Tolerance::EXACT),
            Err(KeywordError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_strings_compare_exactly() {
        let a = Keyword::from_strings("NAME", &["A", "B"]).unwrap();
        let b = Keyword::from_strings("NAME", &["A", "C"]).unwrap();
        assert_eq!(a.first_different(&b, 0, Tolerance::absolute(1.0)).unwrap(), Some(1));
    }
}
