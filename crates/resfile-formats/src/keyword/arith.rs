//! Element-wise arithmetic on numeric keywords
//!
//! Every operation computes the full result before touching the payload, so
//! a failing operation (overflow, division by zero, shape mismatch) leaves
//! the keyword unchanged.

use super::value::{BinaryOp, Numeric};
use super::{ElementType, Keyword, KeywordError, KeywordResult};

#[allow(clippy::should_implement_trait)] // Fallible element-wise ops
impl Keyword {
    /// Element-wise `self += other`
    pub fn add(&mut self, other: &Self) -> KeywordResult<()> {
        self.combine(other, BinaryOp::Add)
    }

    /// Element-wise `self -= other`
    pub fn sub(&mut self, other: &Self) -> KeywordResult<()> {
        self.combine(other, BinaryOp::Sub)
    }

    /// Element-wise `self *= other`
    pub fn mul(&mut self, other: &Self) -> KeywordResult<()> {
        self.combine(other, BinaryOp::Mul)
    }

    /// Element-wise `self /= other`
    pub fn div(&mut self, other: &Self) -> KeywordResult<()> {
        self.combine(other, BinaryOp::Div)
    }

    /// Element-wise binary operation against a keyword of the same shape
    pub fn combine(&mut self, other: &Self, op: BinaryOp) -> KeywordResult<()> {
        if self.element_type() != other.element_type() || self.count() != other.count() {
            return Err(KeywordError::ContractViolation(format!(
                "cannot {} {} x {} and {} x {}",
                op.name(),
                self.element_type(),
                self.count(),
                other.element_type(),
                other.count()
            )));
        }

        match self.element_type() {
            ElementType::Int32 => self.combine_typed::<i32>(other, op),
            ElementType::Real32 => self.combine_typed::<f32>(other, op),
            ElementType::Real64 => self.combine_typed::<f64>(other, op),
            other_type => Err(KeywordError::ContractViolation(format!(
                "arithmetic is not defined for {other_type} keywords"
            ))),
        }
    }

    fn combine_typed<T: Numeric>(&mut self, other: &Self, op: BinaryOp) -> KeywordResult<()> {
        let result = self
            .iter_values::<T>()
            .zip(other.iter_values::<T>())
            .map(|(lhs, rhs)| lhs.apply(op, rhs))
            .collect::<KeywordResult<Vec<T>>>()?;
        self.store_values(&result);
        Ok(())
    }

    fn map_values<T: Numeric>(
        &mut self,
        f: impl Fn(T) -> KeywordResult<T>,
    ) -> KeywordResult<()> {
        self.expect_type::<T>()?;
        let result = self
            .iter_values::<T>()
            .map(f)
            .collect::<KeywordResult<Vec<T>>>()?;
        self.store_values(&result);
        Ok(())
    }

    /// Multiply every element by `factor`; `T` must match the stored type
    pub fn scale<T: Numeric>(&mut self, factor: T) -> KeywordResult<()> {
        self.map_values(|value: T| value.apply(BinaryOp::Mul, factor))
    }

    /// Add `delta` to every element; `T` must match the stored type
    pub fn shift<T: Numeric>(&mut self, delta: T) -> KeywordResult<()> {
        self.map_values(|value: T| value.apply(BinaryOp::Add, delta))
    }

    /// Scale a `REAL` or `DOUB` keyword by a double factor
    pub fn scale_float(&mut self, factor: f64) -> KeywordResult<()> {
        match self.element_type() {
            ElementType::Real32 => self.scale(factor as f32),
            ElementType::Real64 => self.scale(factor),
            _ => Err(self.float_required()),
        }
    }

    /// Shift a `REAL` or `DOUB` keyword by a double delta
    pub fn shift_float(&mut self, delta: f64) -> KeywordResult<()> {
        match self.element_type() {
            ElementType::Real32 => self.shift(delta as f32),
            ElementType::Real64 => self.shift(delta),
            _ => Err(self.float_required()),
        }
    }

    /// Replace every element by its absolute value
    pub fn abs(&mut self) -> KeywordResult<()> {
        match self.element_type() {
            ElementType::Int32 => self.map_values::<i32>(Numeric::checked_abs),
            ElementType::Real32 => self.map_values::<f32>(Numeric::checked_abs),
            ElementType::Real64 => self.map_values::<f64>(Numeric::checked_abs),
            other => Err(KeywordError::ContractViolation(format!(
                "arithmetic is not defined for {other} keywords"
            ))),
        }
    }

    /// Replace every element by its square root
    pub fn sqrt(&mut self) -> KeywordResult<()> {
        match self.element_type() {
            ElementType::Real32 => self.map_values(|v: f32| Ok(v.sqrt())),
            ElementType::Real64 => self.map_values(|v: f64| Ok(v.sqrt())),
            _ => Err(self.float_required()),
        }
    }

    /// Smallest and largest element, or `None` for an empty keyword
    pub fn min_max<T: Numeric>(&self) -> KeywordResult<Option<(T, T)>> {
        self.expect_type::<T>()?;
        Ok(self.iter_values::<T>().fold(None, |acc, value| match acc {
            None => Some((value, value)),
            Some((min, max)) => Some((
                if value < min { value } else { min },
                if value > max { value } else { max },
            )),
        }))
    }

    /// Sum of all elements; integer sums fail on overflow
    pub fn sum<T: Numeric>(&self) -> KeywordResult<T> {
        self.expect_type::<T>()?;
        self.iter_values::<T>()
            .try_fold(T::default(), |acc, value| acc.apply(BinaryOp::Add, value))
    }

    fn float_required(&self) -> KeywordError {
        KeywordError::TypeMismatch {
            actual: self.element_type(),
            requested: "floating point",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_sub_mul_div() {
        let mut a = Keyword::from_values("A", &[1.0_f64, 2.0, 3.0]).unwrap();
        let b = Keyword::from_values("B", &[0.5_f64, 0.5, 1.5]).unwrap();

        a.add(&b).unwrap();
        assert_eq!(a.values::<f64>().unwrap(), vec![1.5, 2.5, 4.5]);
        a.sub(&b).unwrap();
        assert_eq!(a.values::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
        a.mul(&b).unwrap();
        assert_eq!(a.values::<f64>().unwrap(), vec![0.5, 1.0, 4.5]);
        a.div(&b).unwrap();
        assert_eq!(a.values::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shape_mismatch_is_contract_violation() {
        let mut a = Keyword::from_values("A", &[1_i32, 2]).unwrap();
        let b = Keyword::from_values("B", &[1_i32]).unwrap();
        let err = a.add(&b).unwrap_err();
        assert!(err.is_contract_violation());

        let c = Keyword::from_values("C", &[1.0_f32, 2.0]).unwrap();
        assert!(matches!(a.add(&c), Err(KeywordError::ContractViolation(_))));
        assert_eq!(a.values::<i32>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_integer_overflow_leaves_keyword_unchanged() {
        let mut a = Keyword::from_values("A", &[1_i32, i32::MAX]).unwrap();
        let b = Keyword::from_values("B", &[1_i32, 1]).unwrap();
        assert!(matches!(a.add(&b), Err(KeywordError::Overflow("add"))));
        assert_eq!(a.values::<i32>().unwrap(), vec![1, i32::MAX]);

        let zero = Keyword::from_values("Z", &[1_i32, 0]).unwrap();
        assert!(matches!(a.div(&zero), Err(KeywordError::DivisionByZero)));
        assert!(matches!(a.scale(2_i32), Err(KeywordError::Overflow("mul"))));
    }

    #[test]
    fn test_scale_and_shift() {
        let mut a = Keyword::from_values("A", &[1.0_f32, -2.0]).unwrap();
        a.scale_float(2.0).unwrap();
        a.shift_float(1.0).unwrap();
        assert_eq!(a.values::<f32>().unwrap(), vec![3.0, -3.0]);

        assert!(matches!(
            a.scale(2.0_f64),
            Err(KeywordError::TypeMismatch { .. })
        ));

        let mut ints = Keyword::from_values("I", &[1_i32, 2]).unwrap();
        ints.shift(10_i32).unwrap();
        assert_eq!(ints.values::<i32>().unwrap(), vec![11, 12]);
        assert!(ints.scale_float(2.0).is_err());
    }

    #[test]
    fn test_abs_sqrt_min_max_sum() {
        let mut a = Keyword::from_values("A", &[-4.0_f64, 9.0, -1.0]).unwrap();
        assert_eq!(a.min_max::<f64>().unwrap(), Some((-4.0, 9.0)));
        a.abs().unwrap();
        a.sqrt().unwrap();
        assert_eq!(a.values::<f64>().unwrap(), vec![2.0, 3.0, 1.0]);
        assert_eq!(a.sum::<f64>().unwrap(), 6.0);

        let mut ints = Keyword::from_values("I", &[-3_i32, 5]).unwrap();
        ints.abs().unwrap();
        assert_eq!(ints.values::<i32>().unwrap(), vec![3, 5]);
        assert!(ints.sqrt().is_err());

        let big = Keyword::from_values("B", &[i32::MAX, 1]).unwrap();
        assert!(matches!(big.sum::<i32>(), Err(KeywordError::Overflow("add"))));

        let empty = Keyword::new("E", ElementType::Real64, 0).unwrap();
        assert_eq!(empty.min_max::<f64>().unwrap(), None);
    }

    #[test]
    fn test_arithmetic_rejects_strings() {
        let mut names = Keyword::from_strings("N", &["X"]).unwrap();
        let other = names.clone();
        assert!(matches!(
            names.add(&other),
            Err(KeywordError::ContractViolation(_))
        ));
    }
}
