use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------        Cents        ---------------------------------------------------------
/// An amount of money in integer minor currency units (cents). All order arithmetic in the gateway happens in this
/// type; floating point never touches a price.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cents {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cents {}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {} is too large to convert to Cents", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Sign is handled on the whole value; integer division alone would lose it for -99..=-1.
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Cents::from(5990);
        let b = Cents::from(10);
        assert_eq!(a + b, Cents::from(6000));
        assert_eq!(a - b, Cents::from(5980));
        assert_eq!(b * 3, Cents::from(30));
        assert_eq!([a, b].into_iter().sum::<Cents>(), Cents::from(6000));
    }

    #[test]
    fn display_is_units_and_cents() {
        assert_eq!(Cents::from(5990).to_string(), "59.90");
        assert_eq!(Cents::from(5).to_string(), "0.05");
    }

    #[test]
    fn display_keeps_the_sign_of_small_negative_amounts() {
        assert_eq!(Cents::from(-5).to_string(), "-0.05");
        assert_eq!(Cents::from(-100).to_string(), "-1.00");
        assert_eq!(Cents::from(-150).to_string(), "-1.50");
        assert_eq!(Cents::from(-5990).to_string(), "-59.90");
    }

    #[test]
    fn positivity() {
        assert!(Cents::from(1).is_positive());
        assert!(!Cents::from(0).is_positive());
        assert!(!Cents::from(-5).is_positive());
    }
}
