use std::cmp::Ordering;
use std::fmt;
use std::ops::Mul;

/// A value in base-10 scientific notation: coefficient × 10^exponent.
///
/// Aligner significance scores (e-values) can sit far below the smallest
/// positive f64 once multiplied across a whole path, so the coefficient and
/// exponent are kept separate and never collapsed into a single float
/// during combination or comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SciNot {
    coefficient: f64,
    exponent: i32,
}

impl SciNot {
    /// Create a normalized value. The coefficient is scaled into [1, 10)
    /// (or is exactly zero) with the exponent adjusted to compensate.
    pub fn new(coefficient: f64, exponent: i32) -> Self {
        if coefficient == 0.0 {
            return SciNot {
                coefficient: 0.0,
                exponent: 0,
            };
        }
        let mut c = coefficient;
        let mut e = exponent;
        while c.abs() >= 10.0 {
            c /= 10.0;
            e += 1;
        }
        while c.abs() < 1.0 {
            c *= 10.0;
            e -= 1;
        }
        SciNot {
            coefficient: c,
            exponent: e,
        }
    }

    pub fn zero() -> Self {
        SciNot {
            coefficient: 0.0,
            exponent: 0,
        }
    }

    pub fn one() -> Self {
        SciNot {
            coefficient: 1.0,
            exponent: 0,
        }
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient == 0.0
    }

    /// Raise the value to an arbitrary real power. The integer part of the
    /// scaled exponent stays in the exponent; the fractional part is folded
    /// back into the coefficient before renormalizing.
    pub fn power(&self, p: f64) -> Self {
        if self.is_zero() {
            return *self;
        }
        let scaled = self.exponent as f64 * p;
        let whole = scaled.floor();
        let c = self.coefficient.powf(p) * 10f64.powf(scaled - whole);
        SciNot::new(c, whole as i32)
    }

    /// Collapse to a plain f64. Underflows to zero at extreme exponents, so
    /// this is for display and interop only, never for comparison.
    pub fn to_f64(&self) -> f64 {
        self.coefficient * 10f64.powi(self.exponent)
    }

    fn sign(&self) -> i8 {
        if self.coefficient > 0.0 {
            1
        } else if self.coefficient < 0.0 {
            -1
        } else {
            0
        }
    }
}

impl Mul for SciNot {
    type Output = SciNot;

    fn mul(self, rhs: SciNot) -> SciNot {
        SciNot::new(
            self.coefficient * rhs.coefficient,
            self.exponent + rhs.exponent,
        )
    }
}

impl PartialOrd for SciNot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let s1 = self.sign();
        let s2 = other.sign();
        if s1 != s2 {
            return Some(s1.cmp(&s2));
        }
        match s1 {
            0 => Some(Ordering::Equal),
            1 => Some(
                self.exponent
                    .cmp(&other.exponent)
                    .then(self.coefficient.partial_cmp(&other.coefficient)?),
            ),
            _ => Some(
                other
                    .exponent
                    .cmp(&self.exponent)
                    .then(other.coefficient.partial_cmp(&self.coefficient)?),
            ),
        }
    }
}

impl fmt::Display for SciNot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.coefficient, self.exponent)
    }
}
