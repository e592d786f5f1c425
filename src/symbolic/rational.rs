//! Exact rational numbers over arbitrary-precision integers.
//!
//! Every literal and every bound that enters the algebra is kept exact, so
//! marginals that cancel to zero really are zero and repeated derivations
//! produce identical text.

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Largest accepted `|e|` in a literal such as `1.5e-3`.
pub const MAX_DECIMAL_EXPONENT: u32 = 400;

/// Size cap on the numerator and denominator produced by [`Rational::pow`].
pub const MAX_POWER_BITS: u64 = 1 << 16;

/// A reduced fraction `num / den` with `den > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rational {
    num: BigInt,
    den: BigInt,
}

fn gcd(a: &BigInt, b: &BigInt) -> BigInt {
    let mut a = a.abs();
    let mut b = b.abs();
    while !b.is_zero() {
        let t = &a % &b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    /// Build `num / den`, returning `None` when `den` is zero.
    pub fn new(num: BigInt, den: BigInt) -> Option<Self> {
        if den.is_zero() {
            return None;
        }
        Some(Self::reduced(num, den))
    }

    fn reduced(num: BigInt, den: BigInt) -> Self {
        let g = gcd(&num, &den);
        let (mut num, mut den) = if g.is_one() || g.is_zero() {
            (num, den)
        } else {
            (num / &g, den / &g)
        };
        if den.is_negative() {
            num = -num;
            den = -den;
        }
        if num.is_zero() {
            den = BigInt::one();
        }
        Rational { num, den }
    }

    pub fn from_integer(n: i64) -> Self {
        Rational {
            num: BigInt::from(n),
            den: BigInt::one(),
        }
    }

    pub fn from_bigint(n: BigInt) -> Self {
        Rational {
            num: n,
            den: BigInt::one(),
        }
    }

    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn one() -> Self {
        Self::from_integer(1)
    }

    pub fn numer(&self) -> &BigInt {
        &self.num
    }

    pub fn denom(&self) -> &BigInt {
        &self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.num.is_one() && self.den.is_one()
    }

    pub fn is_negative(&self) -> bool {
        self.num.is_negative()
    }

    pub fn is_integer(&self) -> bool {
        self.den.is_one()
    }

    pub fn has_odd_numer(&self) -> bool {
        !(&self.num % BigInt::from(2)).is_zero()
    }

    pub fn has_odd_denom(&self) -> bool {
        !(&self.den % BigInt::from(2)).is_zero()
    }

    pub fn abs(&self) -> Self {
        Rational {
            num: self.num.abs(),
            den: self.den.clone(),
        }
    }

    /// The value as a machine integer, if it is an integer that fits.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            self.num.to_i64()
        } else {
            None
        }
    }

    pub fn recip(&self) -> Option<Self> {
        Self::new(self.den.clone(), self.num.clone())
    }

    pub fn checked_div(&self, other: &Rational) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        Some(Self::reduced(&self.num * &other.den, &self.den * &other.num))
    }

    /// Integer power; `None` for a negative power of zero or when the result
    /// would need more than [`MAX_POWER_BITS`] bits.
    pub fn pow(&self, exp: i32) -> Option<Self> {
        let base = if exp < 0 { self.recip()? } else { self.clone() };
        let magnitude = exp.unsigned_abs();
        let bits = base.num.bits().max(base.den.bits());
        if bits.saturating_mul(u64::from(magnitude)) > MAX_POWER_BITS {
            return None;
        }
        // A reduced fraction stays reduced under powers.
        Some(Rational {
            num: base.num.pow(magnitude),
            den: base.den.pow(magnitude),
        })
    }

    /// The exact `n`-th root, when it is rational. Odd roots of negative
    /// values are negative.
    pub fn exact_root(&self, n: u32) -> Option<Self> {
        if n == 0 {
            return None;
        }
        if self.is_negative() {
            if n % 2 == 0 {
                return None;
            }
            return self.abs().exact_root(n).map(|r| -r);
        }
        let num = self.num.nth_root(n);
        let den = self.den.nth_root(n);
        if num.pow(n) == self.num && den.pow(n) == self.den {
            Some(Rational { num, den })
        } else {
            None
        }
    }

    /// Nearest `f64`, scaling very large numerators and denominators so the
    /// quotient stays finite when it is representable.
    pub fn to_f64(&self) -> f64 {
        let n = self.num.to_f64().unwrap_or(f64::NAN);
        let d = self.den.to_f64().unwrap_or(f64::NAN);
        if n.is_finite() && d.is_finite() {
            return n / d;
        }
        let bits = self.num.bits().max(self.den.bits());
        let shift = bits.saturating_sub(1000) as usize;
        let n = (&self.num >> shift).to_f64().unwrap_or(f64::NAN);
        let d = (&self.den >> shift).to_f64().unwrap_or(f64::NAN);
        n / d
    }

    /// Parse a plain decimal literal such as `12`, `-0.25` or `1.5e-3`.
    pub fn from_decimal_str(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => (&body[..idx], body[idx + 1..].parse::<i32>().ok()?),
            None => (body, 0),
        };
        if exponent.unsigned_abs() > MAX_DECIMAL_EXPONENT {
            return None;
        }
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits = format!("{}{}", int_part, frac_part);
        let mut num: BigInt = digits.parse().ok()?;
        if negative {
            num = -num;
        }
        let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
        let ten = Rational::from_integer(10);
        let factor = ten.pow(scale)?;
        Some(&Rational::from_bigint(num) * &factor)
    }

    /// Exact value of the shortest decimal text that round-trips `value`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Self::from_decimal_str(&value.to_string())
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::zero()
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.num * &other.den).cmp(&(&other.num * &self.den))
    }
}

impl<'a, 'b> Add<&'b Rational> for &'a Rational {
    type Output = Rational;

    fn add(self, rhs: &'b Rational) -> Rational {
        if self.den == rhs.den {
            return Rational::reduced(&self.num + &rhs.num, self.den.clone());
        }
        Rational::reduced(
            &self.num * &rhs.den + &rhs.num * &self.den,
            &self.den * &rhs.den,
        )
    }
}

impl<'a, 'b> Sub<&'b Rational> for &'a Rational {
    type Output = Rational;

    fn sub(self, rhs: &'b Rational) -> Rational {
        self + &(-rhs)
    }
}

impl<'a, 'b> Mul<&'b Rational> for &'a Rational {
    type Output = Rational;

    fn mul(self, rhs: &'b Rational) -> Rational {
        Rational::reduced(&self.num * &rhs.num, &self.den * &rhs.den)
    }
}

impl Neg for &Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            num: -&self.num,
            den: self.den.clone(),
        }
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::from_integer(n)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den.is_one() {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Greatest common divisor of two non-negative rationals, as used for
/// polynomial content: `gcd(a/b, c/d) = gcd(a, c) / lcm(b, d)`.
pub(crate) fn rational_gcd(a: &Rational, b: &Rational) -> Rational {
    if a.is_zero() {
        return b.abs();
    }
    if b.is_zero() {
        return a.abs();
    }
    let num = gcd(&a.num, &b.num);
    let den_gcd = gcd(&a.den, &b.den);
    let lcm = &a.den / &den_gcd * &b.den;
    Rational::reduced(num, lcm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(BigInt::from(n), BigInt::from(d)).unwrap()
    }

    #[test]
    fn test_reduction_and_sign() {
        assert_eq!(q(4, -8), q(-1, 2));
        assert_eq!(q(0, 5), Rational::zero());
        assert_eq!(q(6, 3).to_string(), "2");
        assert_eq!(q(-3, 28).to_string(), "-3/28");
    }

    #[test]
    fn test_decimal_parsing_is_exact() {
        assert_eq!(Rational::from_decimal_str("0.1"), Some(q(1, 10)));
        assert_eq!(Rational::from_decimal_str("-2.50"), Some(q(-5, 2)));
        assert_eq!(Rational::from_decimal_str("1.5e-3"), Some(q(3, 2000)));
        assert_eq!(Rational::from_decimal_str("3E2"), Some(q(300, 1)));
        assert_eq!(Rational::from_decimal_str("."), None);
        assert_eq!(Rational::from_decimal_str("1.2.3"), None);
    }

    #[test]
    fn test_decimal_exponent_is_bounded() {
        assert_eq!(Rational::from_decimal_str("0.5e-2147483648"), None);
        assert_eq!(Rational::from_decimal_str("1e99999999"), None);
        assert_eq!(Rational::from_decimal_str("1e401"), None);
        assert_eq!(
            Rational::from_decimal_str("1e400").map(|q| q.num.to_string().len()),
            Some(401)
        );
    }

    #[test]
    fn test_from_f64_uses_shortest_decimal() {
        assert_eq!(Rational::from_f64(0.9), Some(q(9, 10)));
        assert_eq!(Rational::from_f64(2.0), Some(q(2, 1)));
        assert_eq!(Rational::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(&q(1, 10) + &q(1, 5), q(3, 10));
        assert_eq!(&q(1, 2) - &q(3, 4), q(-1, 4));
        assert_eq!(&q(2, 3) * &q(9, 4), q(3, 2));
        assert_eq!(q(1, 2).checked_div(&Rational::zero()), None);
        assert_eq!(q(2, 3).pow(-2), Some(q(9, 4)));
        assert_eq!(Rational::zero().pow(-1), None);
        assert_eq!(q(2, 1).pow(100).map(|p| p.num.bits()), Some(101));
        assert_eq!(q(2, 1).pow(i32::MAX), None);
    }

    #[test]
    fn test_ordering_and_conversion() {
        assert!(q(1, 3) < q(1, 2));
        assert!(q(-1, 2) < Rational::zero());
        assert!((q(1, 3).to_f64() - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_exact_root() {
        assert_eq!(q(9, 4).exact_root(2), Some(q(3, 2)));
        assert_eq!(q(-8, 27).exact_root(3), Some(q(-2, 3)));
        assert_eq!(q(2, 1).exact_root(2), None);
        assert_eq!(q(-4, 1).exact_root(2), None);
    }

    #[test]
    fn test_rational_gcd() {
        assert_eq!(rational_gcd(&q(1, 14), &q(3, 28)), q(1, 28));
        assert_eq!(rational_gcd(&q(4, 1), &q(6, 1)), q(2, 1));
    }
}
