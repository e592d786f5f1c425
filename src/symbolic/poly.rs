//! Sparse multivariate polynomials and rational functions over exact
//! rationals.
//!
//! A `Poly` stores `coefficient * monomial` terms keyed by a lexicographic
//! monomial order (`x > y`, higher exponents first). `RationalFunction`
//! keeps a numerator/denominator pair in a canonical form so that two
//! equal functions always print the same way.

use super::expr::{Constant, Expr};
use super::rational::{rational_gcd, Rational};
use super::{SymbolicError, SymbolicResult};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Product of symbols raised to positive powers. Never stores zero exponents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Monomial(BTreeMap<String, u32>);

impl Monomial {
    pub fn one() -> Self {
        Monomial(BTreeMap::new())
    }

    pub fn var(name: &str, exponent: u32) -> Self {
        let mut powers = BTreeMap::new();
        if exponent > 0 {
            powers.insert(name.to_string(), exponent);
        }
        Monomial(powers)
    }

    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    pub fn degree_in(&self, var: &str) -> u32 {
        self.0.get(var).copied().unwrap_or(0)
    }

    pub fn total_degree(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut powers = self.0.clone();
        for (name, exp) in &other.0 {
            *powers.entry(name.clone()).or_insert(0) += exp;
        }
        Monomial(powers)
    }

    /// `self / other` when `other` divides `self`.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        let mut powers = self.0.clone();
        for (name, exp) in &other.0 {
            let have = powers.get(name).copied().unwrap_or(0);
            match have.cmp(exp) {
                Ordering::Less => return None,
                Ordering::Equal => {
                    powers.remove(name);
                }
                Ordering::Greater => {
                    powers.insert(name.clone(), have - exp);
                }
            }
        }
        Some(Monomial(powers))
    }

    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let powers = self
            .0
            .iter()
            .filter_map(|(name, exp)| {
                other
                    .0
                    .get(name)
                    .map(|other_exp| (name.clone(), (*exp).min(*other_exp)))
            })
            .collect();
        Monomial(powers)
    }

    /// The monomial with `var` removed.
    pub fn without(&self, var: &str) -> Monomial {
        let mut powers = self.0.clone();
        powers.remove(var);
        Monomial(powers)
    }

    fn to_factors(&self) -> Vec<Expr> {
        self.0
            .iter()
            .map(|(name, exp)| {
                let base = symbol_expr(name);
                if *exp == 1 {
                    base
                } else {
                    Expr::power(base, Expr::integer(i64::from(*exp)))
                }
            })
            .collect()
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut a = self.0.iter().peekable();
        let mut b = other.0.iter().peekable();
        loop {
            match (a.peek(), b.peek()) {
                (None, None) => return Ordering::Equal,
                (Some(_), None) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (Some((va, ea)), Some((vb, eb))) => match va.cmp(vb) {
                    // `self` carries the earlier variable, `other` does not.
                    Ordering::Less => return Ordering::Greater,
                    Ordering::Greater => return Ordering::Less,
                    Ordering::Equal => match ea.cmp(eb) {
                        Ordering::Equal => {
                            a.next();
                            b.next();
                        }
                        unequal => return unequal,
                    },
                },
            }
        }
    }
}

// Constants such as pi travel through the polynomial layer as opaque
// symbols and come back out as constants.
fn symbol_expr(name: &str) -> Expr {
    match Constant::from_name(name) {
        Some(c) => Expr::Constant(c),
        None => Expr::symbol(name),
    }
}

/// Sparse polynomial with no zero coefficients stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Poly::default()
    }

    pub fn constant(value: Rational) -> Self {
        Self::from_term(Monomial::one(), value)
    }

    pub fn var(name: &str) -> Self {
        Self::from_term(Monomial::var(name, 1), Rational::one())
    }

    pub fn from_term(monomial: Monomial, coefficient: Rational) -> Self {
        let mut terms = BTreeMap::new();
        if !coefficient.is_zero() {
            terms.insert(monomial, coefficient);
        }
        Poly { terms }
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The value of a constant polynomial.
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_one())
                .map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> {
        self.terms.iter()
    }

    pub fn total_degree(&self) -> u32 {
        self.terms.keys().map(Monomial::total_degree).max().unwrap_or(0)
    }

    pub fn degree_in(&self, var: &str) -> u32 {
        self.terms.keys().map(|m| m.degree_in(var)).max().unwrap_or(0)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.degree_in(var) > 0
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.terms
            .keys()
            .flat_map(|m| m.0.keys().cloned())
            .collect()
    }

    fn add_term(&mut self, monomial: Monomial, coefficient: Rational) {
        if coefficient.is_zero() {
            return;
        }
        let sum = match self.terms.get(&monomial) {
            Some(existing) => existing + &coefficient,
            None => coefficient,
        };
        if sum.is_zero() {
            self.terms.remove(&monomial);
        } else {
            self.terms.insert(monomial, sum);
        }
    }

    pub fn add(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Poly {
        self.scale(&Rational::from_integer(-1))
    }

    pub fn scale(&self, factor: &Rational) -> Poly {
        if factor.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(m, c)| (m.clone(), c * factor))
                .collect(),
        }
    }

    pub fn mul(&self, other: &Poly) -> Poly {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.add_term(ma.mul(mb), ca * cb);
            }
        }
        out
    }

    pub fn pow(&self, exponent: u32) -> Poly {
        let mut result = Poly::constant(Rational::one());
        for _ in 0..exponent {
            result = result.mul(self);
        }
        result
    }

    /// Exact division by a monomial that divides every term.
    fn div_monomial(&self, divisor: &Monomial) -> Poly {
        Poly {
            terms: self
                .terms
                .iter()
                .filter_map(|(m, c)| m.div(divisor).map(|q| (q, c.clone())))
                .collect(),
        }
    }

    /// Largest monomial dividing every term.
    pub fn monomial_gcd(&self) -> Monomial {
        let mut keys = self.terms.keys();
        let first = match keys.next() {
            Some(m) => m.clone(),
            None => return Monomial::one(),
        };
        keys.fold(first, |acc, m| acc.gcd(m))
    }

    /// Positive gcd of all coefficients.
    pub fn content(&self) -> Rational {
        self.terms
            .values()
            .fold(Rational::zero(), |acc, c| rational_gcd(&acc, c))
    }

    /// Coefficient of the leading monomial.
    pub fn leading_coefficient(&self) -> Rational {
        self.terms
            .iter()
            .next_back()
            .map(|(_, c)| c.clone())
            .unwrap_or_default()
    }

    /// Coefficients of `var^k` as polynomials free of `var`.
    pub fn collect_in(&self, var: &str) -> BTreeMap<u32, Poly> {
        let mut out: BTreeMap<u32, Poly> = BTreeMap::new();
        for (m, c) in &self.terms {
            out.entry(m.degree_in(var))
                .or_default()
                .add_term(m.without(var), c.clone());
        }
        out
    }

    /// Split into `sum(m * p_m(var))` where each `m` is free of `var`,
    /// returning the univariate pieces `p_m` in dense form.
    fn split_by(&self, var: &str) -> BTreeMap<Monomial, Vec<Rational>> {
        let mut out: BTreeMap<Monomial, Vec<Rational>> = BTreeMap::new();
        for (m, c) in &self.terms {
            let k = m.degree_in(var) as usize;
            let dense = out.entry(m.without(var)).or_default();
            if dense.len() <= k {
                dense.resize(k + 1, Rational::zero());
            }
            dense[k] = c.clone();
        }
        out
    }

    fn from_split(var: &str, pieces: &BTreeMap<Monomial, Vec<Rational>>) -> Poly {
        let mut out = Poly::zero();
        for (m, dense) in pieces {
            for (k, c) in dense.iter().enumerate() {
                out.add_term(m.mul(&Monomial::var(var, k as u32)), c.clone());
            }
        }
        out
    }

    /// Dense coefficients (lowest degree first) when the polynomial mentions
    /// no symbol other than `var`.
    fn to_dense(&self, var: &str) -> Option<Vec<Rational>> {
        if self.symbols().iter().any(|s| s != var) {
            return None;
        }
        let mut dense = vec![Rational::zero(); self.degree_in(var) as usize + 1];
        for (m, c) in &self.terms {
            dense[m.degree_in(var) as usize] = c.clone();
        }
        Some(dense)
    }

    fn from_dense(var: &str, dense: &[Rational]) -> Poly {
        let mut out = Poly::zero();
        for (k, c) in dense.iter().enumerate() {
            out.add_term(Monomial::var(var, k as u32), c.clone());
        }
        out
    }

    /// Replace `var` by a rational function.
    pub fn substitute(
        &self,
        var: &str,
        value: &RationalFunction,
    ) -> SymbolicResult<RationalFunction> {
        let collected = self.collect_in(var);
        let top = collected.keys().next_back().copied().unwrap_or(0);
        let mut acc = RationalFunction::zero();
        for k in (0..=top).rev() {
            acc = acc.mul(value)?;
            if let Some(coefficient) = collected.get(&k) {
                acc = acc.add(&RationalFunction::from_poly(coefficient.clone()))?;
            }
        }
        Ok(acc)
    }

    pub fn to_expr(&self) -> Expr {
        let terms = self
            .terms
            .iter()
            .rev()
            .map(|(m, c)| {
                if m.is_one() {
                    return Expr::Number(c.clone());
                }
                let mut factors = Vec::new();
                if !c.is_one() {
                    factors.push(Expr::Number(c.clone()));
                }
                factors.extend(m.to_factors());
                Expr::times(factors)
            })
            .collect();
        Expr::plus(terms)
    }
}

// Dense univariate helpers, coefficients lowest degree first.

fn trim(dense: &mut Vec<Rational>) {
    while dense.len() > 1 && dense.last().map_or(false, Rational::is_zero) {
        dense.pop();
    }
}

fn is_zero_dense(dense: &[Rational]) -> bool {
    dense.iter().all(Rational::is_zero)
}

fn dense_div_rem(numer: &[Rational], denom: &[Rational]) -> Option<(Vec<Rational>, Vec<Rational>)> {
    let mut d = denom.to_vec();
    trim(&mut d);
    let lead = d.last()?.clone();
    if lead.is_zero() {
        return None;
    }
    let mut rem = numer.to_vec();
    trim(&mut rem);
    if rem.len() < d.len() {
        return Some((vec![Rational::zero()], rem));
    }
    let mut quot = vec![Rational::zero(); rem.len() - d.len() + 1];
    while rem.len() >= d.len() && !is_zero_dense(&rem) {
        let shift = rem.len() - d.len();
        let factor = rem.last()?.checked_div(&lead)?;
        for (i, c) in d.iter().enumerate() {
            rem[shift + i] = &rem[shift + i] - &(c * &factor);
        }
        quot[shift] = factor;
        rem.pop();
        trim(&mut rem);
        if rem.len() < d.len() {
            break;
        }
    }
    Some((quot, rem))
}

/// Monic gcd of two univariate polynomials.
fn dense_gcd(a: &[Rational], b: &[Rational]) -> Vec<Rational> {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    trim(&mut a);
    trim(&mut b);
    while !is_zero_dense(&b) {
        let rem = match dense_div_rem(&a, &b) {
            Some((_, r)) => r,
            None => break,
        };
        a = b;
        b = rem;
    }
    match a.last().and_then(Rational::recip) {
        Some(inv) => a.iter().map(|c| c * &inv).collect(),
        None => vec![Rational::one()],
    }
}

/// Common univariate factor of `uni` (only in `var`) and `multi`, as the pair
/// of cofactors, when one of positive degree exists.
fn cancel_univariate(uni: &Poly, multi: &Poly, var: &str) -> Option<(Poly, Poly)> {
    let uni_dense = uni.to_dense(var)?;
    if uni_dense.len() < 2 {
        return None;
    }
    let pieces = multi.split_by(var);
    let mut g = uni_dense.clone();
    for dense in pieces.values() {
        g = dense_gcd(&g, dense);
        if g.len() < 2 {
            return None;
        }
    }
    let (uni_q, _) = dense_div_rem(&uni_dense, &g)?;
    let mut multi_pieces = BTreeMap::new();
    for (m, dense) in &pieces {
        let (q, _) = dense_div_rem(dense, &g)?;
        multi_pieces.insert(m.clone(), q);
    }
    Some((
        Poly::from_dense(var, &uni_q),
        Poly::from_split(var, &multi_pieces),
    ))
}

/// A quotient of polynomials kept in canonical form: no common monomial or
/// univariate factor, integer coefficients with unit content, and a positive
/// leading denominator coefficient. Constant denominators are folded into
/// the numerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalFunction {
    numer: Poly,
    denom: Poly,
}

impl RationalFunction {
    pub fn new(numer: Poly, denom: Poly) -> SymbolicResult<Self> {
        if denom.is_zero() {
            return Err(SymbolicError::DivisionByZero);
        }
        Ok(Self::normalized(numer, denom))
    }

    pub fn zero() -> Self {
        Self::from_poly(Poly::zero())
    }

    pub fn constant(value: Rational) -> Self {
        Self::from_poly(Poly::constant(value))
    }

    pub fn var(name: &str) -> Self {
        Self::from_poly(Poly::var(name))
    }

    pub fn from_poly(numer: Poly) -> Self {
        RationalFunction {
            numer,
            denom: Poly::constant(Rational::one()),
        }
    }

    pub fn numer(&self) -> &Poly {
        &self.numer
    }

    pub fn denom(&self) -> &Poly {
        &self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    pub fn is_polynomial(&self) -> bool {
        self.denom.as_constant().is_some()
    }

    pub fn as_constant(&self) -> Option<Rational> {
        let n = self.numer.as_constant()?;
        let d = self.denom.as_constant()?;
        n.checked_div(&d)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.numer.contains(var) || self.denom.contains(var)
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = self.numer.symbols();
        out.extend(self.denom.symbols());
        out
    }

    pub fn total_degree(&self) -> u32 {
        self.numer.total_degree().max(self.denom.total_degree())
    }

    pub fn term_count(&self) -> usize {
        self.numer.term_count() + self.denom.term_count()
    }

    fn normalized(mut numer: Poly, mut denom: Poly) -> Self {
        if numer.is_zero() {
            return Self::zero();
        }

        let common = numer.monomial_gcd().gcd(&denom.monomial_gcd());
        if !common.is_one() {
            numer = numer.div_monomial(&common);
            denom = denom.div_monomial(&common);
        }

        if let Some((n, d)) = Self::cancel_common_factor(&numer, &denom) {
            numer = n;
            denom = d;
        }

        if let Some(c) = denom.as_constant() {
            let factor = c.recip().unwrap_or_else(Rational::one);
            return Self::from_poly(numer.scale(&factor));
        }

        let mut scale = rational_gcd(&numer.content(), &denom.content())
            .recip()
            .unwrap_or_else(Rational::one);
        if denom.leading_coefficient().is_negative() {
            scale = -scale;
        }
        RationalFunction {
            numer: numer.scale(&scale),
            denom: denom.scale(&scale),
        }
    }

    fn cancel_common_factor(numer: &Poly, denom: &Poly) -> Option<(Poly, Poly)> {
        let denom_symbols = denom.symbols();
        if denom_symbols.len() == 1 {
            let var = denom_symbols.iter().next()?;
            if let Some((d, n)) = cancel_univariate(denom, numer, var) {
                return Some((n, d));
            }
        }
        let numer_symbols = numer.symbols();
        if numer_symbols.len() == 1 {
            let var = numer_symbols.iter().next()?;
            return cancel_univariate(numer, denom, var);
        }
        None
    }

    pub fn add(&self, other: &RationalFunction) -> SymbolicResult<Self> {
        if self.denom == other.denom {
            return Self::new(self.numer.add(&other.numer), self.denom.clone());
        }
        Self::new(
            self.numer
                .mul(&other.denom)
                .add(&other.numer.mul(&self.denom)),
            self.denom.mul(&other.denom),
        )
    }

    pub fn sub(&self, other: &RationalFunction) -> SymbolicResult<Self> {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Self {
        RationalFunction {
            numer: self.numer.neg(),
            denom: self.denom.clone(),
        }
    }

    pub fn mul(&self, other: &RationalFunction) -> SymbolicResult<Self> {
        Self::new(self.numer.mul(&other.numer), self.denom.mul(&other.denom))
    }

    pub fn div(&self, other: &RationalFunction) -> SymbolicResult<Self> {
        if other.is_zero() {
            return Err(SymbolicError::DivisionByZero);
        }
        Self::new(self.numer.mul(&other.denom), self.denom.mul(&other.numer))
    }

    pub fn pow(&self, exponent: i64) -> SymbolicResult<Self> {
        let magnitude = u32::try_from(exponent.unsigned_abs())
            .map_err(|_| {
                SymbolicError::BudgetExceeded(format!("exponent {} is too large", exponent))
            })?;
        let numer = self.numer.pow(magnitude);
        let denom = self.denom.pow(magnitude);
        if exponent < 0 {
            Self::new(denom, numer)
        } else {
            Self::new(numer, denom)
        }
    }

    /// Replace `var` by another rational function.
    pub fn substitute(&self, var: &str, value: &RationalFunction) -> SymbolicResult<Self> {
        if !self.contains(var) {
            return Ok(self.clone());
        }
        let numer = self.numer.substitute(var, value)?;
        let denom = self.denom.substitute(var, value)?;
        numer.div(&denom)
    }

    pub fn to_expr(&self) -> Expr {
        if self.is_polynomial() {
            return self.numer.to_expr();
        }
        Expr::div(self.numer.to_expr(), self.denom.to_expr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n.into(), d.into()).unwrap()
    }

    fn x() -> Poly {
        Poly::var("x")
    }

    fn y() -> Poly {
        Poly::var("y")
    }

    fn c(n: i64) -> Poly {
        Poly::constant(Rational::from_integer(n))
    }

    #[test]
    fn test_monomial_order_is_lexicographic() {
        let x2 = Monomial::var("x", 2);
        let xy = Monomial::var("x", 1).mul(&Monomial::var("y", 1));
        let y3 = Monomial::var("y", 3);
        assert!(x2 > xy);
        assert!(xy > Monomial::var("x", 1));
        assert!(Monomial::var("x", 1) > y3);
        assert!(y3 > Monomial::one());
    }

    #[test]
    fn test_polynomial_display_order() {
        let p = c(2).mul(&x()).add(&c(3).mul(&y())).add(&c(2));
        assert_eq!(p.to_expr().to_string(), "2*x + 3*y + 2");
        let sq = x().sub(&y()).pow(2);
        assert_eq!(sq.to_expr().to_string(), "x**2 - 2*x*y + y**2");
    }

    #[test]
    fn test_constant_denominator_folds() {
        let joint = RationalFunction::new(
            c(2).mul(&x()).add(&c(3).mul(&y())).add(&c(2)),
            c(28),
        )
        .unwrap();
        assert!(joint.is_polynomial());
        assert_eq!(joint.to_expr().to_string(), "x/14 + 3*y/28 + 1/14");
    }

    #[test]
    fn test_content_is_cleared_across_quotient() {
        let numer = Poly::constant(q(1, 28)).mul(&c(2).mul(&x()).add(&c(3).mul(&y())).add(&c(2)));
        let denom = Poly::constant(q(1, 28)).mul(&c(6).mul(&y()).add(&c(8)));
        let f = RationalFunction::new(numer, denom).unwrap();
        assert_eq!(f.to_expr().to_string(), "(2*x + 3*y + 2)/(6*y + 8)");
    }

    #[test]
    fn test_common_factors_cancel() {
        // 4xy / (8y/5) == 5x/2
        let f = RationalFunction::new(
            c(4).mul(&x()).mul(&y()),
            Poly::constant(q(8, 5)).mul(&y()),
        )
        .unwrap();
        assert_eq!(f.to_expr().to_string(), "5*x/2");

        // 4x(1 - y) / (8(1 - y)/5) == 5x/2
        let one_minus_y = c(1).sub(&y());
        let g = RationalFunction::new(
            c(4).mul(&x()).mul(&one_minus_y),
            Poly::constant(q(8, 5)).mul(&one_minus_y),
        )
        .unwrap();
        assert_eq!(g, f);
    }

    #[test]
    fn test_zero_denominator_is_rejected() {
        assert_eq!(
            RationalFunction::new(x(), Poly::zero()),
            Err(SymbolicError::DivisionByZero)
        );
        assert!(RationalFunction::var("x").div(&RationalFunction::zero()).is_err());
    }

    #[test]
    fn test_substitute_variable() {
        // (x^2 + y) with x := 1/y
        let p = RationalFunction::from_poly(x().pow(2).add(&y()));
        let inv_y = RationalFunction::constant(Rational::one())
            .div(&RationalFunction::var("y"))
            .unwrap();
        let r = p.substitute("x", &inv_y).unwrap();
        assert_eq!(r.to_expr().to_string(), "(y**3 + 1)/y**2");
    }

    #[test]
    fn test_collect_in() {
        let p = x().pow(2).add(&c(3).mul(&x()).mul(&y())).add(&c(2).mul(&x())).sub(&c(8));
        let collected = p.collect_in("x");
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[&2], c(1));
        assert_eq!(collected[&1], c(3).mul(&y()).add(&c(2)));
        assert_eq!(collected[&0], c(-8));
    }
}
