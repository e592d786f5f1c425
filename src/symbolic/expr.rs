//! Symbolic expression trees and their textual rendering.

use super::rational::Rational;
use num_bigint::BigInt;
use num_traits::One;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Elementary functions understood by the parser and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sqrt" => Some(Function::Sqrt),
            "exp" => Some(Function::Exp),
            "log" | "ln" => Some(Function::Log),
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "abs" | "Abs" => Some(Function::Abs),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Abs => "Abs",
        }
    }
}

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "E" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

/// A symbolic expression. Sums and products are n-ary; subtraction and
/// division are encoded as `-1` factors and `-1` powers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Rational),
    Real(f64),
    Symbol(String),
    Constant(Constant),
    Plus(Vec<Expr>),
    Times(Vec<Expr>),
    Power(Box<Expr>, Box<Expr>),
    Function(Function, Box<Expr>),
}

/// Numeric values bound to symbol names for substitution and evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding, e.g. `Bindings::new().bind("y", 0.5).bind("u", 0.5)`.
    pub fn bind(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Expr {
    pub fn integer(n: i64) -> Self {
        Expr::Number(Rational::from_integer(n))
    }

    pub fn number(value: Rational) -> Self {
        Expr::Number(value)
    }

    pub fn real(value: f64) -> Self {
        Expr::Real(value)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    /// Sum of `terms`, flattening nested sums.
    pub fn plus(terms: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Expr::Plus(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::integer(0),
            1 => flat.remove(0),
            _ => Expr::Plus(flat),
        }
    }

    /// Product of `factors`, flattening nested products.
    pub fn times(factors: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(factors.len());
        for factor in factors {
            match factor {
                Expr::Times(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::integer(1),
            1 => flat.remove(0),
            _ => Expr::Times(flat),
        }
    }

    pub fn power(base: Expr, exponent: Expr) -> Self {
        Expr::Power(Box::new(base), Box::new(exponent))
    }

    pub fn apply(function: Function, argument: Expr) -> Self {
        Expr::Function(function, Box::new(argument))
    }

    pub fn sqrt(argument: Expr) -> Self {
        Expr::apply(Function::Sqrt, argument)
    }

    pub fn neg(expr: Expr) -> Self {
        match expr {
            Expr::Number(r) => Expr::Number(-r),
            Expr::Real(v) => Expr::Real(-v),
            other => Expr::times(vec![Expr::integer(-1), other]),
        }
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Self {
        Expr::plus(vec![lhs, Expr::neg(rhs)])
    }

    pub fn div(numer: Expr, denom: Expr) -> Self {
        Expr::times(vec![numer, Expr::recip(denom)])
    }

    pub fn recip(expr: Expr) -> Self {
        Expr::power(expr, Expr::integer(-1))
    }

    pub fn as_number(&self) -> Option<&Rational> {
        match self {
            Expr::Number(r) => Some(r),
            _ => None,
        }
    }

    /// Exact value of a symbol-free expression built from rationals with
    /// integer powers, e.g. the exponent in `y**(1/3)`.
    pub fn as_exact_number(&self) -> Option<Rational> {
        match self {
            Expr::Number(r) => Some(r.clone()),
            Expr::Plus(items) => items
                .iter()
                .try_fold(Rational::zero(), |acc, i| Some(&acc + &i.as_exact_number()?)),
            Expr::Times(items) => items
                .iter()
                .try_fold(Rational::one(), |acc, i| Some(&acc * &i.as_exact_number()?)),
            Expr::Power(base, exponent) => {
                let e = exponent.as_exact_number()?.to_i64()?;
                base.as_exact_number()?.pow(i32::try_from(e).ok()?)
            }
            _ => None,
        }
    }

    /// Names of all symbols occurring in the expression.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Symbol(name) => {
                out.insert(name.clone());
            }
            Expr::Plus(items) | Expr::Times(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Expr::Power(base, exponent) => {
                base.collect_symbols(out);
                exponent.collect_symbols(out);
            }
            Expr::Function(_, argument) => argument.collect_symbols(out),
            Expr::Number(_) | Expr::Real(_) | Expr::Constant(_) => {}
        }
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        match self {
            Expr::Symbol(s) => s == name,
            Expr::Plus(items) | Expr::Times(items) => items.iter().any(|i| i.contains_symbol(name)),
            Expr::Power(base, exponent) => {
                base.contains_symbol(name) || exponent.contains_symbol(name)
            }
            Expr::Function(_, argument) => argument.contains_symbol(name),
            Expr::Number(_) | Expr::Real(_) | Expr::Constant(_) => false,
        }
    }

    /// Replace bound symbols by their numeric values.
    pub fn substitute(&self, bindings: &Bindings) -> Expr {
        match self {
            Expr::Symbol(name) => match bindings.get(name) {
                Some(value) => Expr::Real(value),
                None => self.clone(),
            },
            Expr::Plus(items) => Expr::Plus(items.iter().map(|i| i.substitute(bindings)).collect()),
            Expr::Times(items) => {
                Expr::Times(items.iter().map(|i| i.substitute(bindings)).collect())
            }
            Expr::Power(base, exponent) => {
                Expr::power(base.substitute(bindings), exponent.substitute(bindings))
            }
            Expr::Function(function, argument) => {
                Expr::apply(*function, argument.substitute(bindings))
            }
            Expr::Number(_) | Expr::Real(_) | Expr::Constant(_) => self.clone(),
        }
    }

    /// Replace every occurrence of symbol `name` by `replacement`.
    pub fn replace_symbol(&self, name: &str, replacement: &Expr) -> Expr {
        match self {
            Expr::Symbol(s) if s == name => replacement.clone(),
            Expr::Plus(items) => {
                Expr::plus(items.iter().map(|i| i.replace_symbol(name, replacement)).collect())
            }
            Expr::Times(items) => {
                Expr::times(items.iter().map(|i| i.replace_symbol(name, replacement)).collect())
            }
            Expr::Power(base, exponent) => Expr::power(
                base.replace_symbol(name, replacement),
                exponent.replace_symbol(name, replacement),
            ),
            Expr::Function(function, argument) => {
                Expr::apply(*function, argument.replace_symbol(name, replacement))
            }
            _ => self.clone(),
        }
    }
}

// Rendering. The output follows the conventional `x/14 + 3*y/28 + 1/14`
// style: `**` for powers, divisions pulled out of products.

const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_POWER: u8 = 3;
const PREC_ATOM: u8 = 4;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Plus(_) => PREC_SUM,
        Expr::Times(_) => PREC_PRODUCT,
        Expr::Number(r) if r.is_negative() || !r.is_integer() => PREC_PRODUCT,
        Expr::Real(v) if *v < 0.0 => PREC_PRODUCT,
        Expr::Power(_, exponent) => match exponent.as_number() {
            Some(r) if r.is_negative() => PREC_PRODUCT,
            _ => PREC_POWER,
        },
        _ => PREC_ATOM,
    }
}

fn wrap(expr: &Expr, min_precedence: u8) -> String {
    let text = render(expr);
    if precedence(expr) < min_precedence {
        format!("({})", text)
    } else {
        text
    }
}

fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Split a term into its sign and magnitude so sums print `a - b`.
fn split_sign(expr: &Expr) -> (bool, Expr) {
    match expr {
        Expr::Number(r) if r.is_negative() => (true, Expr::Number(-r)),
        Expr::Real(v) if *v < 0.0 => (true, Expr::Real(-v)),
        Expr::Times(factors) => match factors.first() {
            Some(Expr::Number(r)) if r.is_negative() => {
                let magnitude = -r;
                let mut rest: Vec<Expr> = Vec::with_capacity(factors.len());
                if !magnitude.is_one() {
                    rest.push(Expr::Number(magnitude));
                }
                rest.extend(factors[1..].iter().cloned());
                (true, Expr::times(rest))
            }
            _ => (false, expr.clone()),
        },
        _ => (false, expr.clone()),
    }
}

fn render(expr: &Expr) -> String {
    match expr {
        Expr::Number(r) => r.to_string(),
        Expr::Real(v) => format_real(*v),
        Expr::Symbol(name) => name.clone(),
        Expr::Constant(c) => c.name().to_string(),
        Expr::Plus(terms) => render_sum(terms),
        Expr::Times(factors) => render_product(factors),
        Expr::Power(base, exponent) => render_power(expr, base, exponent),
        Expr::Function(function, argument) => {
            format!("{}({})", function.name(), render(argument))
        }
    }
}

fn render_sum(terms: &[Expr]) -> String {
    let mut out = String::new();
    for (i, term) in terms.iter().enumerate() {
        let (negative, magnitude) = split_sign(term);
        let text = wrap(&magnitude, PREC_PRODUCT);
        match (i, negative) {
            (0, true) => {
                out.push('-');
                out.push_str(&text);
            }
            (0, false) => out.push_str(&text),
            (_, true) => {
                out.push_str(" - ");
                out.push_str(&text);
            }
            (_, false) => {
                out.push_str(" + ");
                out.push_str(&text);
            }
        }
    }
    out
}

fn render_product(factors: &[Expr]) -> String {
    let mut coefficient = Rational::one();
    let mut numer: Vec<&Expr> = Vec::new();
    let mut denom: Vec<Expr> = Vec::new();
    for factor in factors {
        match factor {
            Expr::Number(r) => coefficient = &coefficient * r,
            Expr::Power(base, exponent) => match exponent.as_number() {
                Some(r) if r.is_negative() => {
                    let positive = -r;
                    if positive.is_one() {
                        denom.push(base.as_ref().clone());
                    } else {
                        denom.push(Expr::power(base.as_ref().clone(), Expr::Number(positive)));
                    }
                }
                _ => numer.push(factor),
            },
            other => numer.push(other),
        }
    }

    let mut out = String::new();
    if coefficient.is_negative() {
        out.push('-');
    }
    let magnitude = coefficient.abs();
    let mut numer_parts: Vec<String> = Vec::new();
    if !magnitude.numer().is_one() || numer.is_empty() {
        numer_parts.push(magnitude.numer().to_string());
    }
    numer_parts.extend(numer.iter().map(|f| wrap(f, PREC_POWER)));
    out.push_str(&numer_parts.join("*"));

    let mut denom_parts: Vec<String> = Vec::new();
    if !magnitude.is_integer() {
        denom_parts.push(magnitude.denom().to_string());
    }
    denom_parts.extend(denom.iter().map(|f| wrap(f, PREC_POWER)));
    match denom_parts.len() {
        0 => {}
        1 => {
            out.push('/');
            out.push_str(&denom_parts[0]);
        }
        _ => {
            out.push_str("/(");
            out.push_str(&denom_parts.join("*"));
            out.push(')');
        }
    }
    out
}

fn render_power(expr: &Expr, base: &Expr, exponent: &Expr) -> String {
    if let Some(r) = exponent.as_number() {
        if r.is_negative() {
            return render_product(std::slice::from_ref(expr));
        }
        if r.numer().is_one() && r.denom() == &BigInt::from(2) {
            return format!("sqrt({})", render(base));
        }
    }
    format!("{}**{}", wrap(base, PREC_ATOM), wrap(exponent, PREC_ATOM))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn y() -> Expr {
        Expr::symbol("y")
    }

    fn frac(n: i64, d: i64) -> Expr {
        Expr::Number(Rational::new(n.into(), d.into()).unwrap())
    }

    #[test]
    fn test_render_sum_with_fractions() {
        let e = Expr::plus(vec![
            Expr::times(vec![frac(1, 14), x()]),
            Expr::times(vec![frac(3, 28), y()]),
            frac(1, 14),
        ]);
        assert_eq!(e.to_string(), "x/14 + 3*y/28 + 1/14");
    }

    #[test]
    fn test_render_negative_terms() {
        let e = Expr::plus(vec![
            Expr::power(x(), Expr::integer(2)),
            Expr::times(vec![Expr::integer(-2), x(), y()]),
            frac(-1, 80),
        ]);
        assert_eq!(e.to_string(), "x**2 - 2*x*y - 1/80");
        assert_eq!(Expr::neg(x()).to_string(), "-x");
    }

    #[test]
    fn test_render_quotients() {
        let numer = Expr::plus(vec![Expr::times(vec![Expr::integer(2), x()]), Expr::integer(1)]);
        let denom = Expr::plus(vec![Expr::times(vec![Expr::integer(6), y()]), Expr::integer(8)]);
        assert_eq!(Expr::div(numer, denom).to_string(), "(2*x + 1)/(6*y + 8)");
        assert_eq!(Expr::div(x(), y()).to_string(), "x/y");
        assert_eq!(Expr::recip(x()).to_string(), "1/x");
    }

    #[test]
    fn test_render_powers_and_functions() {
        let sum = Expr::plus(vec![x(), Expr::integer(1)]);
        assert_eq!(Expr::power(sum.clone(), Expr::integer(2)).to_string(), "(x + 1)**2");
        assert_eq!(Expr::sqrt(sum).to_string(), "sqrt(x + 1)");
        assert_eq!(Expr::power(y(), frac(1, 3)).to_string(), "y**(1/3)");
        assert_eq!(Expr::apply(Function::Log, x()).to_string(), "log(x)");
    }

    #[test]
    fn test_free_symbols_and_substitute() {
        let e = Expr::times(vec![x(), Expr::symbol("z")]);
        let names: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "z".to_string()]);

        let bound = e.substitute(&Bindings::new().bind("x", 2.0));
        assert_eq!(bound, Expr::Times(vec![Expr::Real(2.0), Expr::symbol("z")]));
        assert!(bound.contains_symbol("z"));
        assert!(!bound.contains_symbol("x"));
    }
}
