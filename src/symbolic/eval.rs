//! Numeric evaluation over the reals.

use super::expr::{Bindings, Expr, Function};
use super::{SymbolicError, SymbolicResult};

/// Evaluate `expr` to a finite real number. Symbols must be bound.
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> SymbolicResult<f64> {
    let value = eval(expr, bindings)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SymbolicError::NonFinite)
    }
}

fn eval(expr: &Expr, bindings: &Bindings) -> SymbolicResult<f64> {
    match expr {
        Expr::Number(r) => Ok(r.to_f64()),
        Expr::Real(v) => Ok(*v),
        Expr::Symbol(name) => bindings
            .get(name)
            .ok_or_else(|| SymbolicError::UnboundSymbol(name.clone())),
        Expr::Constant(c) => Ok(c.value()),
        Expr::Plus(terms) => terms.iter().try_fold(0.0, |acc, t| Ok(acc + eval(t, bindings)?)),
        Expr::Times(factors) => factors
            .iter()
            .try_fold(1.0, |acc, f| Ok(acc * eval(f, bindings)?)),
        Expr::Power(base, exponent) => eval_power(base, exponent, bindings),
        Expr::Function(function, argument) => {
            let a = eval(argument, bindings)?;
            match function {
                Function::Sqrt if a < 0.0 => Err(SymbolicError::Domain(format!(
                    "square root of negative value {}",
                    a
                ))),
                Function::Sqrt => Ok(a.sqrt()),
                Function::Log if a <= 0.0 => Err(SymbolicError::Domain(format!(
                    "logarithm of non-positive value {}",
                    a
                ))),
                Function::Log => Ok(a.ln()),
                Function::Exp => Ok(a.exp()),
                Function::Sin => Ok(a.sin()),
                Function::Cos => Ok(a.cos()),
                Function::Tan => Ok(a.tan()),
                Function::Abs => Ok(a.abs()),
            }
        }
    }
}

fn eval_power(base: &Expr, exponent: &Expr, bindings: &Bindings) -> SymbolicResult<f64> {
    let b = eval(base, bindings)?;
    let e = eval(exponent, bindings)?;
    if b == 0.0 && e < 0.0 {
        return Err(SymbolicError::DivisionByZero);
    }
    if b >= 0.0 || e.fract() == 0.0 {
        return Ok(if e.fract() == 0.0 && e.abs() <= f64::from(i32::MAX) {
            b.powi(e as i32)
        } else {
            b.powf(e)
        });
    }
    // Negative base with a fractional exponent: real only for odd roots.
    if let Some(r) = exponent.as_exact_number() {
        if r.has_odd_denom() {
            let magnitude = (-b).powf(e);
            return Ok(if r.has_odd_numer() { -magnitude } else { magnitude });
        }
    }
    Err(SymbolicError::Domain(format!(
        "fractional power {} of negative value {}",
        e, b
    )))
}

/// `Some(true)` when the expression has no radicals or logarithms,
/// `Some(false)` when one of them has a provably negative constant
/// argument, `None` otherwise.
pub fn is_definitely_real(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Number(_) | Expr::Real(_) | Expr::Symbol(_) | Expr::Constant(_) => Some(true),
        Expr::Plus(items) | Expr::Times(items) => combine(items.iter().map(is_definitely_real)),
        Expr::Function(Function::Sqrt, argument) | Expr::Function(Function::Log, argument) => {
            match constant_sign(argument) {
                Some(v) if v < 0.0 => Some(false),
                Some(_) => is_definitely_real(argument),
                None => None,
            }
        }
        Expr::Function(_, argument) => is_definitely_real(argument),
        Expr::Power(base, exponent) => {
            let exact = exponent.as_exact_number();
            let is_root = exact.as_ref().map_or(true, |r| !r.is_integer());
            if !is_root {
                return is_definitely_real(base);
            }
            match constant_sign(base) {
                Some(v) if v < 0.0 => match exact {
                    Some(r) if r.has_odd_denom() => Some(true),
                    _ => Some(false),
                },
                Some(_) => combine([is_definitely_real(base), is_definitely_real(exponent)]),
                None => None,
            }
        }
    }
}

fn combine(parts: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(true);
    for part in parts {
        match part {
            Some(false) => return Some(false),
            None => result = None,
            Some(true) => {}
        }
    }
    result
}

/// Value of a symbol-free expression, when it can be computed.
fn constant_sign(expr: &Expr) -> Option<f64> {
    if !expr.free_symbols().is_empty() {
        return None;
    }
    evaluate(expr, &Bindings::new()).ok()
}
