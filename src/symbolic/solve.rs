//! Closed-form roots of polynomial equations, and of equations in which the
//! unknown sits inside a single `exp` or `log`.

use super::calculus::{to_rational_with_atoms, Atoms};
use super::expr::{Expr, Function};
use super::poly::RationalFunction;
use super::rational::Rational;
use super::{DerivationLimits, Equation, SymbolicError, SymbolicResult};
use std::collections::BTreeMap;

/// Solve `lhs = rhs` for `var`. Returns every root in a fixed order: for
/// quadratics and even binomials the negative square-root branch comes first.
pub fn solve(
    equation: &Equation<Expr>,
    var: &str,
    limits: &DerivationLimits,
) -> SymbolicResult<Vec<Expr>> {
    let difference = Expr::sub(equation.lhs.clone(), equation.rhs.clone());
    let mut atoms = Atoms::new();
    let rf = to_rational_with_atoms(&difference, limits, &mut atoms)?;
    if rf.is_zero() {
        return Ok(Vec::new());
    }
    let dependent = atoms.depending_on(&rf, var);
    match dependent.as_slice() {
        [] => Ok(solve_polynomial(&rf, var)?
            .iter()
            .map(|root| atoms.restore(root))
            .collect()),
        [atom] if !rf.contains(var) => invert(&rf, var, atom, &atoms, limits),
        _ => Err(SymbolicError::Unsupported(format!(
            "cannot isolate {} in {} = 0",
            var, difference
        ))),
    }
}

/// Solve for the value of `atom` first, then undo its function:
/// `exp(a) = v` gives `a = log(v)` and `log(a) = v` gives `a = exp(v)`.
fn invert(
    rf: &RationalFunction,
    var: &str,
    atom: &str,
    atoms: &Atoms,
    limits: &DerivationLimits,
) -> SymbolicResult<Vec<Expr>> {
    let (function, argument) = match atoms.get(atom) {
        Some(Expr::Function(function @ (Function::Exp | Function::Log), argument)) => {
            (*function, &**argument)
        }
        Some(other) => {
            return Err(SymbolicError::Unsupported(format!(
                "cannot invert {} for {}",
                other, var
            )))
        }
        None => return Err(SymbolicError::UnboundSymbol(atom.to_string())),
    };
    let inverse = match function {
        Function::Exp => Function::Log,
        _ => Function::Exp,
    };

    let mut roots = Vec::new();
    for value in solve_polynomial(rf, atom)? {
        let value = atoms.restore(&value);
        let inner = Equation::new(argument.clone(), Expr::apply(inverse, value));
        roots.extend(solve(&inner, var, limits)?);
    }
    Ok(roots)
}

fn solve_polynomial(rf: &RationalFunction, var: &str) -> SymbolicResult<Vec<Expr>> {
    let coefficients: BTreeMap<u32, RationalFunction> = rf
        .numer()
        .collect_in(var)
        .into_iter()
        .map(|(k, c)| (k, RationalFunction::from_poly(c)))
        .collect();
    let degree = coefficients.keys().next_back().copied().unwrap_or(0);
    let zero = RationalFunction::zero();
    let coefficient = |k: u32| coefficients.get(&k).unwrap_or(&zero);

    match degree {
        0 => Ok(Vec::new()),
        1 => {
            let root = coefficient(0).neg().div(coefficient(1))?;
            Ok(vec![root.to_expr()])
        }
        2 => solve_quadratic(coefficient(2), coefficient(1), coefficient(0)),
        _ if coefficients.len() == 1 => Ok(vec![Expr::integer(0)]),
        n if coefficients.len() == 2 && coefficients.contains_key(&0) => {
            let value = coefficient(0).neg().div(coefficient(n))?;
            let root = nth_root(&value, n);
            if n % 2 == 0 {
                Ok(vec![Expr::neg(root.clone()), root])
            } else {
                Ok(vec![root])
            }
        }
        n => Err(SymbolicError::Unsupported(format!(
            "cannot solve a degree-{} polynomial equation in {}",
            n, var
        ))),
    }
}

fn solve_quadratic(
    a: &RationalFunction,
    b: &RationalFunction,
    c: &RationalFunction,
) -> SymbolicResult<Vec<Expr>> {
    if b.is_zero() && c.is_zero() {
        return Ok(vec![Expr::integer(0)]);
    }
    if c.is_zero() {
        let other = b.neg().div(a)?;
        return Ok(vec![Expr::integer(0), other.to_expr()]);
    }
    if b.is_zero() {
        let value = c.neg().div(a)?;
        let root = nth_root(&value, 2);
        return Ok(vec![Expr::neg(root.clone()), root]);
    }

    let four = RationalFunction::constant(Rational::from_integer(4));
    let two_a = RationalFunction::constant(Rational::from_integer(2)).mul(a)?;
    let discriminant = b.mul(b)?.sub(&four.mul(a)?.mul(c)?)?;
    let minus_b = b.neg();

    if let Some(s) = discriminant.as_constant().and_then(|d| d.exact_root(2)) {
        let s = RationalFunction::constant(s);
        let low = minus_b.sub(&s)?.div(&two_a)?;
        let high = minus_b.add(&s)?.div(&two_a)?;
        return Ok(vec![low.to_expr(), high.to_expr()]);
    }

    // (-b -/+ sqrt(d)) / 2a, written as centre -/+ sqrt(d) * (1 / 2a).
    let centre = minus_b.div(&two_a)?.to_expr();
    let scale = RationalFunction::constant(Rational::one()).div(&two_a)?;
    let sqrt_disc = Expr::sqrt(discriminant.to_expr());
    Ok(vec![
        Expr::plus(vec![
            centre.clone(),
            Expr::times(vec![scale.neg().to_expr(), sqrt_disc.clone()]),
        ]),
        Expr::plus(vec![centre, Expr::times(vec![scale.to_expr(), sqrt_disc])]),
    ])
}

/// Principal `n`-th root, exact when the value is a constant perfect power.
fn nth_root(value: &RationalFunction, n: u32) -> Expr {
    if let Some(root) = value.as_constant().and_then(|v| v.exact_root(n)) {
        return Expr::Number(root);
    }
    if n == 2 {
        return Expr::sqrt(value.to_expr());
    }
    let exponent = Rational::from_integer(i64::from(n))
        .recip()
        .unwrap_or_else(Rational::one);
    Expr::power(value.to_expr(), Expr::Number(exponent))
}
