//! Conversion to rational functions, simplification and definite
//! integration.

use super::expr::{Expr, Function};
use super::poly::{Poly, RationalFunction};
use super::rational::Rational;
use super::{DerivationLimits, SymbolicError, SymbolicResult};
use log::trace;

const ATOM_PREFIX: char = '~';

/// Subterms outside the rational-function class (`exp`, `log`, roots, ...)
/// travel through the polynomial layer as opaque symbols `~0`, `~1`, ...
/// Entries hold the original subterm with its argument already simplified,
/// so equal subterms share one symbol.
#[derive(Debug, Clone, Default)]
pub struct Atoms {
    entries: Vec<Expr>,
}

impl Atoms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol standing for `expr`, registered on first use.
    fn intern(&mut self, expr: Expr) -> String {
        let index = match self.entries.iter().position(|e| *e == expr) {
            Some(index) => index,
            None => {
                self.entries.push(expr);
                self.entries.len() - 1
            }
        };
        format!("{}{}", ATOM_PREFIX, index)
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        let index: usize = name.strip_prefix(ATOM_PREFIX)?.parse().ok()?;
        self.entries.get(index)
    }

    /// Atoms occurring in `rf` whose subterm mentions `var`.
    pub fn depending_on(&self, rf: &RationalFunction, var: &str) -> Vec<String> {
        rf.symbols()
            .into_iter()
            .filter(|name| self.get(name).map_or(false, |e| e.contains_symbol(var)))
            .collect()
    }

    /// Whether `rf` involves `var` directly or through an atom.
    pub fn involves(&self, rf: &RationalFunction, var: &str) -> bool {
        rf.contains(var) || !self.depending_on(rf, var).is_empty()
    }

    /// Put the original subterms back in place of their symbols.
    pub fn restore(&self, expr: &Expr) -> Expr {
        self.entries
            .iter()
            .enumerate()
            .fold(expr.clone(), |acc, (index, entry)| {
                acc.replace_symbol(&format!("{}{}", ATOM_PREFIX, index), entry)
            })
    }
}

/// Expand `expr` into a canonical rational function. Constants such as `pi`
/// are carried as opaque symbols; anything transcendental is rejected.
pub fn to_rational(expr: &Expr, limits: &DerivationLimits) -> SymbolicResult<RationalFunction> {
    Rationalizer {
        limits,
        atoms: None,
    }
    .convert(expr)
}

/// Like [`to_rational`], with transcendental subterms replaced by symbols
/// registered in `atoms`. `exp` of a polynomial is split per term, with each
/// exponent made positive, so `exp(-x - y)` becomes `1/(exp(x)*exp(y))`.
pub fn to_rational_with_atoms(
    expr: &Expr,
    limits: &DerivationLimits,
    atoms: &mut Atoms,
) -> SymbolicResult<RationalFunction> {
    Rationalizer {
        limits,
        atoms: Some(atoms),
    }
    .convert(expr)
}

struct Rationalizer<'a> {
    limits: &'a DerivationLimits,
    atoms: Option<&'a mut Atoms>,
}

impl Rationalizer<'_> {
    fn convert(&mut self, expr: &Expr) -> SymbolicResult<RationalFunction> {
        let limits = self.limits;
        let rf = match expr {
            Expr::Number(r) => RationalFunction::constant(r.clone()),
            Expr::Real(v) => {
                RationalFunction::constant(Rational::from_f64(*v).ok_or(SymbolicError::NonFinite)?)
            }
            Expr::Symbol(name) => RationalFunction::var(name),
            Expr::Constant(c) => RationalFunction::var(c.name()),
            Expr::Plus(terms) => {
                let mut acc = RationalFunction::zero();
                for term in terms {
                    acc = acc.add(&self.convert(term)?)?;
                    limits.check(&acc)?;
                }
                return Ok(acc);
            }
            Expr::Times(factors) => {
                let mut acc = RationalFunction::constant(Rational::one());
                for factor in factors {
                    acc = acc.mul(&self.convert(factor)?)?;
                    limits.check(&acc)?;
                }
                return Ok(acc);
            }
            Expr::Power(base, exponent) => match integer_exponent(exponent) {
                Ok(n) => {
                    let base = self.convert(base)?;
                    if let Some(value) = base.as_constant() {
                        return constant_power(&value, n);
                    }
                    let projected =
                        u64::from(base.total_degree()).saturating_mul(n.unsigned_abs());
                    if projected > u64::from(limits.max_degree) || n.unsigned_abs() > MAX_EXPONENT {
                        return Err(SymbolicError::BudgetExceeded(format!(
                            "power {} of a degree-{} expression",
                            n,
                            base.total_degree()
                        )));
                    }
                    base.pow(n)?
                }
                Err(SymbolicError::Unsupported(reason)) if self.atoms.is_some() => {
                    let base = self.convert(base)?.to_expr();
                    let exponent = self.convert(exponent)?.to_expr();
                    self.intern(Expr::power(base, exponent), &reason)?
                }
                Err(err) => return Err(err),
            },
            Expr::Function(function, argument) => self.function(*function, argument)?,
        };
        limits.check(&rf)?;
        Ok(rf)
    }

    fn function(
        &mut self,
        function: Function,
        argument: &Expr,
    ) -> SymbolicResult<RationalFunction> {
        let reason = format!("{}() is outside the rational-function class", function.name());
        if self.atoms.is_none() {
            return Err(SymbolicError::Unsupported(reason));
        }
        let argument = self.convert(argument)?;
        match function {
            Function::Exp if argument.is_polynomial() => {
                let mut acc = RationalFunction::constant(Rational::one());
                for (monomial, coefficient) in argument.numer().terms() {
                    let term = Poly::from_term(monomial.clone(), coefficient.abs()).to_expr();
                    let atom = self.intern(Expr::apply(Function::Exp, term), &reason)?;
                    acc = if coefficient.is_negative() {
                        acc.div(&atom)?
                    } else {
                        acc.mul(&atom)?
                    };
                }
                Ok(acc)
            }
            Function::Log if argument.as_constant().map_or(false, |c| c.is_one()) => {
                Ok(RationalFunction::zero())
            }
            _ => self.intern(Expr::apply(function, argument.to_expr()), &reason),
        }
    }

    fn intern(&mut self, expr: Expr, reason: &str) -> SymbolicResult<RationalFunction> {
        let atoms = self
            .atoms
            .as_deref_mut()
            .ok_or_else(|| SymbolicError::Unsupported(reason.to_string()))?;
        let expr = atoms.restore(&expr);
        Ok(RationalFunction::var(&atoms.intern(expr)))
    }
}

const MAX_EXPONENT: u64 = 1024;

fn constant_power(value: &Rational, n: i64) -> SymbolicResult<RationalFunction> {
    if value.is_zero() && n < 0 {
        return Err(SymbolicError::DivisionByZero);
    }
    i32::try_from(n)
        .ok()
        .and_then(|n| value.pow(n))
        .map(RationalFunction::constant)
        .ok_or_else(|| SymbolicError::BudgetExceeded(format!("power {} of {}", n, value)))
}

fn integer_exponent(exponent: &Expr) -> SymbolicResult<i64> {
    let value = exponent.as_exact_number().ok_or_else(|| {
        SymbolicError::Unsupported(format!("symbolic exponent {}", exponent))
    })?;
    value.to_i64().ok_or_else(|| {
        SymbolicError::Unsupported(format!("non-integer exponent {}", value))
    })
}

/// Canonical form of `expr`. Transcendental subterms are kept with their
/// arguments simplified, and cancel like any other factor.
pub fn simplify(expr: &Expr, limits: &DerivationLimits) -> SymbolicResult<Expr> {
    let mut atoms = Atoms::new();
    let rf = to_rational_with_atoms(expr, limits, &mut atoms)?;
    Ok(atoms.restore(&rf.to_expr()))
}

/// Definite integral of `integrand` with respect to `var` from `lower` to
/// `upper`. Either bound may be symbolic.
pub fn integrate(
    integrand: &Expr,
    var: &str,
    lower: &Expr,
    upper: &Expr,
    limits: &DerivationLimits,
) -> SymbolicResult<Expr> {
    match to_rational(integrand, limits) {
        Ok(rf) => integrate_rational(&rf, var, lower, upper, limits),
        Err(SymbolicError::Unsupported(_)) => {
            let mut atoms = Atoms::new();
            let rf = to_rational_with_atoms(integrand, limits, &mut atoms)?;
            let result = integrate_with_atoms(&rf, var, lower, upper, limits, &mut atoms)
                .map_err(|err| match err {
                    SymbolicError::Unsupported(reason) => SymbolicError::Unsupported(format!(
                        "cannot integrate {} with respect to {}: {}",
                        integrand, var, reason
                    )),
                    SymbolicError::Divergent(_) => SymbolicError::Divergent(format!(
                        "{} is singular at {} = 0 inside the integration range",
                        integrand, var
                    )),
                    other => other,
                })?;
            Ok(atoms.restore(&result))
        }
        Err(err) => Err(err),
    }
}

fn integrate_with_atoms(
    rf: &RationalFunction,
    var: &str,
    lower: &Expr,
    upper: &Expr,
    limits: &DerivationLimits,
    atoms: &mut Atoms,
) -> SymbolicResult<Expr> {
    let dependent = atoms.depending_on(rf, var);
    match dependent.as_slice() {
        [] => integrate_rational(rf, var, lower, upper, limits),
        [atom] => integrate_exponential(rf, var, atom, lower, upper, limits, atoms),
        _ => Err(SymbolicError::Unsupported(format!(
            "{} transcendental subterms depend on {}",
            dependent.len(),
            var
        ))),
    }
}

/// Integrand of the form `sum_n c_n * E^n / q` with `E = exp(r*var)` and
/// `c_n`, `q`, `r` free of `var`. The `E^0` part may be any rational
/// function of `var`.
fn integrate_exponential(
    rf: &RationalFunction,
    var: &str,
    atom: &str,
    lower: &Expr,
    upper: &Expr,
    limits: &DerivationLimits,
    atoms: &mut Atoms,
) -> SymbolicResult<Expr> {
    let rate = exponential_rate(atom, var, limits, atoms)?;

    let mut denom_parts = rf.denom().collect_in(atom).into_iter();
    let (k, q) = match (denom_parts.next(), denom_parts.next()) {
        (Some(part), None) => part,
        _ => {
            return Err(SymbolicError::Unsupported(format!(
                "denominator mixes {} with other terms",
                atoms.restore(&Expr::symbol(atom))
            )))
        }
    };
    let q = RationalFunction::from_poly(q);
    if atoms.involves(&q, var) {
        return Err(SymbolicError::Unsupported(format!(
            "denominator depends on {}",
            var
        )));
    }

    let mut rational_part = RationalFunction::zero();
    let mut pieces = Vec::new();
    for (j, coefficient) in rf.numer().collect_in(atom) {
        let coefficient = RationalFunction::from_poly(coefficient).div(&q)?;
        let n = i64::from(j) - i64::from(k);
        if n == 0 {
            rational_part = rational_part.add(&coefficient)?;
            continue;
        }
        if atoms.involves(&coefficient, var) {
            return Err(SymbolicError::Unsupported(format!(
                "product of {} and a function of {}",
                atoms.restore(&Expr::symbol(atom)),
                var
            )));
        }
        // exp(n*r*v) / (n*r) between the bounds.
        let n_rate = RationalFunction::constant(Rational::from_integer(n)).mul(&rate)?;
        let at = |bound: &Expr| {
            Expr::apply(Function::Exp, Expr::times(vec![n_rate.to_expr(), bound.clone()]))
        };
        let scale = coefficient.div(&n_rate)?;
        trace!("exponential term in {}: {} * {}", var, scale.to_expr(), at(&Expr::symbol(var)));
        pieces.push(Expr::times(vec![scale.to_expr(), Expr::sub(at(upper), at(lower))]));
    }
    if !rational_part.is_zero() {
        pieces.insert(0, integrate_rational(&rational_part, var, lower, upper, limits)?);
    }
    Ok(Expr::plus(pieces))
}

/// `r` for an atom standing for `exp(r*var)` with `r` free of `var`.
fn exponential_rate(
    atom: &str,
    var: &str,
    limits: &DerivationLimits,
    atoms: &mut Atoms,
) -> SymbolicResult<RationalFunction> {
    let argument = match atoms.get(atom) {
        Some(Expr::Function(Function::Exp, argument)) => (**argument).clone(),
        Some(other) => {
            return Err(SymbolicError::Unsupported(format!(
                "no antiderivative for {}",
                other
            )))
        }
        None => return Err(SymbolicError::UnboundSymbol(atom.to_string())),
    };
    let exponent = to_rational_with_atoms(&argument, limits, atoms)?;
    let not_linear = || {
        SymbolicError::Unsupported(format!("exponent {} is not linear in {}", argument, var))
    };
    if !exponent.is_polynomial() {
        return Err(not_linear());
    }
    let mut parts = exponent.numer().collect_in(var).into_iter();
    match (parts.next(), parts.next()) {
        (Some((1, rate)), None) => {
            let rate = RationalFunction::from_poly(rate);
            if atoms.involves(&rate, var) {
                return Err(not_linear());
            }
            Ok(rate)
        }
        _ => Err(not_linear()),
    }
}

fn integrate_rational(
    rf: &RationalFunction,
    var: &str,
    lower: &Expr,
    upper: &Expr,
    limits: &DerivationLimits,
) -> SymbolicResult<Expr> {
    // The denominator must be var^k * q with q free of var.
    let denom_parts = rf.denom().collect_in(var);
    if denom_parts.len() != 1 {
        return Err(SymbolicError::Unsupported(format!(
            "cannot integrate {} with respect to {}",
            rf.to_expr(),
            var
        )));
    }
    let (k, q) = match denom_parts.into_iter().next() {
        Some(part) => part,
        None => return Err(SymbolicError::DivisionByZero),
    };
    let q = RationalFunction::from_poly(q);
    let k = i64::from(k);

    let lower_rf = to_rational(lower, limits)?;
    let upper_rf = to_rational(upper, limits)?;
    if k > 0 {
        check_singularity(rf, var, &lower_rf, &upper_rf)?;
    }

    let x = RationalFunction::var(var);
    let mut antiderivative = RationalFunction::zero();
    let mut log_coefficient = RationalFunction::zero();
    for (i, coefficient) in rf.numer().collect_in(var) {
        let coefficient = RationalFunction::from_poly(coefficient);
        let e = i64::from(i) - k + 1;
        if e == 0 {
            log_coefficient = log_coefficient.add(&coefficient)?;
            continue;
        }
        let scale =
            RationalFunction::constant(Rational::from_integer(e).recip().unwrap_or_default());
        let term = coefficient.mul(&x.pow(e)?)?.mul(&scale)?;
        antiderivative = antiderivative.add(&term)?;
        limits.check(&antiderivative)?;
    }
    let antiderivative = antiderivative.div(&q)?;
    trace!("antiderivative of {} in {}: {}", rf.to_expr(), var, antiderivative.to_expr());

    let definite = antiderivative
        .substitute(var, &upper_rf)?
        .sub(&antiderivative.substitute(var, &lower_rf)?)?;
    limits.check(&definite)?;

    if log_coefficient.is_zero() {
        return Ok(definite.to_expr());
    }
    let log_coefficient = log_coefficient.div(&q)?;
    // Both bounds lie on the same side of the singularity, so the ratio is
    // positive wherever the bounds are defined.
    let ratio = upper_rf.div(&lower_rf)?;
    let log_term = Expr::times(vec![
        log_coefficient.to_expr(),
        Expr::apply(Function::Log, ratio.to_expr()),
    ]);
    if definite.is_zero() {
        Ok(log_term)
    } else {
        Ok(Expr::plus(vec![definite.to_expr(), log_term]))
    }
}

fn check_singularity(
    rf: &RationalFunction,
    var: &str,
    lower: &RationalFunction,
    upper: &RationalFunction,
) -> SymbolicResult<()> {
    let divergent = || {
        SymbolicError::Divergent(format!(
            "{} is singular at {} = 0 inside the integration range",
            rf.to_expr(),
            var
        ))
    };
    match (lower.as_constant(), upper.as_constant()) {
        (Some(a), Some(b)) => {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if !lo.is_negative() && !lo.is_zero() || hi.is_negative() {
                Ok(())
            } else {
                Err(divergent())
            }
        }
        (Some(a), None) | (None, Some(a)) if a.is_zero() => Err(divergent()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::eval::evaluate;
    use crate::symbolic::parser::parse;
    use crate::symbolic::Bindings;
    use pretty_assertions::assert_eq;

    fn limits() -> DerivationLimits {
        DerivationLimits::default()
    }

    fn p(text: &str) -> Expr {
        parse(text, &["x", "y", "u"]).unwrap()
    }

    fn num(text: &str) -> Expr {
        Expr::Number(Rational::from_decimal_str(text).unwrap())
    }

    #[test]
    fn test_simplify_expands_and_cancels() {
        assert_eq!(
            simplify(&p("(2*x+3*y+2)/28"), &limits()).unwrap().to_string(),
            "x/14 + 3*y/28 + 1/14"
        );
        assert_eq!(simplify(&p("(x^2 - 1)/(x - 1)"), &limits()).unwrap().to_string(), "x + 1");
        assert_eq!(simplify(&p("x - x"), &limits()).unwrap().to_string(), "0");
    }

    #[test]
    fn test_simplify_keeps_transcendental_parts() {
        let s = simplify(&p("exp(2*x/2) + 0*y"), &limits()).unwrap();
        assert_eq!(s.to_string(), "exp(x)");
        let s = simplify(&p("2*log(y)*3"), &limits()).unwrap();
        assert_eq!(s.to_string(), "6*log(y)");
    }

    #[test]
    fn test_marginal_of_linear_density() {
        let joint = p("(2*x+3*y+2)/28");
        let fy = integrate(&joint, "x", &num("0"), &num("2"), &limits()).unwrap();
        assert_eq!(fy.to_string(), "3*y/14 + 2/7");
        let fx = integrate(&joint, "y", &num("0"), &num("2"), &limits()).unwrap();
        assert_eq!(fx.to_string(), "x/7 + 5/14");
    }

    #[test]
    fn test_integral_with_symbolic_upper_limit() {
        let cdf = integrate(&p("5*x/2"), "x", &num("0.1"), &Expr::symbol("x"), &limits()).unwrap();
        assert_eq!(cdf.to_string(), "5*x**2/4 - 1/80");
    }

    #[test]
    fn test_reciprocal_integrates_to_log() {
        let r = integrate(&p("1/x"), "x", &num("1"), &Expr::symbol("x"), &limits()).unwrap();
        assert_eq!(r.to_string(), "log(x)");
        let r = integrate(&p("y/x"), "x", &num("0"), &num("1"), &limits());
        assert!(matches!(r, Err(SymbolicError::Divergent(_))));
    }

    #[test]
    fn test_unsupported_integrands() {
        for integrand in ["exp(x^2)", "x*exp(x)", "1/(x + y)", "sin(x)"] {
            let r = integrate(&p(integrand), "x", &num("0"), &num("1"), &limits());
            assert!(matches!(r, Err(SymbolicError::Unsupported(_))), "{}: {:?}", integrand, r);
        }
    }

    #[test]
    fn test_exponential_of_linear_exponent() {
        let at = |expr: &Expr, x: f64| evaluate(expr, &Bindings::new().bind("x", x)).unwrap();
        let expected = (-0.5f64).exp() * (1.0 - (-1.0f64).exp());
        for joint in ["exp(-x)*exp(-y)", "exp(-x-y)"] {
            let fx = integrate(&p(joint), "y", &num("0"), &num("1"), &limits()).unwrap();
            assert!((at(&fx, 0.5) - expected).abs() < 1e-12, "{}: {}", joint, fx);
        }

        let cdf =
            integrate(&p("2*exp(2*x)"), "x", &num("0"), &Expr::symbol("x"), &limits()).unwrap();
        assert!((at(&cdf, 0.3) - (0.6f64.exp() - 1.0)).abs() < 1e-12);
        let mixed = integrate(&p("x + exp(x*y)"), "x", &num("0"), &num("1"), &limits()).unwrap();
        let value = evaluate(&mixed, &Bindings::new().bind("y", 2.0)).unwrap();
        assert!((value - (0.5 + (2f64.exp() - 1.0) / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_simplify_cancels_transcendental_factors() {
        assert_eq!(simplify(&p("exp(-x-y)/exp(-y)"), &limits()).unwrap().to_string(), "1/exp(x)");
        assert_eq!(simplify(&p("x*log(2)/log(2)"), &limits()).unwrap().to_string(), "x");
        assert_eq!(simplify(&p("exp(0*x) + log(1)"), &limits()).unwrap().to_string(), "1");
    }

    #[test]
    fn test_strict_conversion_rejects_functions() {
        assert!(matches!(
            to_rational(&p("log(2)*x"), &limits()),
            Err(SymbolicError::Unsupported(_))
        ));
        let mut atoms = Atoms::new();
        let rf = to_rational_with_atoms(&p("log(2)*x"), &limits(), &mut atoms).unwrap();
        assert_eq!(atoms.depending_on(&rf, "x"), Vec::<String>::new());
        assert!(atoms.involves(&rf, "x"));
        assert_eq!(atoms.restore(&rf.to_expr()).to_string(), "x*log(2)");
    }

    #[test]
    fn test_free_transcendental_factor_is_pulled_out() {
        let r = integrate(&p("exp(y)*x"), "x", &num("0"), &num("2"), &limits()).unwrap();
        assert_eq!(r.to_string(), "2*exp(y)");
    }

    #[test]
    fn test_degree_budget() {
        let r = to_rational(&p("(x + y)^40"), &limits());
        assert!(matches!(r, Err(SymbolicError::BudgetExceeded(_))));
    }

    #[test]
    fn test_constant_powers_are_bounded() {
        let r = to_rational(&p("((1e400)^1024)^1024"), &limits());
        assert!(matches!(r, Err(SymbolicError::BudgetExceeded(_))), "{:?}", r);
        let r = to_rational(&p("0^(-1)"), &limits());
        assert_eq!(r, Err(SymbolicError::DivisionByZero));
        let r = to_rational(&p("(2/3)^(-2)"), &limits()).unwrap();
        assert_eq!(r.as_constant(), Rational::from_decimal_str("2.25"));
    }
}
