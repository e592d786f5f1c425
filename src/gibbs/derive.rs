//! Marginals, conditionals and inverse conditional CDFs of a joint density.
//!
//! [`derive`] runs the whole pipeline once and records every problem it finds
//! as a [`Diagnostic`]. Validation only reads the diagnostics; sampling also
//! takes the [`ConditionalModel`] and picks one inverse branch per axis.

use super::{Bounds, DensitySpec, SamplingError, ALLOWED_VARIABLES, U, X, Y};
use crate::symbolic::{Bindings, Equation, SymbolicEngine, SymbolicResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Problem classes reported by the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    ParseFailure,
    DisallowedSymbol,
    NonNegativityViolation,
    DegenerateMarginal,
    NoAnalyticInverse,
    DerivationFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Every symbolic intermediate of a successful derivation.
///
/// `inverse_candidates_x` are the roots of `u = F(x | y)` in `x` (functions of
/// `y` and `u`); `inverse_candidates_y` likewise for `y`.
#[derive(Debug, Clone)]
pub struct ConditionalModel<T> {
    pub joint: T,
    pub marginal_x: T,
    pub marginal_y: T,
    pub conditional_x: T,
    pub conditional_y: T,
    pub cdf_x: T,
    pub cdf_y: T,
    pub inverse_candidates_x: Vec<T>,
    pub inverse_candidates_y: Vec<T>,
    pub x_bounds: Bounds,
    pub y_bounds: Bounds,
}

/// The inverse CDFs chosen for sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct InversePair<T> {
    pub x: T,
    pub y: T,
}

impl<T: Clone + fmt::Display> ConditionalModel<T> {
    /// Pick one inverse per axis: the first candidate that, evaluated at the
    /// other axis' midpoint with `u = 0.5`, lands inside its own bounds.
    ///
    /// This single-point check is a heuristic. A correct branch can fail it
    /// near a boundary and a wrong one can pass by coincidence.
    pub fn select_inverses<E>(&self, engine: &E) -> Result<InversePair<T>, SamplingError>
    where
        E: SymbolicEngine<Term = T> + ?Sized,
    {
        let inverse_x = check_branch(
            engine,
            &self.inverse_candidates_x,
            Bindings::new().bind(Y, self.y_bounds.midpoint()).bind(U, 0.5),
            &self.x_bounds,
        );
        let inverse_y = check_branch(
            engine,
            &self.inverse_candidates_y,
            Bindings::new().bind(X, self.x_bounds.midpoint()).bind(U, 0.5),
            &self.y_bounds,
        );

        match (inverse_x, inverse_y) {
            (Some(x), Some(y)) => {
                debug!("Using inverse x = {}", x);
                debug!("Using inverse y = {}", y);
                Ok(InversePair { x, y })
            }
            (x, y) => Err(SamplingError::NoValidInverse {
                inverse_x: describe(x.as_ref()),
                inverse_y: describe(y.as_ref()),
            }),
        }
    }
}

fn check_branch<E>(
    engine: &E,
    candidates: &[E::Term],
    bindings: Bindings,
    bounds: &Bounds,
) -> Option<E::Term>
where
    E: SymbolicEngine + ?Sized,
{
    candidates
        .iter()
        .find(|candidate| match engine.evaluate_at(candidate, &bindings) {
            Ok(value) => bounds.contains(value),
            Err(err) => {
                debug!("Inverse candidate {} rejected: {}", candidate, err);
                false
            }
        })
        .cloned()
}

fn describe<T: fmt::Display>(term: Option<&T>) -> String {
    term.map_or_else(|| "None".to_string(), |t| t.to_string())
}

/// Result of running the derivation pipeline over a [`DensitySpec`].
#[derive(Debug, Clone)]
pub struct Derivation<T> {
    /// Canonical text of the parsed expression, absent on parse failure.
    pub normalized_expression: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when no diagnostic was raised.
    pub model: Option<ConditionalModel<T>>,
}

impl<T> Derivation<T> {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}

/// Run parsing, the symbol and sign checks, marginals, conditionals, CDFs
/// and inversion for `spec`.
///
/// Never fails: every problem becomes a diagnostic, in the order the checks
/// run. Parse failures and failures while integrating the marginals end the
/// pipeline early; the remaining checks accumulate.
pub fn derive<E>(engine: &E, spec: &DensitySpec) -> Derivation<E::Term>
where
    E: SymbolicEngine + ?Sized,
{
    let mut diagnostics = Vec::new();

    let joint = match engine.parse(&spec.expression, &ALLOWED_VARIABLES) {
        Ok(joint) => joint,
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ParseFailure,
                format!("Error parsing expression: {}", err),
            ));
            return Derivation {
                normalized_expression: None,
                diagnostics,
                model: None,
            };
        }
    };
    let normalized_expression = Some(
        engine
            .simplify(&joint)
            .map_or_else(|_| joint.to_string(), |canonical| canonical.to_string()),
    );
    debug!("Parsed expression: {}", joint);

    let disallowed: Vec<String> = engine
        .free_symbols(&joint)
        .into_iter()
        .filter(|name| !ALLOWED_VARIABLES.contains(&name.as_str()))
        .map(|name| format!("'{}'", name))
        .collect();
    if !disallowed.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DisallowedSymbol,
            format!("Disallowed symbols: [{}]", disallowed.join(", ")),
        ));
    }

    if let Some(violation) = check_non_negativity(engine, &joint, &spec.x_bounds, &spec.y_bounds) {
        diagnostics.push(violation);
    }

    let (marginal_x, marginal_y) = match marginals(engine, &joint, spec) {
        Ok(pair) => pair,
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DerivationFailure,
                format!("Error computing marginals: {}", err),
            ));
            return Derivation {
                normalized_expression,
                diagnostics,
                model: None,
            };
        }
    };
    debug!("Marginal f_X(x) = {}", marginal_x);
    debug!("Marginal f_Y(y) = {}", marginal_y);

    if engine.is_zero(&marginal_x) || engine.is_zero(&marginal_y) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DegenerateMarginal,
            "One of the marginal distributions is zero",
        ));
    }
    if !depends_only_on(engine, &marginal_x, X) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DegenerateMarginal,
            "Error in marginal f_X(x): contains incorrect symbols",
        ));
    }
    if !depends_only_on(engine, &marginal_y, Y) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DegenerateMarginal,
            "Error in marginal f_Y(y): contains incorrect symbols",
        ));
    }

    let inverse = match conditionals(engine, &joint, &marginal_x, &marginal_y, spec) {
        Ok(inverse) => inverse,
        Err(err) => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DerivationFailure,
                format!("Error in conditional distributions: {}", err),
            ));
            return Derivation {
                normalized_expression,
                diagnostics,
                model: None,
            };
        }
    };

    if inverse.candidates_x.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoAnalyticInverse,
            "Cannot invert F(x|y): no analytic solution",
        ));
    }
    if inverse.candidates_y.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoAnalyticInverse,
            "Cannot invert F(y|x): no analytic solution",
        ));
    }
    if !has_real_candidate(engine, &inverse.candidates_x) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoAnalyticInverse,
            "No valid real solutions for x",
        ));
    }
    if !has_real_candidate(engine, &inverse.candidates_y) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::NoAnalyticInverse,
            "No valid real solutions for y",
        ));
    }

    let model = if diagnostics.is_empty() {
        Some(ConditionalModel {
            joint,
            marginal_x,
            marginal_y,
            conditional_x: inverse.conditional_x,
            conditional_y: inverse.conditional_y,
            cdf_x: inverse.cdf_x,
            cdf_y: inverse.cdf_y,
            inverse_candidates_x: inverse.candidates_x,
            inverse_candidates_y: inverse.candidates_y,
            x_bounds: spec.x_bounds,
            y_bounds: spec.y_bounds,
        })
    } else {
        None
    };

    Derivation {
        normalized_expression,
        diagnostics,
        model,
    }
}

/// The four corners and the centre, in the order they are checked.
fn sign_check_points(x_bounds: &Bounds, y_bounds: &Bounds) -> [(f64, f64); 5] {
    [
        (x_bounds.min, y_bounds.min),
        (x_bounds.max, y_bounds.max),
        (x_bounds.midpoint(), y_bounds.midpoint()),
        (x_bounds.min, y_bounds.max),
        (x_bounds.max, y_bounds.min),
    ]
}

/// Evaluate the joint density at the five sign-check points and report the first
/// negative value or evaluation error. Not a proof of non-negativity.
fn check_non_negativity<E>(
    engine: &E,
    joint: &E::Term,
    x_bounds: &Bounds,
    y_bounds: &Bounds,
) -> Option<Diagnostic>
where
    E: SymbolicEngine + ?Sized,
{
    sign_check_points(x_bounds, y_bounds).iter().find_map(|&(px, py)| {
        match engine.evaluate_at(joint, &Bindings::new().bind(X, px).bind(Y, py)) {
            Ok(value) if value < 0.0 => Some(Diagnostic::new(
                DiagnosticKind::NonNegativityViolation,
                format!("Function is negative at ({:?}, {:?}): {:?}", px, py, value),
            )),
            Ok(_) => None,
            Err(err) => Some(Diagnostic::new(
                DiagnosticKind::NonNegativityViolation,
                format!("Error evaluating function at ({:?}, {:?}): {}", px, py, err),
            )),
        }
    })
}

/// `(f_X(x), f_Y(y))`: the joint integrated over `y`, then over `x`.
fn marginals<E>(
    engine: &E,
    joint: &E::Term,
    spec: &DensitySpec,
) -> SymbolicResult<(E::Term, E::Term)>
where
    E: SymbolicEngine + ?Sized,
{
    let marginal_x = engine.integrate(
        joint,
        Y,
        &engine.number(spec.y_bounds.min)?,
        &engine.number(spec.y_bounds.max)?,
    )?;
    let marginal_y = engine.integrate(
        joint,
        X,
        &engine.number(spec.x_bounds.min)?,
        &engine.number(spec.x_bounds.max)?,
    )?;
    Ok((marginal_x, marginal_y))
}

/// A constant, or a function of `var` alone.
fn depends_only_on<E>(engine: &E, term: &E::Term, var: &str) -> bool
where
    E: SymbolicEngine + ?Sized,
{
    let symbols = engine.free_symbols(term);
    symbols.is_empty() || (symbols.len() == 1 && symbols.contains(var))
}

fn has_real_candidate<E>(engine: &E, candidates: &[E::Term]) -> bool
where
    E: SymbolicEngine + ?Sized,
{
    candidates
        .iter()
        .any(|candidate| engine.is_definitely_real(candidate) != Some(false))
}

struct Inversion<T> {
    conditional_x: T,
    conditional_y: T,
    cdf_x: T,
    cdf_y: T,
    candidates_x: Vec<T>,
    candidates_y: Vec<T>,
}

fn conditionals<E>(
    engine: &E,
    joint: &E::Term,
    marginal_x: &E::Term,
    marginal_y: &E::Term,
    spec: &DensitySpec,
) -> SymbolicResult<Inversion<E::Term>>
where
    E: SymbolicEngine + ?Sized,
{
    let conditional_x = engine.simplify(&engine.quotient(joint, marginal_y))?;
    let conditional_y = engine.simplify(&engine.quotient(joint, marginal_x))?;
    debug!("f(x|y) = {}", conditional_x);
    debug!("f(y|x) = {}", conditional_y);

    let cdf_x = engine.integrate(
        &conditional_x,
        X,
        &engine.number(spec.x_bounds.min)?,
        &engine.symbol(X),
    )?;
    let cdf_y = engine.integrate(
        &conditional_y,
        Y,
        &engine.number(spec.y_bounds.min)?,
        &engine.symbol(Y),
    )?;
    debug!("F(x|y) = {}", cdf_x);
    debug!("F(y|x) = {}", cdf_y);

    let candidates_x = engine.solve(&Equation::new(engine.symbol(U), cdf_x.clone()), X)?;
    let candidates_y = engine.solve(&Equation::new(engine.symbol(U), cdf_y.clone()), Y)?;
    debug!("Solutions for x: {:?}", candidates_x);
    debug!("Solutions for y: {:?}", candidates_y);

    Ok(Inversion {
        conditional_x,
        conditional_y,
        cdf_x,
        cdf_y,
        candidates_x,
        candidates_y,
    })
}
