//! Symbolic algebra used by the density derivations.
//!
//! The rest of the crate only talks to [`SymbolicEngine`]. The bundled
//! [`Engine`] works over exact rational functions in any number of symbols,
//! with `exp`/`log` subterms carried as opaque symbols. It integrates
//! rational functions (including the `1/v` → `log` case) and `exp` of
//! exponents linear in the variable. It solves polynomial equations up to
//! degree two, pure binomials, and equations whose unknown sits inside one
//! `exp` or `log`.

pub mod calculus;
pub mod eval;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod poly;
pub mod rational;
pub mod solve;

pub use expr::{Bindings, Constant, Expr, Function};
pub use rational::Rational;

use poly::RationalFunction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub type SymbolicResult<T> = std::result::Result<T, SymbolicError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolicError {
    #[error("Parse error: {message} at position {position}")]
    Parse { message: String, position: usize },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Result is not a finite real number")]
    NonFinite,

    #[error("Divergent integral: {0}")]
    Divergent(String),

    #[error("Derivation budget exceeded: {0}")]
    BudgetExceeded(String),
}

/// Caps on the size of every polynomial the engine builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationLimits {
    pub max_degree: u32,
    pub max_terms: usize,
}

impl Default for DerivationLimits {
    fn default() -> Self {
        DerivationLimits {
            max_degree: 12,
            max_terms: 256,
        }
    }
}

impl DerivationLimits {
    pub fn check(&self, rf: &RationalFunction) -> SymbolicResult<()> {
        let degree = rf.total_degree();
        if degree > self.max_degree {
            return Err(SymbolicError::BudgetExceeded(format!(
                "degree {} exceeds the limit of {}",
                degree, self.max_degree
            )));
        }
        let terms = rf.term_count();
        if terms > self.max_terms {
            return Err(SymbolicError::BudgetExceeded(format!(
                "{} terms exceed the limit of {}",
                terms, self.max_terms
            )));
        }
        Ok(())
    }
}

/// `lhs = rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Equation<T> {
    pub lhs: T,
    pub rhs: T,
}

impl<T> Equation<T> {
    pub fn new(lhs: T, rhs: T) -> Self {
        Equation { lhs, rhs }
    }
}

/// The algebra capability the derivation pipeline needs.
pub trait SymbolicEngine: Send + Sync {
    type Term: Clone + fmt::Display + fmt::Debug + Send + Sync;

    /// Parse `text`, treating `allowed` as the variable names.
    fn parse(&self, text: &str, allowed: &[&str]) -> SymbolicResult<Self::Term>;

    /// Definite integral over `var` from `lower` to `upper`.
    fn integrate(
        &self,
        term: &Self::Term,
        var: &str,
        lower: &Self::Term,
        upper: &Self::Term,
    ) -> SymbolicResult<Self::Term>;

    fn simplify(&self, term: &Self::Term) -> SymbolicResult<Self::Term>;

    /// All roots of `equation` in `var`, in a deterministic order.
    fn solve(&self, equation: &Equation<Self::Term>, var: &str) -> SymbolicResult<Vec<Self::Term>>;

    fn substitute(&self, term: &Self::Term, bindings: &Bindings) -> Self::Term;

    fn evaluate_numeric(&self, term: &Self::Term) -> SymbolicResult<f64>;

    /// `Some(true)` if provably real, `Some(false)` if provably complex.
    fn is_definitely_real(&self, term: &Self::Term) -> Option<bool>;

    fn number(&self, value: f64) -> SymbolicResult<Self::Term>;

    fn symbol(&self, name: &str) -> Self::Term;

    fn quotient(&self, numer: &Self::Term, denom: &Self::Term) -> Self::Term;

    fn free_symbols(&self, term: &Self::Term) -> BTreeSet<String>;

    fn is_zero(&self, term: &Self::Term) -> bool;

    /// Substitute and evaluate in one step.
    fn evaluate_at(&self, term: &Self::Term, bindings: &Bindings) -> SymbolicResult<f64> {
        self.evaluate_numeric(&self.substitute(term, bindings))
    }
}

/// The bundled rational-function engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Engine {
    limits: DerivationLimits,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DerivationLimits) -> Self {
        Engine { limits }
    }

    pub fn limits(&self) -> &DerivationLimits {
        &self.limits
    }
}

impl SymbolicEngine for Engine {
    type Term = Expr;

    fn parse(&self, text: &str, allowed: &[&str]) -> SymbolicResult<Expr> {
        parser::parse(text, allowed)
    }

    fn integrate(
        &self,
        term: &Expr,
        var: &str,
        lower: &Expr,
        upper: &Expr,
    ) -> SymbolicResult<Expr> {
        let result = calculus::integrate(term, var, lower, upper, &self.limits)?;
        calculus::simplify(&result, &self.limits)
    }

    fn simplify(&self, term: &Expr) -> SymbolicResult<Expr> {
        calculus::simplify(term, &self.limits)
    }

    fn solve(&self, equation: &Equation<Expr>, var: &str) -> SymbolicResult<Vec<Expr>> {
        solve::solve(equation, var, &self.limits)?
            .iter()
            .map(|root| calculus::simplify(root, &self.limits))
            .collect()
    }

    fn substitute(&self, term: &Expr, bindings: &Bindings) -> Expr {
        term.substitute(bindings)
    }

    fn evaluate_numeric(&self, term: &Expr) -> SymbolicResult<f64> {
        eval::evaluate(term, &Bindings::new())
    }

    fn is_definitely_real(&self, term: &Expr) -> Option<bool> {
        eval::is_definitely_real(term)
    }

    fn number(&self, value: f64) -> SymbolicResult<Expr> {
        Rational::from_f64(value)
            .map(Expr::Number)
            .ok_or(SymbolicError::NonFinite)
    }

    fn symbol(&self, name: &str) -> Expr {
        Expr::symbol(name)
    }

    fn quotient(&self, numer: &Expr, denom: &Expr) -> Expr {
        Expr::div(numer.clone(), denom.clone())
    }

    fn free_symbols(&self, term: &Expr) -> BTreeSet<String> {
        term.free_symbols()
    }

    fn is_zero(&self, term: &Expr) -> bool {
        let mut atoms = calculus::Atoms::new();
        calculus::to_rational_with_atoms(term, &self.limits, &mut atoms)
            .map_or(false, |rf| rf.is_zero())
    }
}
