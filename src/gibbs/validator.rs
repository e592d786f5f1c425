//! Tractability check for a density expression.

use super::derive::{derive, Derivation};
use super::DensitySpec;
use crate::symbolic::SymbolicEngine;
use log::info;
use serde::{Deserialize, Serialize};

/// Wire form of a validation: `errors` in the order the checks ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub normalized_expression: Option<String>,
}

impl ValidationOutcome {
    pub fn from_derivation<T>(derivation: &Derivation<T>) -> Self {
        ValidationOutcome {
            is_valid: derivation.is_valid(),
            errors: derivation.errors(),
            warnings: Vec::new(),
            normalized_expression: derivation.normalized_expression.clone(),
        }
    }

    /// An invalid outcome carrying a single error.
    pub fn failure(message: impl Into<String>) -> Self {
        ValidationOutcome {
            is_valid: false,
            errors: vec![message.into()],
            warnings: Vec::new(),
            normalized_expression: None,
        }
    }
}

/// Validate `spec`. Problems are reported in the outcome, never raised.
pub fn validate<E>(engine: &E, spec: &DensitySpec) -> ValidationOutcome
where
    E: SymbolicEngine + ?Sized,
{
    let outcome = ValidationOutcome::from_derivation(&derive(engine, spec));
    info!(
        "Validated '{}': valid={} ({} errors)",
        spec.expression,
        outcome.is_valid,
        outcome.errors.len()
    );
    outcome
}
