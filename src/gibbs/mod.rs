//! Analytic Gibbs sampling for bivariate densities.
//!
//! A density `f(x, y)` on a rectangle is turned into two closed-form inverse
//! conditional CDFs (`x = F⁻¹(u | y)` and `y = G⁻¹(u | x)`), which then drive
//! an inverse-transform Gibbs chain.

pub mod derive;
pub mod sampler;
pub mod stats;
pub mod validator;

pub use derive::{derive, ConditionalModel, Derivation, Diagnostic, DiagnosticKind, InversePair};
pub use sampler::{sample, GibbsSampler, SampleTrace, StepOutcome};
pub use stats::{plot_data, HistogramGrid, SampleStatistics};
pub use validator::{validate, ValidationOutcome};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const X: &str = "x";
pub const Y: &str = "y";
/// The uniform variate in the inverse CDFs.
pub const U: &str = "u";

/// Variables a density expression may mention.
pub const ALLOWED_VARIABLES: [&str; 2] = [X, Y];

/// A closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Bounds { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Clamp into the interval. Unlike `f64::clamp` this never panics.
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// A density expression together with its rectangular support.
#[derive(Debug, Clone, PartialEq)]
pub struct DensitySpec {
    pub expression: String,
    pub x_bounds: Bounds,
    pub y_bounds: Bounds,
}

impl DensitySpec {
    pub fn new(expression: impl Into<String>, x_bounds: Bounds, y_bounds: Bounds) -> Self {
        DensitySpec {
            expression: expression.into(),
            x_bounds,
            y_bounds,
        }
    }
}

/// Fatal failures of the sampling path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("No valid inverse functions found. inv_x: {inverse_x}, inv_y: {inverse_y}")]
    NoValidInverse {
        inverse_x: String,
        inverse_y: String,
    },
}
