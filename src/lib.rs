//! Analytic bivariate Gibbs sampling.
//!
//! A joint density `f(x, y)` given as text is parsed, integrated into its
//! marginals and conditional CDFs, and those CDFs are inverted in closed form
//! so the Gibbs chain can draw each coordinate by inverse-transform sampling.

pub mod config;
pub mod error;
pub mod gibbs;
pub mod server;
pub mod symbolic;

pub use config::Config;
pub use error::{Error, Result};
pub use gibbs::{Bounds, DensitySpec};
pub use symbolic::{Engine, SymbolicEngine};
