//! Inverse-transform Gibbs chain.

use super::derive::{ConditionalModel, InversePair};
use super::stats::SampleStatistics;
use super::{Bounds, SamplingError, U, X, Y};
use crate::symbolic::{Bindings, SymbolicEngine, SymbolicError};
use log::{debug, info, warn};
use rand::Rng;
use std::time::Instant;

/// Samples kept after burn-in, plus how many steps repeated their
/// predecessor because an inverse could not be evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTrace {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub held_steps: usize,
}

impl SampleTrace {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn push(&mut self, x: f64, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }
}

/// What a single Gibbs step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Both coordinates were redrawn and clipped into bounds.
    Advanced { x: f64, y: f64 },
    /// An inverse failed to evaluate; the chain stays where it was.
    Held(SymbolicError),
}

pub struct GibbsSampler<'e, E: SymbolicEngine + ?Sized> {
    engine: &'e E,
    inverse_x: E::Term,
    inverse_y: E::Term,
    x_bounds: Bounds,
    y_bounds: Bounds,
}

impl<'e, E: SymbolicEngine + ?Sized> GibbsSampler<'e, E> {
    /// Build a sampler from a derived model, choosing one inverse per axis.
    pub fn new(engine: &'e E, model: &ConditionalModel<E::Term>) -> Result<Self, SamplingError> {
        let InversePair { x, y } = model.select_inverses(engine)?;
        Ok(Self::from_inverses(engine, x, y, model.x_bounds, model.y_bounds))
    }

    /// `inverse_x` is a function of `y` and `u`; `inverse_y` of `x` and `u`.
    pub fn from_inverses(
        engine: &'e E,
        inverse_x: E::Term,
        inverse_y: E::Term,
        x_bounds: Bounds,
        y_bounds: Bounds,
    ) -> Self {
        GibbsSampler {
            engine,
            inverse_x,
            inverse_y,
            x_bounds,
            y_bounds,
        }
    }

    /// Draw `x | y`, then `y | x` using the new `x`.
    pub fn step<R: Rng + ?Sized>(&self, current_y: f64, rng: &mut R) -> StepOutcome {
        let u1: f64 = rng.gen();
        let new_x = match self
            .engine
            .evaluate_at(&self.inverse_x, &Bindings::new().bind(Y, current_y).bind(U, u1))
        {
            Ok(value) => value,
            Err(err) => return StepOutcome::Held(err),
        };

        let u2: f64 = rng.gen();
        let new_y = match self
            .engine
            .evaluate_at(&self.inverse_y, &Bindings::new().bind(X, new_x).bind(U, u2))
        {
            Ok(value) => value,
            Err(err) => return StepOutcome::Held(err),
        };

        StepOutcome::Advanced {
            x: self.x_bounds.clip(new_x),
            y: self.y_bounds.clip(new_y),
        }
    }

    /// Run `n_samples + burn_in` states starting at `start` (clipped into the
    /// bounds) and return the last `n_samples`.
    pub fn run<R: Rng + ?Sized>(
        &self,
        start: (f64, f64),
        n_samples: usize,
        burn_in: usize,
        rng: &mut R,
    ) -> SampleTrace {
        let total = n_samples + burn_in;
        let mut trace = SampleTrace {
            x: Vec::with_capacity(total),
            y: Vec::with_capacity(total),
            held_steps: 0,
        };
        if total == 0 {
            return trace;
        }

        let mut current_x = self.x_bounds.clip(start.0);
        let mut current_y = self.y_bounds.clip(start.1);
        trace.push(current_x, current_y);

        for i in 1..total {
            match self.step(current_y, rng) {
                StepOutcome::Advanced { x, y } => {
                    current_x = x;
                    current_y = y;
                }
                StepOutcome::Held(err) => {
                    debug!("Step {} held at ({}, {}): {}", i, current_x, current_y, err);
                    trace.held_steps += 1;
                }
            }
            trace.push(current_x, current_y);
        }

        if trace.held_steps > 0 {
            warn!(
                "{} of {} Gibbs steps repeated the previous state",
                trace.held_steps,
                total - 1
            );
        }

        let discard = burn_in.min(trace.len());
        trace.x.drain(..discard);
        trace.y.drain(..discard);
        trace
    }
}

/// Select inverses for `model`, run the chain from `(x0, y0)` and summarize
/// it. `execution_time` covers branch selection and sampling.
pub fn sample<E, R>(
    engine: &E,
    model: &ConditionalModel<E::Term>,
    start: (f64, f64),
    n_samples: usize,
    burn_in: usize,
    rng: &mut R,
) -> Result<(SampleTrace, SampleStatistics), SamplingError>
where
    E: SymbolicEngine + ?Sized,
    R: Rng + ?Sized,
{
    let started = Instant::now();
    let sampler = GibbsSampler::new(engine, model)?;
    let trace = sampler.run(start, n_samples, burn_in, rng);
    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "Sampled {} points ({} burn-in) in {:.3}s",
        trace.len(),
        burn_in,
        elapsed
    );
    let statistics = SampleStatistics::from_trace(&trace, elapsed);
    Ok((trace, statistics))
}
