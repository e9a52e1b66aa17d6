//! Bootstrap particle filter.
//!
//! Runs a fixed-size particle population through a `StateSpaceModel` and
//! returns an unbiased estimate of the marginal log-likelihood of the
//! observed series together with a filtered point estimate of the latent
//! state at every time step. The unbiasedness of the likelihood estimate is
//! what makes the estimate usable inside a Metropolis-Hastings acceptance
//! ratio without changing the target distribution.

use itertools::izip;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use thiserror::Error;

use crate::math::logsumexp;
use crate::model::StateSpaceModel;
use crate::resample;

/// Errors reported by a filter pass.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid particle filter configuration: {0}")]
    InvalidConfiguration(String),
    /// Every particle weight vanished. Expected when a parameter proposal
    /// lands somewhere the observations are impossibly unlikely, so callers
    /// treat this as a certainly-rejected proposal rather than a failure.
    #[error("all particle weights vanished at time step {step}")]
    Degenerate { step: usize },
    /// Weight normalization produced non-finite values outside the
    /// vanished-weights case. This points at a broken model density and
    /// aborts the run.
    #[error("non-finite particle weights at time step {step}")]
    NumericInstability { step: usize },
}

impl FilterError {
    /// Recoverable failures reject the current MCMC proposal; everything
    /// else stops sampling.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FilterError::Degenerate { .. })
    }
}

/// Output of one filter pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRun {
    /// Unbiased estimate of the marginal log-likelihood of the observations.
    pub log_likelihood: f64,
    /// Weighted particle mean of the latent state at every time step,
    /// recorded before resampling.
    pub filtered_states: Vec<f64>,
}

/// Bootstrap particle filter with a fixed particle count.
///
/// Every pass consumes the same number of generator draws (one normal per
/// particle for initialization, then one normal per particle plus one
/// uniform per time step), so two passes with equal inputs and equal
/// generator state reproduce each other bit for bit.
#[derive(Debug, Clone, Copy)]
pub struct ParticleFilter {
    num_particles: usize,
}

impl ParticleFilter {
    pub fn new(num_particles: usize) -> Result<Self, FilterError> {
        if num_particles == 0 {
            return Err(FilterError::InvalidConfiguration(
                "particle count must be positive".into(),
            ));
        }
        Ok(ParticleFilter { num_particles })
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    /// Run the filter over `observations` at the given parameter vector.
    ///
    /// Propagates all particles through the model transition, reweights by
    /// the observation log-density using shifted exponentials, and
    /// resamples systematically at every step.
    pub fn run<M, R>(
        &self,
        model: &M,
        params: &[f64],
        observations: &[f64],
        rng: &mut R,
    ) -> Result<FilterRun, FilterError>
    where
        M: StateSpaceModel,
        R: Rng + ?Sized,
    {
        let num = self.num_particles;
        if observations.is_empty() {
            return Err(FilterError::InvalidConfiguration(
                "observation sequence must not be empty".into(),
            ));
        }
        if params.len() != model.param_dim() {
            return Err(FilterError::InvalidConfiguration(format!(
                "model expects {} parameters, got {}",
                model.param_dim(),
                params.len()
            )));
        }

        let mut states = vec![0f64; num];
        let mut resampled = vec![0f64; num];
        let mut noise = vec![0f64; num];
        let mut log_weights = vec![0f64; num];
        let mut weights = vec![0f64; num];
        let mut ancestors = vec![0usize; num];
        let mut filtered_states = Vec::with_capacity(observations.len());

        for eps in noise.iter_mut() {
            *eps = rng.sample(StandardNormal);
        }
        for (state, &eps) in states.iter_mut().zip(&noise) {
            *state = model.initial_state(params, eps);
        }

        let mut log_likelihood = 0f64;

        for (step, &observation) in observations.iter().enumerate() {
            for eps in noise.iter_mut() {
                *eps = rng.sample(StandardNormal);
            }

            // The noise is drawn before the parallel region, so the thread
            // count cannot change the outcome.
            states
                .par_iter_mut()
                .zip(noise.par_iter())
                .zip(log_weights.par_iter_mut())
                .with_min_len(64)
                .for_each(|((state, eps), log_weight)| {
                    *state = model.transition(params, *state, *eps);
                    *log_weight = model.observation_logp(params, *state, observation);
                });

            let log_sum = logsumexp(&log_weights);
            if log_sum == f64::NEG_INFINITY {
                return Err(FilterError::Degenerate { step });
            }
            if !log_sum.is_finite() {
                return Err(FilterError::NumericInstability { step });
            }
            log_likelihood += log_sum - (num as f64).ln();

            // Shifting by the log-sum normalizes the weights in one pass.
            for (weight, &log_weight) in weights.iter_mut().zip(&log_weights) {
                *weight = (log_weight - log_sum).exp();
            }
            let mean: f64 = izip!(&states, &weights)
                .map(|(state, weight)| state * weight)
                .sum();
            filtered_states.push(mean);

            resample::systematic(&weights, rng.random(), &mut ancestors);
            for (slot, &ancestor) in resampled.iter_mut().zip(&ancestors) {
                *slot = states[ancestor];
            }
            std::mem::swap(&mut states, &mut resampled);
        }

        Ok(FilterRun {
            log_likelihood,
            filtered_states,
        })
    }
}
