//! Particle marginal Metropolis-Hastings driver.
//!
//! A random walk Metropolis sampler over model parameters in which the
//! marginal likelihood of every proposal is replaced by the particle
//! filter's unbiased estimate. The pseudo-marginal construction keeps the
//! parameter posterior as the exact stationary distribution even though
//! the likelihood is only estimated.

use std::thread;

use anyhow::{bail, Context};
use itertools::izip;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use thiserror::Error;

use crate::chain::{Chain, ChainDraw, Progress};
use crate::filter::{FilterError, ParticleFilter};
use crate::model::StateSpaceModel;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("invalid sampler configuration: {0}")]
    InvalidConfiguration(String),
    /// The filter could not produce a usable likelihood at the initial
    /// parameters, so the chain has no valid starting state.
    #[error("particle filter failed at the initial parameters")]
    Startup(#[source] FilterError),
    /// A non-recoverable filter failure stopped the run mid-chain.
    #[error("particle filter failed")]
    Filter(#[source] FilterError),
}

/// Configuration of a PMMH run.
#[derive(Debug, Clone)]
pub struct PmmhSettings {
    /// Number of iterations per chain. The recorded chain holds one more
    /// entry than this for the initial state.
    pub num_draws: u64,
    /// Particle count of the embedded filter.
    pub num_particles: usize,
    /// Per-parameter standard deviations of the random walk proposal.
    pub step_sizes: Vec<f64>,
    /// Number of independent chains run by [`sample_parallel`].
    pub num_chains: usize,
    pub seed: u64,
}

impl Default for PmmhSettings {
    fn default() -> Self {
        Self {
            num_draws: 5000,
            num_particles: 500,
            step_sizes: Vec::new(),
            num_chains: 4,
            seed: 0,
        }
    }
}

/// A single PMMH chain stepped one iteration at a time.
///
/// Holds the current parameter vector together with the likelihood
/// estimate it was accepted with; [`draw`](PmmhChain::draw) advances the
/// chain by one accept/reject decision. One generator drives the proposal,
/// the embedded filter, and the acceptance draw, so a seed pins down the
/// entire chain.
pub struct PmmhChain<'a, M: StateSpaceModel, R: Rng> {
    model: &'a M,
    observations: &'a [f64],
    filter: ParticleFilter,
    step_sizes: Box<[f64]>,
    rng: R,
    chain_id: u64,
    draw_count: u64,
    accept_count: u64,
    position: Vec<f64>,
    proposal: Vec<f64>,
    log_likelihood: f64,
}

impl<'a, M, R> PmmhChain<'a, M, R>
where
    M: StateSpaceModel,
    R: Rng,
{
    /// Validate the configuration and estimate the likelihood at the
    /// initial parameters.
    pub fn new(
        model: &'a M,
        observations: &'a [f64],
        initial: &[f64],
        settings: &PmmhSettings,
        mut rng: R,
        chain_id: u64,
    ) -> Result<Self, SamplerError> {
        let dim = model.param_dim();
        if initial.len() != dim {
            return Err(SamplerError::InvalidConfiguration(format!(
                "initial parameter vector has length {}, model expects {dim}",
                initial.len()
            )));
        }
        if settings.step_sizes.len() != dim {
            return Err(SamplerError::InvalidConfiguration(format!(
                "{} step sizes for {dim} parameters",
                settings.step_sizes.len()
            )));
        }
        if settings
            .step_sizes
            .iter()
            .any(|step| !step.is_finite() || *step < 0.)
        {
            return Err(SamplerError::InvalidConfiguration(
                "step sizes must be finite and non-negative".into(),
            ));
        }
        if observations.is_empty() {
            return Err(SamplerError::InvalidConfiguration(
                "observation sequence must not be empty".into(),
            ));
        }
        if !model.params_in_domain(initial) {
            return Err(SamplerError::InvalidConfiguration(
                "initial parameters are outside the model domain".into(),
            ));
        }

        let filter = ParticleFilter::new(settings.num_particles)
            .map_err(|err| SamplerError::InvalidConfiguration(err.to_string()))?;
        let run = filter
            .run(model, initial, observations, &mut rng)
            .map_err(SamplerError::Startup)?;

        Ok(PmmhChain {
            model,
            observations,
            filter,
            step_sizes: settings.step_sizes.clone().into_boxed_slice(),
            rng,
            chain_id,
            draw_count: 0,
            accept_count: 0,
            position: initial.to_vec(),
            proposal: vec![0f64; dim],
            log_likelihood: run.log_likelihood,
        })
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.draw_count == 0 {
            return 0.;
        }
        self.accept_count as f64 / self.draw_count as f64
    }

    /// Advance the chain by one iteration.
    ///
    /// Proposes a random walk step, rejects out-of-domain proposals before
    /// spending any filter work on them, and otherwise runs the filter and
    /// applies the Metropolis-Hastings rule. A degenerate likelihood
    /// estimate counts as a certain rejection; any other filter failure
    /// aborts the run.
    pub fn draw(&mut self) -> Result<(ChainDraw, Progress), SamplerError> {
        for (proposed, &current, &step) in
            izip!(self.proposal.iter_mut(), &self.position, self.step_sizes.iter())
        {
            let noise: f64 = self.rng.sample(StandardNormal);
            *proposed = current + step * noise;
        }

        let accepted = if self.proposal == self.position {
            // An identical proposal cannot change the MH state;
            // re-estimating its likelihood would only add noise to a
            // guaranteed acceptance.
            true
        } else if !self.model.params_in_domain(&self.proposal) {
            log::debug!("chain {}: proposal outside the model domain", self.chain_id);
            false
        } else {
            match self
                .filter
                .run(self.model, &self.proposal, self.observations, &mut self.rng)
            {
                Ok(run) => {
                    let log_ratio = run.log_likelihood + self.model.log_prior(&self.proposal)
                        - self.log_likelihood
                        - self.model.log_prior(&self.position);
                    let uniform: f64 = self.rng.random();
                    if uniform.ln() < log_ratio {
                        self.position.copy_from_slice(&self.proposal);
                        self.log_likelihood = run.log_likelihood;
                        true
                    } else {
                        false
                    }
                }
                Err(err) if err.is_recoverable() => {
                    log::debug!("chain {}: rejecting degenerate proposal ({err})", self.chain_id);
                    false
                }
                Err(err) => return Err(SamplerError::Filter(err)),
            }
        };

        self.draw_count += 1;
        if accepted {
            self.accept_count += 1;
        }

        let draw = ChainDraw {
            params: self.position.clone().into_boxed_slice(),
            log_likelihood: self.log_likelihood,
            accepted,
        };
        let progress = Progress {
            draw: self.draw_count,
            chain: self.chain_id,
            accepted,
            log_likelihood: self.log_likelihood,
            acceptance_rate: self.acceptance_rate(),
        };
        Ok((draw, progress))
    }
}

fn run_chain<M: StateSpaceModel>(
    model: &M,
    observations: &[f64],
    initial: &[f64],
    settings: &PmmhSettings,
    chain_id: u64,
) -> Result<Chain, SamplerError> {
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    rng.set_stream(chain_id);

    let mut state = PmmhChain::new(model, observations, initial, settings, rng, chain_id)?;
    let mut chain = Chain::with_capacity(chain_id, settings.num_draws as usize + 1);
    chain.push(ChainDraw {
        params: initial.to_vec().into_boxed_slice(),
        log_likelihood: state.log_likelihood(),
        accepted: true,
    });
    for _ in 0..settings.num_draws {
        let (draw, _) = state.draw()?;
        chain.push(draw);
    }
    log::info!(
        "chain {chain_id} finished: acceptance rate {:.3}",
        chain.acceptance_rate()
    );
    Ok(chain)
}

/// Run a single PMMH chain to completion.
pub fn sample<M: StateSpaceModel>(
    model: &M,
    observations: &[f64],
    initial: &[f64],
    settings: &PmmhSettings,
) -> Result<Chain, SamplerError> {
    run_chain(model, observations, initial, settings, 0)
}

/// Run `settings.num_chains` independent chains on worker threads.
///
/// Every chain draws from its own generator stream, so the result does not
/// depend on scheduling and chain `k` matches what a sequential run of
/// chain `k` would produce.
pub fn sample_parallel<M: StateSpaceModel>(
    model: &M,
    observations: &[f64],
    initial: &[f64],
    settings: &PmmhSettings,
) -> anyhow::Result<Vec<Chain>> {
    if settings.num_chains == 0 {
        bail!("sampler needs at least one chain");
    }
    thread::scope(|scope| {
        let handles: Vec<_> = (0..settings.num_chains as u64)
            .map(|chain_id| {
                let handle =
                    scope.spawn(move || run_chain(model, observations, initial, settings, chain_id));
                (chain_id, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(chain_id, handle)| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("chain {chain_id} worker panicked"))?
                    .with_context(|| format!("chain {chain_id} failed"))
            })
            .collect()
    })
}
