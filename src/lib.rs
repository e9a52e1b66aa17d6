//! Particle marginal Metropolis-Hastings for state space models.
//!
//! A bootstrap particle filter produces unbiased estimates of the marginal
//! likelihood of an observed series, and a random walk Metropolis sampler
//! uses those estimates to draw from the posterior over model parameters.

pub(crate) mod chain;
pub(crate) mod filter;
pub(crate) mod math;
pub(crate) mod model;
pub mod models;
pub mod resample;
pub(crate) mod sampler;

pub use chain::{Chain, ChainDraw, Progress};
pub use filter::{FilterError, FilterRun, ParticleFilter};
pub use model::StateSpaceModel;
pub use sampler::{sample, sample_parallel, PmmhChain, PmmhSettings, SamplerError};
