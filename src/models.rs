//! Ready-made reference models.
//!
//! Small, well-understood models used in the tests and useful as starting
//! points for custom implementations of [`StateSpaceModel`].

use crate::math::normal_logpdf;
use crate::model::StateSpaceModel;

/// Stochastic volatility model for log-return series, parameters
/// `[phi, sigma, beta]`:
///
/// ```text
/// x[t+1] = phi * x[t] + sigma * v[t]
/// y[t]   = beta * exp(x[t] / 2) * e[t]
/// ```
///
/// with independent standard normal `v` and `e`. The domain requires
/// `|phi| < 1` (stationary log-volatility) and positive scales.
#[derive(Debug, Clone, Copy, Default)]
pub struct StochasticVolatility;

impl StateSpaceModel for StochasticVolatility {
    fn param_dim(&self) -> usize {
        3
    }

    fn params_in_domain(&self, params: &[f64]) -> bool {
        params[0].abs() < 1. && params[1] > 0. && params[2] > 0.
    }

    fn initial_state(&self, _params: &[f64], _noise: f64) -> f64 {
        // Log-volatility starts at its long-run level.
        0.
    }

    fn transition(&self, params: &[f64], state: f64, noise: f64) -> f64 {
        params[0] * state + params[1] * noise
    }

    fn observation_logp(&self, params: &[f64], state: f64, observation: f64) -> f64 {
        normal_logpdf(observation, 0., params[2] * (0.5 * state).exp())
    }
}

/// Linear Gaussian state space model, parameters `[phi, sigma, tau]`: a
/// stationary AR(1) latent state observed under Gaussian noise.
///
/// Its marginal likelihood has a closed form
/// ([`kalman_log_likelihood`]), which makes it the reference point for
/// validating the particle filter's estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearGaussian;

impl StateSpaceModel for LinearGaussian {
    fn param_dim(&self) -> usize {
        3
    }

    fn params_in_domain(&self, params: &[f64]) -> bool {
        params[0].abs() < 1. && params[1] > 0. && params[2] > 0.
    }

    fn initial_state(&self, params: &[f64], noise: f64) -> f64 {
        let (phi, sigma) = (params[0], params[1]);
        sigma / (1. - phi * phi).sqrt() * noise
    }

    fn transition(&self, params: &[f64], state: f64, noise: f64) -> f64 {
        params[0] * state + params[1] * noise
    }

    fn observation_logp(&self, params: &[f64], state: f64, observation: f64) -> f64 {
        normal_logpdf(observation, state, params[2])
    }
}

/// Exact marginal log-likelihood of [`LinearGaussian`] via the scalar
/// Kalman filter, with the same stationary initialization the particle
/// filter uses.
pub fn kalman_log_likelihood(params: &[f64], observations: &[f64]) -> f64 {
    let (phi, sigma, tau) = (params[0], params[1], params[2]);
    let mut mean = 0f64;
    let mut var = sigma * sigma / (1. - phi * phi);
    let mut log_likelihood = 0f64;
    for &observation in observations {
        let pred_mean = phi * mean;
        let pred_var = phi * phi * var + sigma * sigma;
        let innovation_var = pred_var + tau * tau;
        log_likelihood += normal_logpdf(observation, pred_mean, innovation_var.sqrt());
        let gain = pred_var / innovation_var;
        mean = pred_mean + gain * (observation - pred_mean);
        var = (1. - gain) * pred_var;
    }
    log_likelihood
}
