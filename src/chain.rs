//! Recorded parameter chains and per-draw progress reporting.

/// One recorded draw of a PMMH chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDraw {
    /// Parameter vector after the accept/reject decision.
    pub params: Box<[f64]>,
    /// Log-likelihood estimate attached to `params`.
    pub log_likelihood: f64,
    /// Whether the proposal of this iteration was accepted.
    pub accepted: bool,
}

/// Parameter chain of a single PMMH run.
///
/// The first entry is the initial state, every further entry records one
/// iteration. The storage is sized up front and only ever appended to, so
/// a partially completed run still holds a valid prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    chain_id: u64,
    draws: Vec<ChainDraw>,
}

impl Chain {
    pub(crate) fn with_capacity(chain_id: u64, capacity: usize) -> Self {
        Chain {
            chain_id,
            draws: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, draw: ChainDraw) {
        self.draws.push(draw);
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn draws(&self) -> &[ChainDraw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Fraction of accepted proposals, the initial state excluded.
    pub fn acceptance_rate(&self) -> f64 {
        if self.draws.len() < 2 {
            return 0.;
        }
        let accepted = self.draws[1..].iter().filter(|draw| draw.accepted).count();
        accepted as f64 / (self.draws.len() - 1) as f64
    }

    /// Per-dimension mean of the draws remaining after discarding the first
    /// `burn_in` entries, or `None` if nothing remains.
    pub fn posterior_mean(&self, burn_in: usize) -> Option<Vec<f64>> {
        let tail = self.draws.get(burn_in..)?;
        let last = tail.last()?;
        let mut mean = vec![0f64; last.params.len()];
        for draw in tail {
            for (total, &param) in mean.iter_mut().zip(draw.params.iter()) {
                *total += param;
            }
        }
        for total in &mut mean {
            *total /= tail.len() as f64;
        }
        Some(mean)
    }
}

/// Snapshot describing the state of a chain after one draw.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Progress {
    pub draw: u64,
    pub chain: u64,
    pub accepted: bool,
    pub log_likelihood: f64,
    pub acceptance_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn draw(params: &[f64], accepted: bool) -> ChainDraw {
        ChainDraw {
            params: params.to_vec().into_boxed_slice(),
            log_likelihood: -1.,
            accepted,
        }
    }

    #[test]
    fn acceptance_rate_excludes_the_initial_state() {
        let mut chain = Chain::with_capacity(0, 4);
        chain.push(draw(&[0.], true));
        chain.push(draw(&[1.], true));
        chain.push(draw(&[1.], false));
        chain.push(draw(&[2.], true));
        assert_abs_diff_eq!(chain.acceptance_rate(), 2. / 3.);

        let single = Chain::with_capacity(0, 1);
        assert_eq!(single.acceptance_rate(), 0.);
    }

    #[test]
    fn posterior_mean_discards_the_burn_in_prefix() {
        let mut chain = Chain::with_capacity(0, 4);
        chain.push(draw(&[10., 0.], true));
        chain.push(draw(&[1., 2.], true));
        chain.push(draw(&[3., 4.], false));
        let mean = chain.posterior_mean(1).unwrap();
        assert_abs_diff_eq!(mean[0], 2.);
        assert_abs_diff_eq!(mean[1], 3.);
    }

    #[test]
    fn posterior_mean_of_an_exhausted_chain_is_none() {
        let mut chain = Chain::with_capacity(0, 1);
        chain.push(draw(&[1.], true));
        assert!(chain.posterior_mean(1).is_none());
        assert!(chain.posterior_mean(7).is_none());
    }
}
