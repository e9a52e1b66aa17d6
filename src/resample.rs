//! Resampling of particle weights.

/// Systematic resampling.
///
/// Fills `indices` with ancestor indices drawn with probability
/// proportional to `weights`, using the single stratified uniform
/// `u01` in `[0, 1)`. The weights must be non-negative and sum to one up
/// to floating point drift. Runs in O(N) and keeps every ancestor's
/// offspring count within one of its expectation `indices.len() * weight`.
pub fn systematic(weights: &[f64], u01: f64, indices: &mut [usize]) {
    debug_assert!(!weights.is_empty());
    debug_assert!((0.0..1.0).contains(&u01));

    let n = indices.len() as f64;
    let mut cursor = 0;
    let mut cumulative = weights[0];
    for (k, slot) in indices.iter_mut().enumerate() {
        let point = (u01 + k as f64) / n;
        // The cumulative sum can fall short of 1.0 through rounding, so the
        // walk clamps at the last weight instead of trusting it to cover
        // every point.
        while cumulative < point && cursor + 1 < weights.len() {
            cursor += 1;
            cumulative += weights[cursor];
        }
        *slot = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn offspring_counts_stay_within_one_of_expectation() {
        let weights = [0.5, 0.3, 0.2];
        let mut indices = vec![0; 1000];
        systematic(&weights, 0.37, &mut indices);
        for (i, &weight) in weights.iter().enumerate() {
            let count = indices.iter().filter(|&&idx| idx == i).count() as f64;
            assert!(
                (count - 1000. * weight).abs() <= 1.,
                "index {i}: got {count} offspring, expected about {}",
                1000. * weight
            );
        }
    }

    #[test]
    fn empirical_frequency_converges_to_weights() {
        let weights = [0.05, 0.6, 0.35];
        let mut counts = [0usize; 3];
        let mut indices = vec![0; 100];
        for k in 0..200 {
            systematic(&weights, (k as f64 + 0.5) / 200., &mut indices);
            for &idx in &indices {
                counts[idx] += 1;
            }
        }
        for (i, &weight) in weights.iter().enumerate() {
            let freq = counts[i] as f64 / 20_000.;
            assert!((freq - weight).abs() < 0.02, "index {i}: frequency {freq}");
        }
    }

    #[test]
    fn heavy_degeneracy_selects_the_surviving_particle() {
        let mut weights = vec![0.; 100];
        weights[17] = 1.;
        let mut indices = vec![0; 100];
        systematic(&weights, 0.9, &mut indices);
        assert!(indices.iter().all(|&idx| idx == 17));
    }

    proptest! {
        #[test]
        fn indices_are_in_range_and_sorted(
            raw in prop::collection::vec(0f64..1., 1..40),
            u01 in 0f64..1.,
        ) {
            let total: f64 = raw.iter().sum();
            prop_assume!(total > 1e-9);
            let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
            let mut indices = vec![0; 64];
            systematic(&weights, u01, &mut indices);
            prop_assert!(indices.iter().all(|&idx| idx < weights.len()));
            prop_assert!(indices.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}
