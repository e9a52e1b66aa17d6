use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pmmh_rs::models::StochasticVolatility;
use pmmh_rs::{ParticleFilter, PmmhChain, PmmhSettings, StateSpaceModel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

fn simulate_returns(len: usize, seed: u64) -> Vec<f64> {
    let model = StochasticVolatility;
    let params = [0.98, 0.16, 0.7];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = 0f64;
    (0..len)
        .map(|_| {
            state = model.transition(&params, state, rng.sample(StandardNormal));
            let scale = params[2] * (0.5 * state).exp();
            let eps: f64 = rng.sample(StandardNormal);
            scale * eps
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let model = StochasticVolatility;
    let params = [0.95, 0.2, 0.9];
    let observations = simulate_returns(500, 3);

    let filter = ParticleFilter::new(500).unwrap();
    c.bench_function("filter 500 particles 500 steps", |b| {
        b.iter_batched(
            || ChaCha8Rng::seed_from_u64(42),
            |mut rng| {
                filter
                    .run(&model, black_box(&params), black_box(&observations), &mut rng)
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });

    let settings = PmmhSettings {
        num_draws: 1,
        num_particles: 200,
        step_sizes: vec![0.01, 0.05, 0.05],
        ..PmmhSettings::default()
    };
    c.bench_function("pmmh draw 200 particles 500 steps", |b| {
        b.iter_batched(
            || {
                PmmhChain::new(
                    &model,
                    &observations,
                    &params,
                    &settings,
                    ChaCha8Rng::seed_from_u64(7),
                    0,
                )
                .unwrap()
            },
            |mut chain| chain.draw().unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
