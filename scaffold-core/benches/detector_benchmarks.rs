use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use scaffold_core::models::{ConstantModel, FeatureThresholdModel};
use scaffold_core::synthetic::PerturbationStrategy;
use scaffold_core::{
    AdversarialRouter, BackgroundSubstitution, DetectorTrainer, Estimator, FeatureSpace,
    GaussianNeighborhood, GradientBoostedTrees,
};
use std::sync::Arc;

fn real_rows(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, 5), |(i, j)| ((i * 7 + j * 13) % 17) as f64)
}

fn bench_generation(c: &mut Criterion) {
    let x = real_rows(200);
    let space = FeatureSpace::anonymous(5);

    c.bench_function("gaussian_generate_200x5_m30", |b| {
        let strategy = GaussianNeighborhood::new();
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| strategy.generate(black_box(x.view()), &space, &mut rng))
    });

    c.bench_function("substitution_generate_200x5_n2000", |b| {
        let strategy = BackgroundSubstitution::new().with_n_samples(2000);
        let mut rng = StdRng::seed_from_u64(2);
        b.iter(|| strategy.generate(black_box(x.view()), &space, &mut rng))
    });
}

fn bench_boosting(c: &mut Criterion) {
    let x = real_rows(1000);
    let y: Vec<usize> = x.column(0).iter().map(|&v| usize::from(v > 8.0)).collect();

    c.bench_function("boosted_trees_fit_1000x5", |b| {
        b.iter(|| {
            let mut model = GradientBoostedTrees::new();
            model.fit(black_box(x.view()), black_box(&y))
        })
    });
}

fn bench_routing(c: &mut Criterion) {
    let x = real_rows(100);
    let mut router = AdversarialRouter::new(
        Arc::new(FeatureThresholdModel::new(0, 8.0)),
        Arc::new(ConstantModel::new(0)),
    );
    let trainer = DetectorTrainer::new(GaussianNeighborhood::new().with_multiplier(5));
    let mut rng = StdRng::seed_from_u64(3);
    if router
        .train(x.clone(), &vec![0; 100], None, &trainer, &mut rng)
        .is_err()
    {
        return;
    }

    let batch = real_rows(500);
    c.bench_function("router_predict_500", |b| {
        b.iter(|| router.predict(black_box(batch.view())))
    });
}

criterion_group!(benches, bench_generation, bench_boosting, bench_routing);
criterion_main!(benches);
