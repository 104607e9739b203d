use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use chrono::{Duration, NaiveDate};
use energy_ids::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_readings(n_rows: usize, device: &str) -> Vec<Reading> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();

    (0..n_rows)
        .map(|i| Reading {
            data_id: i as i64,
            device_id: device.to_string(),
            features: FeatureVector::from_array([
                225.0 + rng.gen::<f64>() * 10.0,
                1.0 + rng.gen::<f64>() * 0.5,
                250.0 + rng.gen::<f64>() * 50.0,
                10.0 + rng.gen::<f64>() * 5.0,
                49.8 + rng.gen::<f64>() * 0.4,
                0.9 + rng.gen::<f64>() * 0.1,
            ]),
            created_at: start + Duration::minutes(i as i64),
        })
        .collect()
}

fn bench_bootstrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("bootstrap");
    group.sample_size(10);

    for n_rows in [500, 2000, 5000].iter() {
        let readings = create_readings(*n_rows, "AA:BB");
        let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("isolation_forest", n_rows), &readings, |b, readings| {
            b.iter(|| {
                LabelBootstrapper::default()
                    .bootstrap_labels("AA:BB", black_box(readings), &split)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");
    group.sample_size(10);

    for n_rows in [500, 2000, 5000].iter() {
        let readings = create_readings(*n_rows, "AA:BB");
        let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();
        let labels = LabelBootstrapper::default()
            .bootstrap_labels("AA:BB", &readings, &split)
            .unwrap()
            .unwrap();

        group.bench_with_input(BenchmarkId::new("random_forest", n_rows), &readings, |b, readings| {
            b.iter(|| {
                ClassifierTrainer::default()
                    .train_device(black_box(readings), &labels)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let readings = create_readings(2000, "AA:BB");
    let split = TrainTestSplit::new(readings.len(), 0.33, 42).unwrap();
    let labels = LabelBootstrapper::default()
        .bootstrap_labels("AA:BB", &readings, &split)
        .unwrap()
        .unwrap();
    let classifier = match ClassifierTrainer::default().train_device(&readings, &labels).unwrap() {
        TrainOutcome::Trained(classifier) => classifier,
        TrainOutcome::Skipped { reason } => panic!("skipped: {}", reason),
    };

    let store = MemoryModelStore::new();
    store.save_classifier(&classifier).unwrap();
    let engine = InferenceEngine::new(store);
    let features = FeatureVector::from_array([230.0, 1.2, 276.0, 12.5, 50.0, 0.98]);

    c.bench_function("predict_single", |b| {
        b.iter(|| engine.predict("AA:BB", black_box(&features)).unwrap())
    });
}

criterion_group!(benches, bench_bootstrap, bench_classifier, bench_prediction);
criterion_main!(benches);
