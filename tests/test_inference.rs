//! Integration test: train, persist, then label single readings

use chrono::{Duration, NaiveDate};
use energy_ids::prelude::*;
use serde_json::Value;

const REFERENCE: &str = r#"{
    "device_id": "AA:BB:CC:DD:EE:FF",
    "data": {
        "voltage": 230.0,
        "current": 1.2,
        "power": 276.0,
        "energy": 12.5,
        "frequency": 50.0,
        "power_factor": 0.98
    }
}"#;

fn trained_store(dir: &std::path::Path) -> FileModelStore {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let rows: Vec<RawReading> = (0..90)
        .map(|i| {
            let features = FeatureVector::from_array([
                228.0 + (i % 9) as f64 * 0.5,
                1.1 + (i % 5) as f64 * 0.05,
                260.0 + (i % 17) as f64 * 2.0,
                12.0 + (i % 4) as f64 * 0.2,
                49.95 + (i % 3) as f64 * 0.05,
                0.96 + (i % 3) as f64 * 0.01,
            ]);
            RawReading::complete(i, "AA:BB:CC:DD:EE:FF", features, start + Duration::minutes(i))
        })
        .collect();

    let store = FileModelStore::open(dir).unwrap();
    let config = PipelineConfig::default().with_classifier_estimators(25);
    let report = TrainingPipeline::new(config)
        .unwrap()
        .run(Box::new(MemoryReadingSource::new(rows)), &store)
        .unwrap();
    assert_eq!(report.n_trained(), 1);
    store
}

#[test]
fn test_reference_vector_response() {
    let dir = tempfile::tempdir().unwrap();
    let engine = InferenceEngine::new(trained_store(dir.path()));

    let body = engine.handle_request(REFERENCE).unwrap();
    let parsed: Value = serde_json::from_str(&body).unwrap();
    let rows = parsed.as_array().unwrap();

    assert_eq!(rows.len(), 1);
    let row = rows[0].as_object().unwrap();
    assert_eq!(row.len(), 7);
    assert_eq!(row["voltage"], 230.0);
    assert_eq!(row["current"], 1.2);
    assert_eq!(row["power_factor"], 0.98);
    let label = row["label"].as_str().unwrap();
    assert!(label == "normal" || label == "anomaly");
}

#[test]
fn test_training_and_inference_agree_on_keys() {
    let dir = tempfile::tempdir().unwrap();
    let engine = InferenceEngine::new(trained_store(dir.path()));
    let features = FeatureVector::from_array([230.0, 1.2, 276.0, 12.5, 50.0, 0.98]);

    let upper = engine.predict("AA:BB:CC:DD:EE:FF", &features).unwrap();
    let lower = engine.predict("aa:bb:cc:dd:ee:ff", &features).unwrap();
    assert_eq!(upper, lower);
    assert_eq!(
        engine.store().path_for(&artifact_key(ModelKind::Classifier, "aa:bb:cc:dd:ee:ff")),
        dir.path().join("classifier_AA-BB-CC-DD-EE-FF.bin")
    );
}

#[test]
fn test_unknown_device() {
    let dir = tempfile::tempdir().unwrap();
    let engine = InferenceEngine::new(trained_store(dir.path()));
    let request = REFERENCE.replace("AA:BB:CC:DD:EE:FF", "00:00:00:00:00:00");

    let err = engine.handle_request(&request).unwrap_err();
    assert!(matches!(err, IdsError::ArtifactNotFound { .. }));
    assert_eq!(err.kind(), "artifact_not_found");
}

#[test]
fn test_missing_power_factor_never_reaches_classifier() {
    // Empty store: reaching the classifier lookup would yield ArtifactNotFound
    let dir = tempfile::tempdir().unwrap();
    let engine = InferenceEngine::new(FileModelStore::open(dir.path()).unwrap());
    let request = r#"{"device_id":"AA:BB:CC:DD:EE:FF","data":{"voltage":230.0,"current":1.2,
        "power":276.0,"energy":12.5,"frequency":50.0}}"#;

    let err = engine.handle_request(request).unwrap_err();
    assert!(matches!(err, IdsError::ValidationError(_)));
}

#[test]
fn test_concurrent_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let engine = InferenceEngine::new(trained_store(dir.path()));
    let features = FeatureVector::from_array([230.0, 1.2, 276.0, 12.5, 50.0, 0.98]);
    let expected = engine.predict("AA:BB:CC:DD:EE:FF", &features).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let result = engine.predict("AA:BB:CC:DD:EE:FF", &features).unwrap();
                assert_eq!(result, expected);
            });
        }
    });
}
