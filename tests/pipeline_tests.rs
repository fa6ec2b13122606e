use anyhow::Result;
use income_predictor::artifact::{self, ArtifactStore, LATEST_POINTER, PIPELINE_UNIT, SCHEMA_UNIT};
use income_predictor::evaluation::TrainingMetrics;
use income_predictor::models::{EstimatorConfig, FittedPipeline};
use income_predictor::{
    Dataset, FeatureRecord, OneOrMany, Pipeline, PipelineError, SchemaDescriptor,
    ScoringService, Table, Value,
};
use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;

const WORKCLASS: [&str; 3] = ["Private", "State-gov", "Self-emp-inc"];
const EDUCATION: [&str; 4] = ["HS-grad", "Bachelors", "Masters", "Some-college"];
const COUNTRY: [&str; 3] = ["United-States", "Mexico", "India"];

/// Census-shaped CSV where the label is exactly `capital_gain > 5000`.
fn census_csv(rows: usize) -> String {
    let mut csv = String::from(
        "age,workclass,education,marital_status,occupation,relationship,race,sex,\
         capital_gain,capital_loss,hours_per_week,native_country,label\n",
    );
    for i in 0..rows {
        let gain = if i % 4 == 0 { 6000 + (i * 37) % 8000 } else { (i * 13) % 3000 };
        let loss = if i % 7 == 0 { 400 } else { 0 };
        let sex = if i % 2 == 0 { "Male" } else { "Female" };
        // every tenth row leaves workclass empty
        let workclass = if i % 10 == 3 { "" } else { WORKCLASS[i % 3] };
        writeln!(
            csv,
            "{},{},{},Never-married,Sales,Not-in-family,White,{},{},{},{},{},{}",
            20 + i % 50,
            workclass,
            EDUCATION[i % 4],
            sex,
            gain,
            loss,
            30 + i % 30,
            COUNTRY[i % 3],
            u8::from(gain > 5000)
        )
        .unwrap();
    }
    csv
}

fn census_dataset(rows: usize) -> Dataset {
    Dataset::from_reader(census_csv(rows).as_bytes()).unwrap()
}

fn fitted_pipeline() -> (Pipeline, TrainingMetrics) {
    let data = census_dataset(200);
    let mut pipeline = Pipeline::new(SchemaDescriptor::census(), EstimatorConfig::default());
    let report = pipeline.fit(&data.features, &data.labels).unwrap();
    let probabilities = pipeline.predict_probability(&data.features).unwrap();
    let metrics = TrainingMetrics::evaluate(&data.labels, &probabilities, &report, data.len());
    (pipeline, metrics)
}

fn numeric_record(age: u32, capital_gain: u32, capital_loss: u32, hours_per_week: u32) -> FeatureRecord {
    FeatureRecord::new()
        .with("age", f64::from(age))
        .with("capital_gain", f64::from(capital_gain))
        .with("capital_loss", f64::from(capital_loss))
        .with("hours_per_week", f64::from(hours_per_week))
}

fn full_record(capital_gain: u32) -> FeatureRecord {
    numeric_record(45, capital_gain, 0, 40)
        .with("workclass", "Private")
        .with("education", "Bachelors")
        .with("sex", "Male")
        .with("native_country", "United-States")
}

#[test]
fn test_fit_save_load_scores_identically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (pipeline, metrics) = fitted_pipeline();
    let store = ArtifactStore::new(dir.path());

    let saved = store.save(&pipeline, pipeline.schema(), &metrics)?;
    let loaded = store.load_latest()?;

    assert_eq!(loaded.manifest.version, saved.version);
    assert_eq!(loaded.schema, SchemaDescriptor::census());
    assert_eq!(loaded.metrics, metrics);
    assert_eq!(loaded.pipeline.fitted()?, pipeline.fitted()?);

    let data = census_dataset(60);
    let before = pipeline.predict_probability(&data.features)?;
    let after = loaded.pipeline.predict_probability(&data.features)?;
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    Ok(())
}

#[test]
fn test_training_metrics_are_reported() {
    let (_, metrics) = fitted_pipeline();
    assert!(metrics.roc_auc > 0.9, "auc {}", metrics.roc_auc);
    assert_eq!(metrics.train_rows, 200);
    assert_eq!(metrics.report.positive.support + metrics.report.negative.support, 200);

    let json = serde_json::to_value(&metrics).unwrap();
    assert!(json["report"]["1"]["f1-score"].is_number());
    assert!(json["report"]["macro avg"]["precision"].is_number());
}

#[test]
fn test_high_capital_gain_scores_positive() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = ScoringService::new(pipeline, SchemaDescriptor::census())?;

    let high = service.predict_one(&full_record(9000))?;
    assert!(high.probability > 0.5, "p = {}", high.probability);
    assert_eq!(high.label, 1);

    let low = service.predict_one(&full_record(0))?;
    assert!(low.probability < high.probability);
    assert_eq!(low.label, 0);
    Ok(())
}

#[test]
fn test_bare_numeric_record_scores_without_error() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = ScoringService::new(pipeline, SchemaDescriptor::census())?;

    let record = numeric_record(25, 0, 0, 0);
    let prediction = service.predict_one(&record)?;
    assert!((0.0..=1.0).contains(&prediction.probability));
    assert_eq!(prediction.label, 0);
    Ok(())
}

#[test]
fn test_unseen_country_matches_omitted_country() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = ScoringService::new(pipeline, SchemaDescriptor::census())?;

    let mut unseen = full_record(2000);
    unseen.insert("native_country", "Atlantis");
    let mut omitted = full_record(2000);
    omitted.remove("native_country");

    let a = service.predict_one(&unseen)?;
    let b = service.predict_one(&omitted)?;
    assert_eq!(a.probability.to_bits(), b.probability.to_bits());
    Ok(())
}

#[test]
fn test_categorical_codes_keep_their_spelling_from_csv() -> Result<()> {
    let mut csv = String::from("gain,code,label\n");
    for i in 0..20 {
        let (code, label) = if i % 2 == 0 { ("01", 1) } else { ("02", 0) };
        writeln!(csv, "{},{},{}", i * 10, code, label)?;
    }
    let data = Dataset::from_reader(csv.as_bytes())?;
    let schema = SchemaDescriptor::new(vec!["gain".into()], vec!["code".into()])?;

    let mut pipeline = Pipeline::new(schema.clone(), EstimatorConfig::default());
    pipeline.fit(&data.features, &data.labels)?;
    assert_eq!(pipeline.feature_names()?, vec!["gain", "code=01", "code=02"]);

    let service = ScoringService::new(pipeline, schema)?;
    let coded = service.predict_one(&FeatureRecord::new().with("gain", 10.0).with("code", "01"))?;
    let omitted = service.predict_one(&FeatureRecord::new().with("gain", 10.0))?;
    assert_ne!(coded, omitted);
    assert!(coded.probability > omitted.probability);
    Ok(())
}

#[test]
fn test_batch_matches_single_and_preserves_order() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = ScoringService::new(pipeline, SchemaDescriptor::census())?;

    let records: Vec<FeatureRecord> = [0, 9000, 3000, 12000].into_iter().map(full_record).collect();
    let batch = service.predict(&records)?;
    assert_eq!(batch.len(), records.len());
    for (record, scored) in records.iter().zip(&batch) {
        assert_eq!(&service.predict_one(record)?, scored);
    }

    match service.score(OneOrMany::Many(records.clone()))? {
        OneOrMany::Many(predictions) => assert_eq!(predictions, batch),
        OneOrMany::One(_) => panic!("batch request answered with a single prediction"),
    }
    Ok(())
}

#[test]
fn test_batch_fails_whole_on_missing_numeric() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = ScoringService::new(pipeline, SchemaDescriptor::census())?;

    let mut broken = full_record(100);
    broken.remove("age");
    let result = service.predict(&[full_record(9000), broken]);
    assert!(matches!(result, Err(PipelineError::InvalidRecord(_))));
    Ok(())
}

#[test]
fn test_probability_of_exactly_half_is_positive() -> Result<()> {
    // zero weights and zero intercept give sigmoid(0) = 0.5 for every row
    let fitted: FittedPipeline = serde_json::from_value(serde_json::json!({
        "transform": {
            "numeric": [{"column": "age", "scale": 10.0}],
            "categorical": [{"column": "sex", "categories": ["Female", "Male"]}]
        },
        "estimator": {"weights": [0.0, 0.0, 0.0], "intercept": 0.0}
    }))?;
    let schema = SchemaDescriptor::new(vec!["age".into()], vec!["sex".into()])?;
    let service = ScoringService::new(Pipeline::from_fitted(schema.clone(), fitted)?, schema)?;

    let prediction = service.predict_one(&FeatureRecord::new().with("age", 30.0))?;
    assert_eq!(prediction.probability, 0.5);
    assert_eq!(prediction.label, 1);
    Ok(())
}

#[test]
fn test_unfitted_pipeline_refuses_to_predict() {
    let pipeline = Pipeline::new(SchemaDescriptor::census(), EstimatorConfig::default());
    let table = Table::from_records(SchemaDescriptor::census().columns(), &[full_record(0)]);
    assert!(matches!(
        pipeline.predict_probability(&table),
        Err(PipelineError::NotFitted)
    ));
    assert!(matches!(
        ScoringService::new(pipeline, SchemaDescriptor::census()),
        Err(PipelineError::NotFitted)
    ));
}

#[test]
fn test_tampered_unit_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (pipeline, metrics) = fitted_pipeline();
    let saved = ArtifactStore::new(dir.path()).save(&pipeline, pipeline.schema(), &metrics)?;

    let path = saved.path.join(PIPELINE_UNIT);
    let tampered = fs::read_to_string(&path)?.replacen("\"intercept\"", " \"intercept\"", 1);
    fs::write(&path, tampered)?;

    assert!(matches!(artifact::load_dir(&saved.path), Err(PipelineError::Artifact(_))));
    Ok(())
}

#[test]
fn test_missing_unit_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (pipeline, metrics) = fitted_pipeline();
    let store = ArtifactStore::new(dir.path());
    let saved = store.save(&pipeline, pipeline.schema(), &metrics)?;

    fs::remove_file(saved.path.join(SCHEMA_UNIT))?;
    assert!(matches!(store.load(&saved.version), Err(PipelineError::Artifact(_))));
    Ok(())
}

#[test]
fn test_schema_disagreeing_with_state_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (pipeline, metrics) = fitted_pipeline();
    let saved = ArtifactStore::new(dir.path()).save(&pipeline, pipeline.schema(), &metrics)?;

    // rewrite the schema and its manifest digest so only the consistency check can catch it
    let shrunk = SchemaDescriptor::new(vec!["age".into()], vec!["sex".into()])?;
    let bytes = serde_json::to_vec_pretty(&shrunk)?;
    fs::write(saved.path.join(SCHEMA_UNIT), &bytes)?;

    let manifest_path = saved.path.join(artifact::MANIFEST_FILE);
    let mut manifest: artifact::Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;
    manifest
        .units
        .insert(SCHEMA_UNIT.to_string(), blake3::hash(&bytes).to_hex().to_string());
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

    assert!(matches!(artifact::load_dir(&saved.path), Err(PipelineError::Artifact(_))));
    Ok(())
}

#[test]
fn test_save_rejects_mismatched_schema() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, metrics) = fitted_pipeline();
    let other = SchemaDescriptor::new(vec!["age".into()], vec![]).unwrap();

    let result = ArtifactStore::new(dir.path()).save(&pipeline, &other, &metrics);
    assert!(matches!(result, Err(PipelineError::Schema(_))));
    assert!(fs::read_dir(dir.path()).map(|d| d.count() == 0).unwrap_or(true));
}

#[test]
fn test_latest_follows_newest_save() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (pipeline, metrics) = fitted_pipeline();
    let store = ArtifactStore::new(dir.path());

    let first = store.save(&pipeline, pipeline.schema(), &metrics)?;
    let second = store.save(&pipeline, pipeline.schema(), &metrics)?;
    assert_ne!(first.version, second.version);
    assert_eq!(store.latest_version()?, second.version);
    assert_eq!(store.list_versions()?.len(), 2);

    // older versions stay loadable
    assert_eq!(store.load(&first.version)?.manifest.version, first.version);

    // a lost pointer falls back to the newest complete version
    fs::remove_file(dir.path().join(LATEST_POINTER))?;
    assert_eq!(store.latest_version()?, second.version);
    assert_eq!(store.load_latest()?.manifest.version, second.version);
    Ok(())
}

#[test]
fn test_concurrent_scoring_is_deterministic() -> Result<()> {
    let (pipeline, _) = fitted_pipeline();
    let service = Arc::new(ScoringService::new(pipeline, SchemaDescriptor::census())?);
    let records: Vec<FeatureRecord> = (0..20).map(|i| full_record(i * 700)).collect();
    let expected = service.predict(&records)?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let records = records.clone();
            std::thread::spawn(move || service.predict(&records))
        })
        .collect();

    for handle in handles {
        let predictions = handle.join().expect("scoring thread panicked")?;
        assert_eq!(predictions, expected);
    }
    Ok(())
}

#[test]
fn test_inferred_schema_from_csv() {
    let data = census_dataset(20);
    let schema = SchemaDescriptor::infer(&data.features, &["label"]).unwrap();
    assert_eq!(schema.numeric(), SchemaDescriptor::census().numeric());
    assert!(schema.is_categorical("workclass"));
    assert!(!schema.columns().any(|c| c == "label"));

    // the empty workclass cells came through as missing
    let workclass = data.features.column("workclass").unwrap();
    assert!(workclass.iter().any(|v| *v == Value::Missing));
}
