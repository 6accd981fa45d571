use anyhow::Result;
use async_trait::async_trait;
use klinelab::application::ml::training_set::TrainingSetBuilder;
use klinelab::application::pipeline::{FeaturePipeline, PipelineStage};
use klinelab::application::market_data::feature_engineering_service::FeatureDeriver;
use klinelab::application::volatility::estimator::VolatilityEstimator;
use klinelab::domain::errors::{DatasetError, PipelineError};
use klinelab::domain::market::kline::{CLOSE, RawKline};
use klinelab::domain::ml::feature_registry::{DERIVED_FEATURES, FEATURE_NAMES, GARCH_VOLATILITY};
use klinelab::domain::ports::MarketDataSource;
use klinelab::infrastructure::ProcessedDataStore;
use serde_json::json;
use std::sync::Mutex;
use tempfile::tempdir;

const HOUR_MS: i64 = 3_600_000;

fn kline(t: i64, close: f64) -> RawKline {
    vec![
        json!(t),
        json!(format!("{:.6}", close * 0.999)),
        json!(format!("{:.6}", close * 1.01)),
        json!(format!("{:.6}", close * 0.99)),
        json!(format!("{:.6}", close)),
        json!("12.5"),
        json!(t + HOUR_MS - 1),
        json!(format!("{:.6}", close * 12.5)),
        json!(340),
        json!("6.0"),
        json!(format!("{:.6}", close * 6.0)),
        json!("0"),
    ]
}

fn rising_klines(n: usize) -> Vec<RawKline> {
    (0..n)
        .map(|i| kline(1_700_000_000_000 + i as i64 * HOUR_MS, 100.0 + i as f64))
        .collect()
}

/// Closes following a GARCH(1,1)-like path, so volatility is fittable.
fn volatile_klines(n: usize) -> Vec<RawKline> {
    let (omega, alpha, beta) = (0.05, 0.1, 0.85);
    let mut sigma2: f64 = omega / (1.0 - alpha - beta);
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut log_price = 100f64.ln();

    (0..n)
        .map(|i| {
            let mut z = -6.0;
            for _ in 0..12 {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                z += (state >> 11) as f64 / (1u64 << 53) as f64;
            }
            let r = sigma2.sqrt() * z;
            sigma2 = omega + alpha * r * r + beta * sigma2;
            log_price += r / 100.0;
            kline(1_700_000_000_000 + i as i64 * HOUR_MS, log_price.exp())
        })
        .collect()
}

struct StaticSource {
    klines: Vec<RawKline>,
    calls: Mutex<Vec<(String, String, u32)>>,
}

#[async_trait]
impl MarketDataSource for StaticSource {
    async fn fetch_klines(&self, symbol: &str, interval: &str, days: u32) -> Result<Vec<RawKline>> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), interval.to_string(), days));
        Ok(self.klines.clone())
    }
}

struct FailingSource;

#[async_trait]
impl MarketDataSource for FailingSource {
    async fn fetch_klines(&self, symbol: &str, _: &str, _: u32) -> Result<Vec<RawKline>> {
        anyhow::bail!("exchange unavailable for {}", symbol)
    }
}

#[test]
fn test_twenty_five_rising_rows() {
    let pipeline = FeaturePipeline::default();
    let report = pipeline.execute(&rising_klines(25), None).unwrap();

    // SMA(20) is first defined on the 20th row
    assert_eq!(report.table.len(), 6);
    for name in DERIVED_FEATURES {
        assert!(report.table.column(name).unwrap().iter().all(Option::is_some));
    }

    // Too few returns for a volatility fit
    assert!(report.volatility_warning.is_some());
    assert!(
        report
            .table
            .column(GARCH_VOLATILITY)
            .unwrap()
            .iter()
            .all(Option::is_none)
    );

    let targets = TrainingSetBuilder::default().targets(&report.table).unwrap();
    assert_eq!(
        targets,
        vec![Some(1), Some(1), Some(1), None, None, None]
    );

    assert_eq!(
        pipeline.prepare_training_data(&report).unwrap_err(),
        DatasetError::Empty { input_rows: 6 }
    );
}

#[test]
fn test_volatile_series_yields_training_set() {
    let pipeline = FeaturePipeline::default();
    let report = pipeline.execute(&volatile_klines(300), None).unwrap();

    assert_eq!(report.table.len(), 281);
    assert!(report.volatility_warning.is_none(), "{:?}", report.volatility_warning);

    let dataset = pipeline.prepare_training_data(&report).unwrap();
    assert_eq!(dataset.len(), 278);
    assert_eq!(dataset.features.ncols(), FEATURE_NAMES.len());
    assert!(dataset.features.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(dataset.labels.iter().all(|y| *y <= 1));
    assert_eq!(dataset.index[0], report.table.index()[0]);
}

#[test]
fn test_persisted_table_round_trips() {
    let dir = tempdir().unwrap();
    let store = ProcessedDataStore::new(dir.path());
    let pipeline = FeaturePipeline::new(
        FeatureDeriver::default(),
        VolatilityEstimator::default(),
        TrainingSetBuilder::default(),
        Some(store.clone()),
    );

    let report = pipeline
        .execute(&rising_klines(40), Some("../BTCUSDT_1h.csv"))
        .unwrap();

    assert_eq!(report.stage, PipelineStage::Persisted);
    let path = report.persisted.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(path, &dir.path().join("BTCUSDT_1h.csv"));

    let loaded = store.load("BTCUSDT_1h.csv").unwrap();
    assert_eq!(loaded.index(), report.table.index());
    assert_eq!(loaded.column(CLOSE), report.table.column(CLOSE));
    assert_eq!(
        loaded.column_names().collect::<Vec<_>>(),
        report.table.column_names().collect::<Vec<_>>()
    );
}

#[test]
fn test_invalid_destination_keeps_result() {
    let dir = tempdir().unwrap();
    let pipeline = FeaturePipeline::new(
        FeatureDeriver::default(),
        VolatilityEstimator::default(),
        TrainingSetBuilder::default(),
        Some(ProcessedDataStore::new(dir.path())),
    );

    let report = pipeline.execute(&rising_klines(30), Some("..")).unwrap();
    assert_eq!(report.stage, PipelineStage::VolatilityEstimated);
    assert!(matches!(report.persisted, Some(Err(_))));
    assert_eq!(report.table.len(), 11);
}

#[tokio::test]
async fn test_process_symbol_uses_source() {
    let source = StaticSource {
        klines: rising_klines(30),
        calls: Mutex::new(Vec::new()),
    };

    let report = FeaturePipeline::default()
        .process_symbol(&source, "BTCUSDT", "1h", 2, None)
        .await
        .unwrap();

    assert_eq!(report.table.len(), 11);
    assert_eq!(
        source.calls.lock().unwrap().as_slice(),
        &[("BTCUSDT".to_string(), "1h".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_source_failure_halts_pipeline() {
    let err = FeaturePipeline::default()
        .process_symbol(&FailingSource, "ETHUSDT", "1h", 2, None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Source(_)));
    assert!(err.to_string().contains("ETHUSDT"));
}
