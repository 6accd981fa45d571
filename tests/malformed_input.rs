use klinelab::application::pipeline::FeaturePipeline;
use klinelab::domain::errors::{NormalizationError, PipelineError};
use klinelab::domain::market::kline::{CLOSE, RawKline};
use klinelab::domain::ml::feature_registry::LOG_RETURN;
use serde_json::{Value, json};

fn kline(t: i64, close: Value) -> RawKline {
    vec![
        json!(t),
        json!("10.0"),
        json!("11.0"),
        json!("9.0"),
        close,
        json!("5.0"),
        json!(t + 59_999),
        json!("50.0"),
        json!(7),
        json!("2.0"),
        json!("20.0"),
        json!("0"),
    ]
}

fn klines(n: usize) -> Vec<RawKline> {
    (0..n)
        .map(|i| kline(i as i64 * 60_000, json!(format!("{}", 10.0 + (i % 5) as f64))))
        .collect()
}

#[test]
fn test_unparseable_close_drops_only_affected_rows() {
    let mut rows = klines(40);
    rows[30][4] = json!("not-a-number");

    let report = FeaturePipeline::default().execute(&rows, None).unwrap();
    let table = &report.table;

    // Row 30 lacks close, row 31 lacks its return, and both SMA windows
    // containing row 30 (rows 30..=49) are undefined.
    assert!(table.index().iter().all(|t| *t < 30 * 60_000));
    assert_eq!(table.len(), 11);
    assert!(table.column(CLOSE).unwrap().iter().all(Option::is_some));
    assert!(table.column(LOG_RETURN).unwrap().iter().all(Option::is_some));
}

#[test]
fn test_short_row_names_offending_index() {
    let mut rows = klines(5);
    rows[3].truncate(6);

    match FeaturePipeline::default().execute(&rows, None) {
        Err(PipelineError::Normalization(NormalizationError::FieldCount {
            row, expected, found,
        })) => {
            assert_eq!((row, expected, found), (3, 12, 6));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_empty_input_is_an_empty_result() {
    let report = FeaturePipeline::default().execute(&[], None).unwrap();
    assert!(report.table.is_empty());
    assert!(report.volatility_warning.is_some());
}
