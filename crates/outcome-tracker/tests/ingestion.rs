use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use learning_core::{
    ClosedPosition, IndicatorSnapshot, LearningConfig, MarketRegime, OutcomeType, Signal,
};
use outcome_store::MemoryRecordStore;
use outcome_tracker::OutcomeIngestor;

fn signal(id: i64, confidence: f64, created_at: DateTime<Utc>) -> Signal {
    Signal {
        id,
        ticker: "AAPL".to_string(),
        signal_type: "breakout".to_string(),
        confidence_score: confidence,
        timeframe: "1H".to_string(),
        entry_price: Some(100.0),
        stop_loss: Some(97.0),
        target_price: Some(108.0),
        sector: Some("Technology".to_string()),
        market: Some("NASDAQ".to_string()),
        created_at,
        timeframe_scores: HashMap::new(),
    }
}

fn position(
    id: i64,
    signal_id: Option<i64>,
    pnl_pct: Option<f64>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
) -> ClosedPosition {
    ClosedPosition {
        id,
        user_id: 7,
        signal_id,
        ticker: "AAPL".to_string(),
        quantity: 10.0,
        entry_price: 100.0,
        exit_price: Some(105.0),
        profit_loss: pnl_pct.map(|p| p * 10.0),
        profit_loss_percentage: pnl_pct,
        is_open: false,
        opened_at,
        closed_at,
    }
}

fn snapshot(signal_id: i64, name: &str, value: f64) -> IndicatorSnapshot {
    IndicatorSnapshot {
        signal_id,
        indicator_name: name.to_string(),
        timeframe: "1H".to_string(),
        raw_value: Some(value),
        score_contribution: 10.0,
        metadata: serde_json::Map::new(),
    }
}

fn rising_closes() -> Vec<f64> {
    (0..30).map(|i| 100.0 + i as f64 * 1.5).collect()
}

#[tokio::test]
async fn single_run_derives_the_expected_outcome() {
    let t0 = Utc::now() - Duration::days(2);
    let store = Arc::new(MemoryRecordStore::new());

    store.add_signal(signal(1, 82.0, t0));
    store.add_position(position(
        10,
        Some(1),
        Some(5.0),
        t0 + Duration::hours(1),
        Some(t0 + Duration::hours(9)),
    ));
    store.add_snapshot(snapshot(1, "RSI", 28.0));
    store.add_snapshot(snapshot(1, "MACD", 1.2));
    store.set_closes("SPY", rising_closes());

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), LearningConfig::default());
    let summary = ingestor.run().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert!(summary.errors.is_empty());

    let outcome = store.outcome_for_signal(1).expect("outcome recorded");
    assert_eq!(outcome.outcome_type, OutcomeType::Win);
    assert_eq!(outcome.holding_period_hours, 8.0);
    assert_eq!(outcome.actual_vs_predicted_score, 82.0);
    assert_eq!(outcome.indicator_accuracy["RSI_1H"].outcome_correlation, 0.8);
    assert_eq!(outcome.indicator_accuracy["MACD_1H"].outcome_correlation, 0.7);
    assert!(outcome.quality_score >= 70.0);
    assert_eq!(outcome.market_conditions.regime, MarketRegime::Bull);
    assert_eq!(outcome.market_conditions.ticker, "AAPL");
    assert_eq!(outcome.learning_version, "v1");
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let t0 = Utc::now() - Duration::days(2);
    let store = Arc::new(MemoryRecordStore::new());

    store.add_signal(signal(1, 82.0, t0));
    store.add_position(position(
        10,
        Some(1),
        Some(5.0),
        t0 + Duration::hours(1),
        Some(t0 + Duration::hours(9)),
    ));
    store.set_closes("SPY", rising_closes());

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), LearningConfig::default());

    let first = ingestor.run().await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(store.outcome_count(), 1);

    let second = ingestor.run().await.unwrap();
    assert_eq!(second.processed, 0);
    assert!(second.errors.is_empty());
    assert_eq!(store.outcome_count(), 1);
}

#[tokio::test]
async fn one_bad_record_does_not_abort_the_run() {
    let t0 = Utc::now() - Duration::days(2);
    let store = Arc::new(MemoryRecordStore::new());

    // Position 20 points at a signal that does not exist
    store.add_signal(signal(1, 60.0, t0));
    store.add_position(position(
        10,
        Some(1),
        Some(-3.0),
        t0,
        Some(t0 + Duration::hours(4)),
    ));
    store.add_position(position(20, Some(999), Some(2.0), t0, Some(t0)));
    store.set_closes("SPY", rising_closes());

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), LearningConfig::default());
    let summary = ingestor.run().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("999"));

    let outcome = store.outcome_for_signal(1).unwrap();
    assert_eq!(outcome.outcome_type, OutcomeType::Loss);
    assert!(store.outcome_for_signal(999).is_none());
}

#[tokio::test]
async fn missing_reference_series_degrades_to_unknown_regime() {
    let t0 = Utc::now() - Duration::days(2);
    let store = Arc::new(MemoryRecordStore::new());

    store.add_signal(signal(1, 75.0, t0));
    store.add_position(position(
        10,
        Some(1),
        Some(1.2),
        t0,
        Some(t0 + Duration::hours(2)),
    ));
    // No SPY closes seeded

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), LearningConfig::default());
    let summary = ingestor.run().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert!(summary.errors.is_empty());

    let outcome = store.outcome_for_signal(1).unwrap();
    assert_eq!(outcome.market_conditions.regime, MarketRegime::Unknown);
    assert_eq!(outcome.market_conditions.volatility_percentile, 50.0);
    assert_eq!(outcome.market_conditions.trend_strength, 0.0);
}

#[tokio::test]
async fn missing_pnl_percentage_reads_expired() {
    let t0 = Utc::now() - Duration::days(1);
    let store = Arc::new(MemoryRecordStore::new());

    store.add_signal(signal(1, 55.0, t0));
    store.add_position(position(10, Some(1), None, t0, None));
    store.set_closes("SPY", rising_closes());

    let ingestor = OutcomeIngestor::new(Arc::clone(&store), LearningConfig::default());
    let summary = ingestor.run().await.unwrap();

    assert_eq!(summary.processed, 1);

    let outcome = store.outcome_for_signal(1).unwrap();
    assert_eq!(outcome.outcome_type, OutcomeType::Expired);
    // No close timestamp, so no holding period
    assert_eq!(outcome.holding_period_hours, 0.0);
    assert_eq!(outcome.trade_closed_at, None);
}
