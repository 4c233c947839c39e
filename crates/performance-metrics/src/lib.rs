//! Read-only reporting path over persisted outcomes.
//!
//! Safe to call concurrently with itself and with an in-progress ingestion
//! run; it only ever reads committed Outcome rows.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use learning_core::{
    ConditionPerformance, IndicatorPerformance, LearningError, Outcome, OutcomeRepository,
    OutcomeType, PerformanceMetricsReport,
};
use tracing::debug;

#[derive(Default)]
struct IndicatorAccumulator {
    total: u32,
    wins: u32,
    losses: u32,
    correlation_sum: f64,
}

#[derive(Default)]
struct ConditionAccumulator {
    total: u32,
    wins: u32,
    losses: u32,
}

pub struct MetricsAggregator<S: OutcomeRepository> {
    store: Arc<S>,
}

impl<S: OutcomeRepository> MetricsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Aggregate outcomes created within the trailing `window_days`.
    ///
    /// An empty window is a typed `NoData` error, never a report with NaN
    /// fields.
    pub async fn performance_metrics(
        &self,
        window_days: i64,
    ) -> Result<PerformanceMetricsReport, LearningError> {
        let cutoff = Utc::now() - Duration::days(window_days);
        let outcomes = self.store.outcomes_since(cutoff).await?;

        if outcomes.is_empty() {
            debug!(window_days, "no outcomes in window");
            return Err(LearningError::NoData);
        }

        let total = outcomes.len();
        let wins = count(&outcomes, OutcomeType::Win);
        let losses = count(&outcomes, OutcomeType::Loss);

        let pnl_values: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| o.profit_loss_percentage)
            .collect();
        let avg_profit_loss_percentage = if pnl_values.is_empty() {
            0.0
        } else {
            pnl_values.iter().sum::<f64>() / pnl_values.len() as f64
        };

        Ok(PerformanceMetricsReport {
            window_days,
            total_signals: total,
            wins,
            losses,
            win_rate: wins as f64 / total as f64 * 100.0,
            avg_profit_loss_percentage,
            indicator_performance: indicator_performance(&outcomes),
            market_condition_performance: condition_performance(&outcomes),
            generated_at: Utc::now(),
        })
    }
}

fn count(outcomes: &[Outcome], outcome_type: OutcomeType) -> usize {
    outcomes
        .iter()
        .filter(|o| o.outcome_type == outcome_type)
        .count()
}

/// Accumulate per-indicator stats across every outcome's accuracy map
fn indicator_performance(outcomes: &[Outcome]) -> HashMap<String, IndicatorPerformance> {
    let mut accumulators: HashMap<String, IndicatorAccumulator> = HashMap::new();

    for outcome in outcomes {
        for (key, reading) in &outcome.indicator_accuracy {
            let acc = accumulators.entry(key.clone()).or_default();
            acc.total += 1;
            match outcome.outcome_type {
                OutcomeType::Win => acc.wins += 1,
                OutcomeType::Loss => acc.losses += 1,
                OutcomeType::Breakeven | OutcomeType::Expired => {}
            }
            acc.correlation_sum += reading.outcome_correlation;
        }
    }

    accumulators
        .into_iter()
        .map(|(key, acc)| {
            (
                key,
                IndicatorPerformance {
                    total: acc.total,
                    wins: acc.wins,
                    losses: acc.losses,
                    win_rate: acc.wins as f64 / acc.total as f64 * 100.0,
                    avg_correlation: acc.correlation_sum / acc.total as f64,
                },
            )
        })
        .collect()
}

/// Bucket outcomes by regime and by volatility tier separately
fn condition_performance(outcomes: &[Outcome]) -> HashMap<String, ConditionPerformance> {
    let mut accumulators: HashMap<String, ConditionAccumulator> = HashMap::new();

    for outcome in outcomes {
        let conditions = &outcome.market_conditions;
        let buckets = [
            conditions.regime.as_str().to_string(),
            conditions.volatility_level.bucket_key(),
        ];

        for bucket in buckets {
            let acc = accumulators.entry(bucket).or_default();
            acc.total += 1;
            match outcome.outcome_type {
                OutcomeType::Win => acc.wins += 1,
                OutcomeType::Loss => acc.losses += 1,
                OutcomeType::Breakeven | OutcomeType::Expired => {}
            }
        }
    }

    accumulators
        .into_iter()
        .map(|(bucket, acc)| {
            (
                bucket,
                ConditionPerformance {
                    total: acc.total,
                    wins: acc.wins,
                    losses: acc.losses,
                    win_rate: acc.wins as f64 / acc.total as f64 * 100.0,
                },
            )
        })
        .collect()
}
