use std::sync::Arc;

use chrono::Utc;
use learning_core::{
    ClosedPosition, IngestionSummary, LearningConfig, LearningError, MarketConditions, Outcome,
    OutcomeInsert, RecordStore, Signal,
};
use regime_detector::RegimeDetector;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::correlation::IndicatorCorrelationAnalyzer;
use crate::scoring::{holding_period_hours, prediction_accuracy, quality_score};

/// Derives and persists one Outcome per newly closed, signal-linked trade.
///
/// The only writer of Outcome rows. Safe to re-run: the exclusion set is
/// snapshotted once per run and the store's signal_id uniqueness backstops
/// any race with another process.
pub struct OutcomeIngestor<S: RecordStore> {
    store: Arc<S>,
    analyzer: IndicatorCorrelationAnalyzer,
    detector: RegimeDetector,
    config: LearningConfig,
}

impl<S: RecordStore> OutcomeIngestor<S> {
    pub fn new(store: Arc<S>, config: LearningConfig) -> Self {
        let detector = RegimeDetector::new(config.regime.clone());
        Self {
            store,
            analyzer: IndicatorCorrelationAnalyzer::new(),
            detector,
            config,
        }
    }

    /// Process every closed position that does not yet have an Outcome.
    ///
    /// Per-record failures are collected into the summary's error list and
    /// never abort the run; only the two setup reads (candidate set and
    /// exclusion set) fail the run as a whole.
    pub async fn run(&self) -> Result<IngestionSummary, LearningError> {
        let positions = self
            .store
            .closed_linked_positions()
            .await
            .map_err(|e| LearningError::Connectivity(e.to_string()))?;

        let tracked = self
            .store
            .tracked_signal_ids()
            .await
            .map_err(|e| LearningError::Connectivity(e.to_string()))?;

        info!(
            candidates = positions.len(),
            tracked = tracked.len(),
            "outcome ingestion started"
        );

        let mut summary = IngestionSummary::default();

        for position in positions {
            let signal_id = match position.signal_id {
                Some(id) => id,
                None => continue,
            };
            if tracked.contains(&signal_id) {
                continue;
            }

            match self.process_position(&position, signal_id).await {
                Ok(OutcomeInsert::Inserted) => summary.processed += 1,
                Ok(OutcomeInsert::AlreadyTracked) => {
                    debug!(signal_id, "outcome already tracked, skipping");
                }
                Err(e) => {
                    warn!(position_id = position.id, signal_id, error = %e, "record skipped");
                    summary.errors.push(format!(
                        "position {} (signal {}): {}",
                        position.id, signal_id, e
                    ));
                }
            }
        }

        info!(
            processed = summary.processed,
            errors = summary.errors.len(),
            "outcome ingestion finished"
        );

        Ok(summary)
    }

    async fn process_position(
        &self,
        position: &ClosedPosition,
        signal_id: i64,
    ) -> Result<OutcomeInsert, LearningError> {
        let signal = self
            .store
            .signal_by_id(signal_id)
            .await?
            .ok_or_else(|| LearningError::MissingData(format!("signal {signal_id} not found")))?;

        let outcome = self.derive_outcome(position, &signal).await?;
        self.store.insert_outcome(&outcome).await
    }

    async fn derive_outcome(
        &self,
        position: &ClosedPosition,
        signal: &Signal,
    ) -> Result<Outcome, LearningError> {
        let outcome_type = classify(position.profit_loss_percentage, &self.config.classifier);

        let snapshots = self.store.snapshots_for_signal(signal.id).await?;
        let indicator_accuracy = self.analyzer.analyze(&snapshots, outcome_type);

        // A failed or short reference read is a degradation, not an error:
        // the detector falls back to unknown-regime defaults.
        let closes = match self
            .store
            .trailing_closes(
                &self.config.market_proxy_ticker,
                signal.created_at,
                self.config.regime.window_days,
            )
            .await
        {
            Ok(closes) => closes,
            Err(e) => {
                warn!(
                    ticker = %self.config.market_proxy_ticker,
                    signal_id = signal.id,
                    error = %e,
                    "reference close series unavailable"
                );
                Vec::new()
            }
        };
        let reading = self.detector.detect(&closes, signal.created_at);

        let holding_period = position
            .closed_at
            .map(|closed| holding_period_hours(position.opened_at, closed))
            .unwrap_or(0.0);

        let now = Utc::now();

        Ok(Outcome {
            signal_id: signal.id,
            user_id: position.user_id,
            outcome_type,
            entry_price: position.entry_price,
            exit_price: position.exit_price,
            profit_loss: position.profit_loss,
            profit_loss_percentage: position.profit_loss_percentage,
            holding_period_hours: holding_period,
            actual_vs_predicted_score: prediction_accuracy(signal.confidence_score, outcome_type),
            indicator_accuracy,
            market_conditions: MarketConditions {
                regime: reading.regime,
                volatility_level: reading.volatility_level,
                trend_strength: reading.trend_strength,
                volatility_percentile: reading.volatility_percentile,
                ticker: signal.ticker.clone(),
                sector: signal.sector.clone(),
                detected_at: reading.detected_at,
            },
            signal_created_at: signal.created_at,
            trade_executed_at: position.opened_at,
            trade_closed_at: position.closed_at,
            learning_version: self.config.learning_version.clone(),
            quality_score: quality_score(position, signal),
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }
}
