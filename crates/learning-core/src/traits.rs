use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{ClosedPosition, IndicatorSnapshot, LearningError, Outcome, Signal};

/// Result of attempting to persist an Outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeInsert {
    Inserted,
    /// An Outcome already exists for this signal_id; nothing was written
    AlreadyTracked,
}

/// Read access to signal headers
#[async_trait]
pub trait SignalReader: Send + Sync {
    async fn signal_by_id(&self, id: i64) -> Result<Option<Signal>, LearningError>;
}

/// Read access to closed trade records
#[async_trait]
pub trait PositionReader: Send + Sync {
    /// All positions with `is_open = false` and a non-null signal_id.
    /// Unlinked or still-open trades never reach the pipeline.
    async fn closed_linked_positions(&self) -> Result<Vec<ClosedPosition>, LearningError>;
}

/// Read access to per-signal indicator snapshots
#[async_trait]
pub trait IndicatorReader: Send + Sync {
    async fn snapshots_for_signal(
        &self,
        signal_id: i64,
    ) -> Result<Vec<IndicatorSnapshot>, LearningError>;
}

/// Read access to reference close series for regime detection
#[async_trait]
pub trait PriceSeriesReader: Send + Sync {
    /// Daily closes for `ticker` over the `days` calendar days ending at
    /// `as_of`, oldest first. May return fewer points than days.
    async fn trailing_closes(
        &self,
        ticker: &str,
        as_of: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<f64>, LearningError>;
}

/// Read/write access to derived Outcome records.
/// This pipeline is the only writer.
#[async_trait]
pub trait OutcomeRepository: Send + Sync {
    /// Signal ids that already have an Outcome (the exclusion set)
    async fn tracked_signal_ids(&self) -> Result<HashSet<i64>, LearningError>;

    /// Insert one Outcome. A signal_id conflict is not an error; it reports
    /// `AlreadyTracked` so callers treat it as already processed.
    async fn insert_outcome(&self, outcome: &Outcome) -> Result<OutcomeInsert, LearningError>;

    /// Outcomes created at or after `cutoff`
    async fn outcomes_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Outcome>, LearningError>;
}

/// Full record store as seen by the ingestor
pub trait RecordStore:
    SignalReader + PositionReader + IndicatorReader + PriceSeriesReader + OutcomeRepository
{
}

impl<T> RecordStore for T where
    T: SignalReader + PositionReader + IndicatorReader + PriceSeriesReader + OutcomeRepository
{
}
