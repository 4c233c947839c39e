//! In-memory record store.
//!
//! The injected fake for tests and local runs: same trait surface and the
//! same one-Outcome-per-signal invariant as the SQLite store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learning_core::{
    ClosedPosition, IndicatorReader, IndicatorSnapshot, LearningError, Outcome, OutcomeInsert,
    OutcomeRepository, PositionReader, PriceSeriesReader, Signal, SignalReader,
};

#[derive(Default)]
struct Inner {
    signals: HashMap<i64, Signal>,
    positions: Vec<ClosedPosition>,
    snapshots: HashMap<i64, Vec<IndicatorSnapshot>>,
    closes: HashMap<String, Vec<f64>>,
    outcomes: HashMap<i64, Outcome>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_signal(&self, signal: Signal) {
        let mut inner = self.inner.lock().unwrap();
        inner.signals.insert(signal.id, signal);
    }

    pub fn add_position(&self, position: ClosedPosition) {
        self.inner.lock().unwrap().positions.push(position);
    }

    pub fn add_snapshot(&self, snapshot: IndicatorSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .snapshots
            .entry(snapshot.signal_id)
            .or_default()
            .push(snapshot);
    }

    pub fn set_closes(&self, ticker: &str, closes: Vec<f64>) {
        let mut inner = self.inner.lock().unwrap();
        inner.closes.insert(ticker.to_string(), closes);
    }

    pub fn outcome_count(&self) -> usize {
        self.inner.lock().unwrap().outcomes.len()
    }

    pub fn outcome_for_signal(&self, signal_id: i64) -> Option<Outcome> {
        self.inner.lock().unwrap().outcomes.get(&signal_id).cloned()
    }
}

#[async_trait]
impl SignalReader for MemoryRecordStore {
    async fn signal_by_id(&self, id: i64) -> Result<Option<Signal>, LearningError> {
        Ok(self.inner.lock().unwrap().signals.get(&id).cloned())
    }
}

#[async_trait]
impl PositionReader for MemoryRecordStore {
    async fn closed_linked_positions(&self) -> Result<Vec<ClosedPosition>, LearningError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .positions
            .iter()
            .filter(|p| !p.is_open && p.signal_id.is_some())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IndicatorReader for MemoryRecordStore {
    async fn snapshots_for_signal(
        &self,
        signal_id: i64,
    ) -> Result<Vec<IndicatorSnapshot>, LearningError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .snapshots
            .get(&signal_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PriceSeriesReader for MemoryRecordStore {
    async fn trailing_closes(
        &self,
        ticker: &str,
        _as_of: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<f64>, LearningError> {
        let inner = self.inner.lock().unwrap();
        let closes = inner.closes.get(ticker).cloned().unwrap_or_default();
        let window = days.max(0) as usize;
        let start = closes.len().saturating_sub(window);
        Ok(closes[start..].to_vec())
    }
}

#[async_trait]
impl OutcomeRepository for MemoryRecordStore {
    async fn tracked_signal_ids(&self) -> Result<HashSet<i64>, LearningError> {
        Ok(self.inner.lock().unwrap().outcomes.keys().copied().collect())
    }

    async fn insert_outcome(&self, outcome: &Outcome) -> Result<OutcomeInsert, LearningError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.outcomes.contains_key(&outcome.signal_id) {
            return Ok(OutcomeInsert::AlreadyTracked);
        }
        inner.outcomes.insert(outcome.signal_id, outcome.clone());
        Ok(OutcomeInsert::Inserted)
    }

    async fn outcomes_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Outcome>, LearningError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .outcomes
            .values()
            .filter(|o| o.created_at >= cutoff)
            .cloned()
            .collect())
    }
}
