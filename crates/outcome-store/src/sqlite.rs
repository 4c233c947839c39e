//! SQLite-backed record store.
//!
//! Upstream subsystems own the signal, position, snapshot, and close tables;
//! this store only reads them. Outcomes are the one table this pipeline
//! writes, with `UNIQUE(signal_id)` as the idempotency backstop.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use learning_core::{
    ClosedPosition, IndicatorReader, IndicatorReading, IndicatorSnapshot, LearningError,
    MarketConditions, Outcome, OutcomeInsert, OutcomeRepository, OutcomeType, PositionReader,
    PriceSeriesReader, Signal, SignalReader,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY,
    ticker TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    confidence_score REAL NOT NULL,
    timeframe TEXT NOT NULL,
    entry_price REAL,
    stop_loss REAL,
    target_price REAL,
    sector TEXT,
    market TEXT,
    created_at TEXT NOT NULL,
    timeframe_scores TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    signal_id INTEGER,
    ticker TEXT NOT NULL,
    quantity REAL NOT NULL,
    entry_price REAL NOT NULL,
    exit_price REAL,
    profit_loss REAL,
    profit_loss_percentage REAL,
    is_open INTEGER NOT NULL DEFAULT 1,
    opened_at TEXT NOT NULL,
    closed_at TEXT
);

CREATE TABLE IF NOT EXISTS indicator_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signal_id INTEGER NOT NULL,
    indicator_name TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    raw_value REAL,
    score_contribution REAL NOT NULL DEFAULT 0,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_snapshots_signal ON indicator_snapshots(signal_id);

CREATE TABLE IF NOT EXISTS daily_closes (
    ticker TEXT NOT NULL,
    close_date TEXT NOT NULL,
    close REAL NOT NULL,
    PRIMARY KEY (ticker, close_date)
);

CREATE TABLE IF NOT EXISTS outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signal_id INTEGER NOT NULL UNIQUE,
    user_id INTEGER NOT NULL,
    outcome_type TEXT NOT NULL,
    entry_price REAL NOT NULL,
    exit_price REAL,
    profit_loss REAL,
    profit_loss_percentage REAL,
    holding_period_hours REAL NOT NULL DEFAULT 0,
    actual_vs_predicted_score REAL NOT NULL,
    indicator_accuracy TEXT NOT NULL DEFAULT '{}',
    market_conditions TEXT NOT NULL,
    signal_created_at TEXT NOT NULL,
    trade_executed_at TEXT NOT NULL,
    trade_closed_at TEXT,
    learning_version TEXT NOT NULL,
    quality_score REAL NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outcomes_created ON outcomes(created_at)
"#;

fn db_err(e: sqlx::Error) -> LearningError {
    LearningError::Database(e.to_string())
}

fn parse_ts(raw: &str, column: &str) -> Result<DateTime<Utc>, LearningError> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| LearningError::InvalidData(format!("{column}: {e}")))
}

#[derive(Debug, FromRow)]
struct SignalRow {
    id: i64,
    ticker: String,
    signal_type: String,
    confidence_score: f64,
    timeframe: String,
    entry_price: Option<f64>,
    stop_loss: Option<f64>,
    target_price: Option<f64>,
    sector: Option<String>,
    market: Option<String>,
    created_at: String,
    timeframe_scores: String,
}

impl SignalRow {
    fn into_signal(self) -> Result<Signal, LearningError> {
        let timeframe_scores: HashMap<String, f64> = serde_json::from_str(&self.timeframe_scores)
            .map_err(|e| LearningError::InvalidData(format!("timeframe_scores: {e}")))?;

        Ok(Signal {
            id: self.id,
            ticker: self.ticker,
            signal_type: self.signal_type,
            confidence_score: self.confidence_score,
            timeframe: self.timeframe,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            target_price: self.target_price,
            sector: self.sector,
            market: self.market,
            created_at: parse_ts(&self.created_at, "signals.created_at")?,
            timeframe_scores,
        })
    }
}

#[derive(Debug, FromRow)]
struct PositionRow {
    id: i64,
    user_id: i64,
    signal_id: Option<i64>,
    ticker: String,
    quantity: f64,
    entry_price: f64,
    exit_price: Option<f64>,
    profit_loss: Option<f64>,
    profit_loss_percentage: Option<f64>,
    is_open: bool,
    opened_at: String,
    closed_at: Option<String>,
}

impl PositionRow {
    fn into_position(self) -> Result<ClosedPosition, LearningError> {
        Ok(ClosedPosition {
            id: self.id,
            user_id: self.user_id,
            signal_id: self.signal_id,
            ticker: self.ticker,
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            profit_loss: self.profit_loss,
            profit_loss_percentage: self.profit_loss_percentage,
            is_open: self.is_open,
            opened_at: parse_ts(&self.opened_at, "positions.opened_at")?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|raw| parse_ts(raw, "positions.closed_at"))
                .transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    signal_id: i64,
    indicator_name: String,
    timeframe: String,
    raw_value: Option<f64>,
    score_contribution: f64,
    metadata: Option<String>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<IndicatorSnapshot, LearningError> {
        let metadata = match self.metadata.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)
                .map_err(|e| LearningError::InvalidData(format!("snapshot metadata: {e}")))?,
            _ => serde_json::Map::new(),
        };

        Ok(IndicatorSnapshot {
            signal_id: self.signal_id,
            indicator_name: self.indicator_name,
            timeframe: self.timeframe,
            raw_value: self.raw_value,
            score_contribution: self.score_contribution,
            metadata,
        })
    }
}

#[derive(Debug, FromRow)]
struct OutcomeRow {
    signal_id: i64,
    user_id: i64,
    outcome_type: String,
    entry_price: f64,
    exit_price: Option<f64>,
    profit_loss: Option<f64>,
    profit_loss_percentage: Option<f64>,
    holding_period_hours: f64,
    actual_vs_predicted_score: f64,
    indicator_accuracy: String,
    market_conditions: String,
    signal_created_at: String,
    trade_executed_at: String,
    trade_closed_at: Option<String>,
    learning_version: String,
    quality_score: f64,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl OutcomeRow {
    fn into_outcome(self) -> Result<Outcome, LearningError> {
        let indicator_accuracy: HashMap<String, IndicatorReading> =
            serde_json::from_str(&self.indicator_accuracy)
                .map_err(|e| LearningError::InvalidData(format!("indicator_accuracy: {e}")))?;
        let market_conditions: MarketConditions = serde_json::from_str(&self.market_conditions)
            .map_err(|e| LearningError::InvalidData(format!("market_conditions: {e}")))?;

        Ok(Outcome {
            signal_id: self.signal_id,
            user_id: self.user_id,
            outcome_type: OutcomeType::from_str_tag(&self.outcome_type),
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            profit_loss: self.profit_loss,
            profit_loss_percentage: self.profit_loss_percentage,
            holding_period_hours: self.holding_period_hours,
            actual_vs_predicted_score: self.actual_vs_predicted_score,
            indicator_accuracy,
            market_conditions,
            signal_created_at: parse_ts(&self.signal_created_at, "outcomes.signal_created_at")?,
            trade_executed_at: parse_ts(&self.trade_executed_at, "outcomes.trade_executed_at")?,
            trade_closed_at: self
                .trade_closed_at
                .as_deref()
                .map(|raw| parse_ts(raw, "outcomes.trade_closed_at"))
                .transpose()?,
            learning_version: self.learning_version,
            quality_score: self.quality_score,
            notes: self.notes,
            created_at: parse_ts(&self.created_at, "outcomes.created_at")?,
            updated_at: parse_ts(&self.updated_at, "outcomes.updated_at")?,
        })
    }
}

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) and initialize the schema
    pub async fn connect(database_url: &str) -> Result<Self, LearningError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| LearningError::Connectivity(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute the embedded schema statement by statement
    /// (sqlx does not run multi-statement queries)
    pub async fn init_schema(&self) -> Result<(), LearningError> {
        for statement in SCHEMA.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }
        debug!("record store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl SignalReader for SqliteRecordStore {
    async fn signal_by_id(&self, id: i64) -> Result<Option<Signal>, LearningError> {
        let row: Option<SignalRow> = sqlx::query_as("SELECT * FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(SignalRow::into_signal).transpose()
    }
}

#[async_trait]
impl PositionReader for SqliteRecordStore {
    async fn closed_linked_positions(&self) -> Result<Vec<ClosedPosition>, LearningError> {
        let rows: Vec<PositionRow> = sqlx::query_as(
            r#"
            SELECT * FROM positions
            WHERE is_open = 0 AND signal_id IS NOT NULL
            ORDER BY closed_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(PositionRow::into_position).collect()
    }
}

#[async_trait]
impl IndicatorReader for SqliteRecordStore {
    async fn snapshots_for_signal(
        &self,
        signal_id: i64,
    ) -> Result<Vec<IndicatorSnapshot>, LearningError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT signal_id, indicator_name, timeframe, raw_value, score_contribution, metadata
            FROM indicator_snapshots
            WHERE signal_id = ?
            "#,
        )
        .bind(signal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }
}

#[async_trait]
impl PriceSeriesReader for SqliteRecordStore {
    async fn trailing_closes(
        &self,
        ticker: &str,
        as_of: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<f64>, LearningError> {
        let start = (as_of - Duration::days(days)).date_naive().to_string();
        let end = as_of.date_naive().to_string();

        let rows: Vec<(f64,)> = sqlx::query_as(
            r#"
            SELECT close FROM daily_closes
            WHERE ticker = ? AND close_date > ? AND close_date <= ?
            ORDER BY close_date ASC
            "#,
        )
        .bind(ticker)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(|(close,)| close).collect())
    }
}

#[async_trait]
impl OutcomeRepository for SqliteRecordStore {
    async fn tracked_signal_ids(&self) -> Result<HashSet<i64>, LearningError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT signal_id FROM outcomes")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_outcome(&self, outcome: &Outcome) -> Result<OutcomeInsert, LearningError> {
        let indicator_accuracy = serde_json::to_string(&outcome.indicator_accuracy)
            .map_err(|e| LearningError::InvalidData(e.to_string()))?;
        let market_conditions = serde_json::to_string(&outcome.market_conditions)
            .map_err(|e| LearningError::InvalidData(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO outcomes (
                signal_id, user_id, outcome_type, entry_price, exit_price,
                profit_loss, profit_loss_percentage, holding_period_hours,
                actual_vs_predicted_score, indicator_accuracy, market_conditions,
                signal_created_at, trade_executed_at, trade_closed_at,
                learning_version, quality_score, notes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(signal_id) DO NOTHING
            "#,
        )
        .bind(outcome.signal_id)
        .bind(outcome.user_id)
        .bind(outcome.outcome_type.as_str())
        .bind(outcome.entry_price)
        .bind(outcome.exit_price)
        .bind(outcome.profit_loss)
        .bind(outcome.profit_loss_percentage)
        .bind(outcome.holding_period_hours)
        .bind(outcome.actual_vs_predicted_score)
        .bind(indicator_accuracy)
        .bind(market_conditions)
        .bind(outcome.signal_created_at.to_rfc3339())
        .bind(outcome.trade_executed_at.to_rfc3339())
        .bind(outcome.trade_closed_at.map(|ts| ts.to_rfc3339()))
        .bind(&outcome.learning_version)
        .bind(outcome.quality_score)
        .bind(&outcome.notes)
        .bind(outcome.created_at.to_rfc3339())
        .bind(outcome.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            Ok(OutcomeInsert::AlreadyTracked)
        } else {
            Ok(OutcomeInsert::Inserted)
        }
    }

    async fn outcomes_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Outcome>, LearningError> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            r#"
            SELECT
                signal_id, user_id, outcome_type, entry_price, exit_price,
                profit_loss, profit_loss_percentage, holding_period_hours,
                actual_vs_predicted_score, indicator_accuracy, market_conditions,
                signal_created_at, trade_executed_at, trade_closed_at,
                learning_version, quality_score, notes, created_at, updated_at
            FROM outcomes
            WHERE created_at >= ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(OutcomeRow::into_outcome).collect()
    }
}
