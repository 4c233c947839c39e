use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Realized result of acting on a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Win,
    Loss,
    Breakeven,
    /// Position closed without a usable P&L percentage
    Expired,
}

impl OutcomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeType::Win => "win",
            OutcomeType::Loss => "loss",
            OutcomeType::Breakeven => "breakeven",
            OutcomeType::Expired => "expired",
        }
    }

    pub fn from_str_tag(tag: &str) -> Self {
        match tag {
            "win" => OutcomeType::Win,
            "loss" => OutcomeType::Loss,
            "breakeven" => OutcomeType::Breakeven,
            _ => OutcomeType::Expired,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, OutcomeType::Win)
    }
}

/// Coarse market-trend classification around signal creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Bear,
    Sideways,
    /// Unable to classify (insufficient data)
    Unknown,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Bull => "bull",
            MarketRegime::Bear => "bear",
            MarketRegime::Sideways => "sideways",
            MarketRegime::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

impl VolatilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolatilityLevel::Low => "low",
            VolatilityLevel::Medium => "medium",
            VolatilityLevel::High => "high",
        }
    }

    /// Bucket key used by market-condition performance reports
    pub fn bucket_key(&self) -> String {
        format!("volatility_{}", self.as_str())
    }
}

/// Trading signal header, produced upstream by signal generation.
/// Read-only to this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub ticker: String,
    pub signal_type: String,
    /// Stated confidence, 0-100
    pub confidence_score: f64,
    pub timeframe: String,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target_price: Option<f64>,
    pub sector: Option<String>,
    pub market: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Per-timeframe score map embedded by the scorer
    #[serde(default)]
    pub timeframe_scores: HashMap<String, f64>,
}

/// Trade record produced upstream by the execution subsystem.
/// Only rows with `is_open = false` and a linked signal feed this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub id: i64,
    pub user_id: i64,
    pub signal_id: Option<i64>,
    pub ticker: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub profit_loss: Option<f64>,
    pub profit_loss_percentage: Option<f64>,
    pub is_open: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One indicator reading captured when a signal was generated,
/// one row per indicator x timeframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub signal_id: i64,
    pub indicator_name: String,
    pub timeframe: String,
    pub raw_value: Option<f64>,
    pub score_contribution: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl IndicatorSnapshot {
    /// Key under which this snapshot is tracked across outcomes
    pub fn accuracy_key(&self) -> String {
        format!("{}_{}", self.indicator_name, self.timeframe)
    }
}

/// Per-indicator entry of an Outcome's accuracy map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub raw_value: Option<f64>,
    pub score_contribution: f64,
    /// Heuristic correlation with the realized outcome, always in [0, 1]
    pub outcome_correlation: f64,
    /// Open extension map for family-specific fields
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Market context the signal was issued into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConditions {
    pub regime: MarketRegime,
    pub volatility_level: VolatilityLevel,
    pub trend_strength: f64,
    /// Tiered approximation, not a true historical percentile
    pub volatility_percentile: f64,
    pub ticker: String,
    pub sector: Option<String>,
    pub detected_at: DateTime<Utc>,
}

/// Derived record linking one signal's prediction to its realized result.
/// Written exactly once per signal, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub signal_id: i64,
    pub user_id: i64,
    pub outcome_type: OutcomeType,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub profit_loss: Option<f64>,
    pub profit_loss_percentage: Option<f64>,
    pub holding_period_hours: f64,
    /// How well stated confidence matched reality, 0-100
    pub actual_vs_predicted_score: f64,
    /// Keyed by `{indicator_name}_{timeframe}`
    pub indicator_accuracy: HashMap<String, IndicatorReading>,
    pub market_conditions: MarketConditions,
    pub signal_created_at: DateTime<Utc>,
    pub trade_executed_at: DateTime<Utc>,
    pub trade_closed_at: Option<DateTime<Utc>>,
    /// Schema-evolution tag
    pub learning_version: String,
    /// Data-completeness weight, 0-100
    pub quality_score: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub processed: usize,
    pub errors: Vec<String>,
}

/// Aggregated stats for one indicator key across outcomes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorPerformance {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_correlation: f64,
}

/// Aggregated stats for one market-condition bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionPerformance {
    pub total: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
}

/// On-demand performance report over a trailing window. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetricsReport {
    pub window_days: i64,
    pub total_signals: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage, 0-100
    pub win_rate: f64,
    pub avg_profit_loss_percentage: f64,
    pub indicator_performance: HashMap<String, IndicatorPerformance>,
    pub market_condition_performance: HashMap<String, ConditionPerformance>,
    pub generated_at: DateTime<Utc>,
}
