use std::collections::HashMap;

use learning_core::{IndicatorReading, IndicatorSnapshot, OutcomeType};

/// Correlation assigned when the heuristic has nothing to say
const NEUTRAL_CORRELATION: f64 = 0.5;

/// Indicator families with distinct correlation heuristics.
/// Family membership is derived from the indicator name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorFamily {
    /// Bounded 0-100 oscillators (RSI, stochastics, Williams %R)
    Oscillator,
    /// Signed momentum indicators (MACD, ROC)
    Momentum,
    /// Volume ratios relative to average
    VolumeRatio,
    Unknown,
}

impl IndicatorFamily {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("rsi") || name.contains("stoch") || name.contains("williams") {
            IndicatorFamily::Oscillator
        } else if name.contains("macd") || name.contains("momentum") || name.contains("roc") {
            IndicatorFamily::Momentum
        } else if name.contains("volume") {
            IndicatorFamily::VolumeRatio
        } else {
            IndicatorFamily::Unknown
        }
    }
}

/// Scores how predictive each indicator snapshot was for a realized outcome.
///
/// The heuristics are documented product rules, not learned weights: they
/// only differentiate on wins, and default to neutral 0.5 everywhere else.
pub struct IndicatorCorrelationAnalyzer;

impl IndicatorCorrelationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Build the `{indicator_name}_{timeframe}` accuracy map for one signal.
    /// Never fails; an empty snapshot set yields an empty map.
    pub fn analyze(
        &self,
        snapshots: &[IndicatorSnapshot],
        outcome: OutcomeType,
    ) -> HashMap<String, IndicatorReading> {
        snapshots
            .iter()
            .map(|snapshot| {
                let family = IndicatorFamily::from_name(&snapshot.indicator_name);
                let correlation = outcome_correlation(family, snapshot.raw_value, outcome);

                (
                    snapshot.accuracy_key(),
                    IndicatorReading {
                        raw_value: snapshot.raw_value,
                        score_contribution: snapshot.score_contribution,
                        outcome_correlation: correlation,
                        metadata: snapshot.metadata.clone(),
                    },
                )
            })
            .collect()
    }
}

impl Default for IndicatorCorrelationAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Family-specific correlation heuristic, always clamped into [0, 1]
fn outcome_correlation(
    family: IndicatorFamily,
    raw_value: Option<f64>,
    outcome: OutcomeType,
) -> f64 {
    let value = match raw_value {
        Some(v) if v.is_finite() => v,
        _ => return NEUTRAL_CORRELATION,
    };

    if !outcome.is_win() {
        return NEUTRAL_CORRELATION;
    }

    let correlation = match family {
        IndicatorFamily::Oscillator => {
            // Oversold readings that resolved into wins are the strongest
            // evidence the oscillator carried information
            if value < 30.0 {
                0.8
            } else if value <= 70.0 {
                0.6
            } else {
                0.3
            }
        }
        IndicatorFamily::Momentum => {
            if value > 0.0 {
                0.7
            } else {
                0.4
            }
        }
        IndicatorFamily::VolumeRatio => {
            if value > 1.5 {
                0.8
            } else if value > 1.0 {
                0.6
            } else {
                0.4
            }
        }
        IndicatorFamily::Unknown => NEUTRAL_CORRELATION,
    };

    correlation.clamp(0.0, 1.0)
}
