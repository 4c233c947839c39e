use chrono::{DateTime, Utc};
use learning_core::{MarketRegime, RegimeConfig, VolatilityLevel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trading days per year, used to annualize daily-return volatility
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Result of regime detection over one reference close series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeReading {
    pub regime: MarketRegime,
    pub volatility_level: VolatilityLevel,
    /// OLS slope normalized to cumulative drift over the window
    pub trend_strength: f64,
    /// Annualized standard deviation of day-over-day returns
    pub volatility: f64,
    /// Tiered approximation (20/50/80), not a true historical percentile
    pub volatility_percentile: f64,
    pub sample_size: usize,
    pub detected_at: DateTime<Utc>,
}

/// Classifies the market context a signal was issued into.
/// Never fails; short or unusable series degrade to `Unknown` defaults.
pub struct RegimeDetector {
    config: RegimeConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Detect regime and volatility tier from a trailing close series
    /// ending at `as_of`, oldest first.
    pub fn detect(&self, closes: &[f64], as_of: DateTime<Utc>) -> RegimeReading {
        let usable: Vec<f64> = closes
            .iter()
            .copied()
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();

        if usable.len() < self.config.min_price_points {
            debug!(
                points = usable.len(),
                needed = self.config.min_price_points,
                %as_of,
                "insufficient reference closes, regime unknown"
            );
            return RegimeReading {
                regime: MarketRegime::Unknown,
                volatility_level: VolatilityLevel::Medium,
                trend_strength: 0.0,
                volatility: 0.0,
                volatility_percentile: 50.0,
                sample_size: usable.len(),
                detected_at: Utc::now(),
            };
        }

        let trend_strength = trend_strength(&usable);
        let volatility = annualized_volatility(&usable);
        let (volatility_level, volatility_percentile) = self.volatility_tier(volatility);

        let regime = if trend_strength > self.config.bull_threshold {
            MarketRegime::Bull
        } else if trend_strength < self.config.bear_threshold {
            MarketRegime::Bear
        } else {
            MarketRegime::Sideways
        };

        RegimeReading {
            regime,
            volatility_level,
            trend_strength,
            volatility,
            volatility_percentile,
            sample_size: usable.len(),
            detected_at: Utc::now(),
        }
    }

    /// Fixed 3-tier volatility mapping. An explicit approximation of a
    /// percentile rank; see the band thresholds in `RegimeConfig`.
    fn volatility_tier(&self, volatility: f64) -> (VolatilityLevel, f64) {
        if volatility < self.config.low_volatility_band {
            (VolatilityLevel::Low, 20.0)
        } else if volatility <= self.config.high_volatility_band {
            (VolatilityLevel::Medium, 50.0)
        } else {
            (VolatilityLevel::High, 80.0)
        }
    }
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self::new(RegimeConfig::default())
    }
}

/// Least-squares slope of close against sequence index, normalized by
/// `slope * n / mean` into a dimensionless cumulative-drift estimate.
fn trend_strength(closes: &[f64]) -> f64 {
    let n = closes.len() as f64;

    let sum_x: f64 = (0..closes.len()).map(|i| i as f64).sum();
    let sum_y: f64 = closes.iter().sum();
    let sum_xy: f64 = closes.iter().enumerate().map(|(i, c)| i as f64 * c).sum();
    let sum_x2: f64 = (0..closes.len()).map(|i| (i * i) as f64).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let mean = sum_y / n;

    slope * n / mean
}

/// Standard deviation of day-over-day simple returns, annualized by sqrt(252)
fn annualized_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / returns.len() as f64;

    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(closes: &[f64]) -> RegimeReading {
        RegimeDetector::default().detect(closes, Utc::now())
    }

    #[test]
    fn strong_uptrend_reads_bull() {
        // ~45% cumulative gain over 30 days
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 1.5).collect();
        let reading = detect(&closes);

        assert_eq!(reading.regime, MarketRegime::Bull);
        assert!(reading.trend_strength > 0.3);
    }

    #[test]
    fn strong_downtrend_reads_bear() {
        let closes: Vec<f64> = (0..30).map(|i| 150.0 - i as f64 * 1.5).collect();
        let reading = detect(&closes);

        assert_eq!(reading.regime, MarketRegime::Bear);
        assert!(reading.trend_strength < -0.3);
    }

    #[test]
    fn flat_noisy_series_reads_sideways() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        let reading = detect(&closes);

        assert_eq!(reading.regime, MarketRegime::Sideways);
        assert!(reading.trend_strength.abs() < 0.3);
    }

    #[test]
    fn short_series_degrades_to_unknown() {
        let closes: Vec<f64> = (0..9).map(|i| 100.0 + i as f64).collect();
        let reading = detect(&closes);

        assert_eq!(reading.regime, MarketRegime::Unknown);
        assert_eq!(reading.volatility_level, VolatilityLevel::Medium);
        assert_eq!(reading.trend_strength, 0.0);
        assert_eq!(reading.volatility_percentile, 50.0);
    }

    #[test]
    fn empty_series_degrades_to_unknown() {
        let reading = detect(&[]);
        assert_eq!(reading.regime, MarketRegime::Unknown);
    }

    #[test]
    fn nonpositive_closes_are_ignored() {
        // 30 points but only 5 usable
        let mut closes = vec![0.0; 25];
        closes.extend((0..5).map(|i| 100.0 + i as f64));
        let reading = detect(&closes);

        assert_eq!(reading.regime, MarketRegime::Unknown);
        assert_eq!(reading.sample_size, 5);
    }

    #[test]
    fn zero_variance_series_is_low_volatility() {
        let closes = vec![100.0; 30];
        let reading = detect(&closes);

        assert_eq!(reading.volatility, 0.0);
        assert_eq!(reading.volatility_level, VolatilityLevel::Low);
        assert_eq!(reading.volatility_percentile, 20.0);
        assert_eq!(reading.regime, MarketRegime::Sideways);
    }

    #[test]
    fn volatility_tiers_follow_bands() {
        let detector = RegimeDetector::default();

        assert_eq!(detector.volatility_tier(0.10).0, VolatilityLevel::Low);
        assert_eq!(detector.volatility_tier(0.20).0, VolatilityLevel::Medium);
        assert_eq!(detector.volatility_tier(0.30).0, VolatilityLevel::High);
    }
}
