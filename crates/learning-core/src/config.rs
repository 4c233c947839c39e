use serde::{Deserialize, Serialize};

/// Outcome classification thresholds, in P&L percentage points.
/// The defaults are product decisions carried over as-is; their derivation
/// is undocumented upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub win_threshold_pct: f64,
    pub loss_threshold_pct: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            win_threshold_pct: 0.5,
            loss_threshold_pct: -0.5,
        }
    }
}

/// Regime-detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Normalized trend strength above which the window reads bull
    pub bull_threshold: f64,
    /// Normalized trend strength below which the window reads bear
    pub bear_threshold: f64,
    /// Annualized volatility below this is the low tier
    pub low_volatility_band: f64,
    /// Annualized volatility above this is the high tier
    pub high_volatility_band: f64,
    /// Fewer usable closes than this skips the math and reads unknown
    pub min_price_points: usize,
    /// Trailing calendar days of closes fed into detection
    pub window_days: i64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            bull_threshold: 0.3,
            bear_threshold: -0.3,
            low_volatility_band: 0.15,
            high_volatility_band: 0.25,
            min_price_points: 10,
            window_days: 30,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    /// Ticker whose close series proxies overall market context
    pub market_proxy_ticker: String,
    /// Tag stamped on every Outcome for schema evolution
    pub learning_version: String,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            regime: RegimeConfig::default(),
            market_proxy_ticker: "SPY".to_string(),
            learning_version: "v1".to_string(),
        }
    }
}
