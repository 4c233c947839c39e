use anyhow::{bail, Result};
use learning_core::LearningConfig;

/// Agent configuration, filled from the environment
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_url: String,
    pub run_interval_seconds: u64,
    /// Window used for the post-run metrics log line
    pub metrics_window_days: i64,
    pub learning: LearningConfig,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an unparsable value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = LearningConfig::default();

        let mut learning = LearningConfig {
            market_proxy_ticker: env_string("MARKET_PROXY_TICKER", &defaults.market_proxy_ticker),
            learning_version: env_string("LEARNING_VERSION", &defaults.learning_version),
            ..defaults
        };

        learning.classifier.win_threshold_pct = env_parse(
            "WIN_THRESHOLD_PCT",
            learning.classifier.win_threshold_pct,
        )?;
        learning.classifier.loss_threshold_pct = env_parse(
            "LOSS_THRESHOLD_PCT",
            learning.classifier.loss_threshold_pct,
        )?;
        learning.regime.bull_threshold =
            env_parse("BULL_TREND_THRESHOLD", learning.regime.bull_threshold)?;
        learning.regime.bear_threshold =
            env_parse("BEAR_TREND_THRESHOLD", learning.regime.bear_threshold)?;
        learning.regime.low_volatility_band =
            env_parse("LOW_VOLATILITY_BAND", learning.regime.low_volatility_band)?;
        learning.regime.high_volatility_band =
            env_parse("HIGH_VOLATILITY_BAND", learning.regime.high_volatility_band)?;

        let config = Self {
            database_url: env_string("LEARNING_DATABASE_URL", "sqlite:learning.db"),
            run_interval_seconds: env_parse("RUN_INTERVAL_SECONDS", 3600)?,
            metrics_window_days: env_parse("METRICS_WINDOW_DAYS", 30)?,
            learning,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.run_interval_seconds == 0 {
            bail!("RUN_INTERVAL_SECONDS must be positive");
        }
        if self.metrics_window_days <= 0 {
            bail!("METRICS_WINDOW_DAYS must be positive");
        }
        let learning = &self.learning;
        if learning.classifier.win_threshold_pct < learning.classifier.loss_threshold_pct {
            bail!("WIN_THRESHOLD_PCT must not be below LOSS_THRESHOLD_PCT");
        }
        if learning.regime.low_volatility_band > learning.regime.high_volatility_band {
            bail!("LOW_VOLATILITY_BAND must not exceed HIGH_VOLATILITY_BAND");
        }
        Ok(())
    }
}
