pub mod classifier;
pub mod correlation;
pub mod ingestor;
pub mod scoring;

pub use classifier::classify;
pub use correlation::{IndicatorCorrelationAnalyzer, IndicatorFamily};
pub use ingestor::OutcomeIngestor;
pub use scoring::{holding_period_hours, prediction_accuracy, quality_score};
