use learning_core::{ClassifierConfig, OutcomeType};

/// Map a realized P&L percentage to an outcome category.
///
/// Total over all inputs: a missing percentage reads `Expired`, anything in
/// the band between the loss and win thresholds (both inclusive) reads
/// `Breakeven`. NaN falls into the breakeven band rather than panicking.
pub fn classify(profit_loss_percentage: Option<f64>, config: &ClassifierConfig) -> OutcomeType {
    match profit_loss_percentage {
        None => OutcomeType::Expired,
        Some(pct) if pct > config.win_threshold_pct => OutcomeType::Win,
        Some(pct) if pct < config.loss_threshold_pct => OutcomeType::Loss,
        Some(_) => OutcomeType::Breakeven,
    }
}
