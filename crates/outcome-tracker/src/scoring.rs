use chrono::{DateTime, Utc};
use learning_core::{ClosedPosition, OutcomeType, Signal};

/// Score how well a signal's stated confidence matched its realized outcome.
///
/// Winners keep their confidence, losers score its complement, and neutral
/// outcomes reward confidence near 50. Always in [0, 100].
pub fn prediction_accuracy(confidence: f64, outcome: OutcomeType) -> f64 {
    match outcome {
        OutcomeType::Win => confidence.clamp(0.0, 100.0),
        OutcomeType::Loss => (100.0 - confidence).clamp(0.0, 100.0),
        OutcomeType::Breakeven | OutcomeType::Expired => {
            (50.0 - (confidence - 50.0).abs()).max(0.0)
        }
    }
}

/// Rate how complete and significant an outcome's underlying data is.
///
/// Base 50, plus fixed bumps for a present P&L percentage, a close
/// timestamp, high stated confidence, and a move larger than 2%.
pub fn quality_score(position: &ClosedPosition, signal: &Signal) -> f64 {
    let mut score: f64 = 50.0;

    if position.profit_loss_percentage.is_some() {
        score += 20.0;
    }
    if position.closed_at.is_some() {
        score += 10.0;
    }
    if signal.confidence_score >= 70.0 {
        score += 10.0;
    }
    if position
        .profit_loss_percentage
        .map(|pct| pct.abs() > 2.0)
        .unwrap_or(false)
    {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}

/// Hours between open and close, rounded to 2 decimals.
/// A close before the open yields a negative value rather than clamping.
pub fn holding_period_hours(opened_at: DateTime<Utc>, closed_at: DateTime<Utc>) -> f64 {
    let hours = (closed_at - opened_at).num_seconds() as f64 / 3600.0;
    (hours * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn position(pct: Option<f64>, closed: bool) -> ClosedPosition {
        ClosedPosition {
            id: 1,
            user_id: 7,
            signal_id: Some(1),
            ticker: "AAPL".to_string(),
            quantity: 10.0,
            entry_price: 100.0,
            exit_price: Some(105.0),
            profit_loss: pct.map(|p| p * 10.0),
            profit_loss_percentage: pct,
            is_open: false,
            opened_at: Utc::now(),
            closed_at: closed.then(Utc::now),
        }
    }

    fn signal(confidence: f64) -> Signal {
        Signal {
            id: 1,
            ticker: "AAPL".to_string(),
            signal_type: "breakout".to_string(),
            confidence_score: confidence,
            timeframe: "1H".to_string(),
            entry_price: Some(100.0),
            stop_loss: Some(97.0),
            target_price: Some(108.0),
            sector: Some("Technology".to_string()),
            market: Some("NASDAQ".to_string()),
            created_at: Utc::now(),
            timeframe_scores: HashMap::new(),
        }
    }

    #[test]
    fn confident_winner_keeps_its_confidence() {
        assert_eq!(prediction_accuracy(90.0, OutcomeType::Win), 90.0);
    }

    #[test]
    fn confident_loser_is_penalized() {
        assert_eq!(prediction_accuracy(90.0, OutcomeType::Loss), 10.0);
    }

    #[test]
    fn neutral_outcomes_reward_neutral_confidence() {
        assert_eq!(prediction_accuracy(50.0, OutcomeType::Breakeven), 50.0);
        assert_eq!(prediction_accuracy(90.0, OutcomeType::Breakeven), 10.0);
        assert_eq!(prediction_accuracy(10.0, OutcomeType::Expired), 10.0);
    }

    #[test]
    fn prediction_accuracy_stays_in_bounds() {
        for confidence in [0.0, 25.0, 50.0, 75.0, 100.0] {
            for outcome in [
                OutcomeType::Win,
                OutcomeType::Loss,
                OutcomeType::Breakeven,
                OutcomeType::Expired,
            ] {
                let score = prediction_accuracy(confidence, outcome);
                assert!((0.0..=100.0).contains(&score));
            }
        }
    }

    #[test]
    fn full_data_high_confidence_big_move_scores_full() {
        let score = quality_score(&position(Some(5.0), true), &signal(82.0));
        assert_eq!(score, 100.0);
    }

    #[test]
    fn sparse_data_scores_base() {
        let score = quality_score(&position(None, false), &signal(40.0));
        assert_eq!(score, 50.0);
    }

    #[test]
    fn quality_score_bounded_for_extreme_moves() {
        let score = quality_score(&position(Some(-9999.0), true), &signal(100.0));
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn holding_period_rounds_to_two_decimals() {
        let opened = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let closed = "2024-01-01T05:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(holding_period_hours(opened, closed), 5.5);
    }

    #[test]
    fn holding_period_goes_negative_when_close_precedes_open() {
        let opened = "2024-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let closed = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(holding_period_hours(opened, closed), -24.0);
    }
}
