//! Fusion of the classic-indicator score with the two model probabilities.

use shared::domain::SignalDirection;

/// Inputs to the ensemble: a classic score already in [-1, 1] and the two
/// model probabilities in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct Components {
    pub classic_score: f64,
    pub logreg_prob: f64,
    pub xgboost_prob: f64,
}

/// Weighted fusion: 0.30 classic + 0.35 each for the models mapped onto the
/// [-1, 1] score scale.
pub fn ensemble_score(c: Components) -> f64 {
    let logreg_score = 2.0 * c.logreg_prob - 1.0;
    let xgb_score = 2.0 * c.xgboost_prob - 1.0;
    0.30 * c.classic_score + 0.35 * logreg_score + 0.35 * xgb_score
}

/// Direction thresholds are fixed at ±0.15 on the ensemble score.
pub fn ensemble_direction(score: f64) -> SignalDirection {
    if score > 0.15 {
        SignalDirection::Long
    } else if score < -0.15 {
        SignalDirection::Short
    } else {
        SignalDirection::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensemble_fusion_example() {
        let score = ensemble_score(Components {
            classic_score: 0.5,
            logreg_prob: 0.7,
            xgboost_prob: 0.8,
        });
        assert!((score - 0.50).abs() < 1e-12);
        assert_eq!(ensemble_direction(score), SignalDirection::Long);
    }

    #[test]
    fn test_ensemble_neutral_inputs_hold() {
        let score = ensemble_score(Components {
            classic_score: 0.0,
            logreg_prob: 0.5,
            xgboost_prob: 0.5,
        });
        assert_eq!(score, 0.0);
        assert_eq!(ensemble_direction(score), SignalDirection::Hold);
    }

    #[test]
    fn test_ensemble_short_direction() {
        let score = ensemble_score(Components {
            classic_score: -0.8,
            logreg_prob: 0.2,
            xgboost_prob: 0.3,
        });
        assert_eq!(ensemble_direction(score), SignalDirection::Short);
    }
}
