//! Late-binding resolution of predictions whose target time has passed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::domain::{Candle, MlPrediction, SignalDirection};
use std::sync::Arc;
use tracing::warn;

use crate::repositories::{CandleStore, PredictionStore};

pub struct OutcomeService {
    predictions: Arc<dyn PredictionStore>,
    candles: Arc<dyn CandleStore>,
}

impl OutcomeService {
    pub fn new(predictions: Arc<dyn PredictionStore>, candles: Arc<dyn CandleStore>) -> Self {
        OutcomeService {
            predictions,
            candles,
        }
    }

    /// Resolves up to `limit` due predictions against their open and target
    /// candles. Predictions missing either candle stay unresolved for a
    /// later pass; the guarded update makes concurrent resolvers safe.
    pub async fn resolve_outcomes(&self, now: DateTime<Utc>, limit: u64) -> Result<usize> {
        let due = self.predictions.list_unresolved_due(now, limit).await?;
        let mut resolved = 0;
        for prediction in due {
            let candles = match self
                .candles
                .get_candles_in_range(
                    &prediction.symbol,
                    &prediction.interval,
                    prediction.open_time,
                    prediction.target_time,
                )
                .await
            {
                Ok(candles) => candles,
                Err(err) => {
                    warn!(
                        "candle lookup failed for prediction {}: {:#}",
                        prediction.id, err
                    );
                    continue;
                }
            };

            let Some((open_close, target_close)) =
                extract_open_and_target_close(&candles, prediction.open_time, prediction.target_time)
            else {
                continue;
            };

            let actual_up = target_close > open_close;
            let is_correct = correctness(&prediction, actual_up);
            let realized_return = target_close / open_close - 1.0;

            if self
                .predictions
                .resolve_prediction(prediction.id, actual_up, is_correct, realized_return)
                .await?
            {
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

/// Long is correct when the close went up, short when it went down; a hold
/// prediction is judged against its own probability (up iff prob_up >= 0.5).
fn correctness(prediction: &MlPrediction, actual_up: bool) -> bool {
    match prediction.direction {
        SignalDirection::Long => actual_up,
        SignalDirection::Short => !actual_up,
        SignalDirection::Hold => actual_up == (prediction.prob_up >= 0.5),
    }
}

fn extract_open_and_target_close(
    candles: &[Candle],
    open_time: DateTime<Utc>,
    target_time: DateTime<Utc>,
) -> Option<(f64, f64)> {
    let open = candles.iter().find(|c| c.open_time == open_time)?;
    let target = candles.iter().find(|c| c.open_time == target_time)?;
    Some((open.close, target.close))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    fn candle(open_time: DateTime<Utc>, close: f64) -> Candle {
        Candle {
            symbol: "BTC".to_string(),
            interval: "1h".to_string(),
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_extract_open_and_target_close() {
        let open = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        let target = open + Duration::hours(4);
        let candles = vec![
            candle(target, 120.0),
            candle(open, 100.0),
            candle(open + Duration::hours(2), 110.0),
        ];
        let (open_close, target_close) =
            extract_open_and_target_close(&candles, open, target).unwrap();
        assert_eq!(open_close, 100.0);
        assert_eq!(target_close, 120.0);

        assert!(extract_open_and_target_close(&candles[..1], open, target).is_none());
    }

    #[test]
    fn test_correctness_per_direction() {
        let base = MlPrediction {
            id: 1,
            symbol: "BTC".to_string(),
            interval: "1h".to_string(),
            open_time: Utc::now(),
            target_time: Utc::now(),
            model_key: "logreg".to_string(),
            model_version: 1,
            prob_up: 0.7,
            confidence: 0.4,
            direction: SignalDirection::Long,
            risk: 3,
            signal_id: None,
            details_json: "{}".to_string(),
            created_at: Utc::now(),
            resolved_at: None,
            actual_up: None,
            is_correct: None,
            realized_return: None,
        };

        assert!(correctness(&base, true));
        assert!(!correctness(&base, false));

        let short = MlPrediction {
            direction: SignalDirection::Short,
            ..base.clone()
        };
        assert!(correctness(&short, false));

        // Hold is judged against the probability itself.
        let hold_up = MlPrediction {
            direction: SignalDirection::Hold,
            prob_up: 0.6,
            ..base.clone()
        };
        assert!(correctness(&hold_up, true));
        let hold_down = MlPrediction {
            direction: SignalDirection::Hold,
            prob_up: 0.4,
            ..base
        };
        assert!(correctness(&hold_down, false));
        assert!(!correctness(&hold_down, true));
    }

    struct MemPredictions {
        due: Vec<MlPrediction>,
        resolved: Mutex<Vec<(i64, bool, bool, f64)>>,
        already_resolved: bool,
    }

    #[async_trait]
    impl PredictionStore for MemPredictions {
        async fn upsert_prediction(&self, prediction: MlPrediction) -> Result<MlPrediction> {
            Ok(prediction)
        }

        async fn attach_signal_id(&self, _: i64, _: i64) -> Result<()> {
            Ok(())
        }

        async fn list_unresolved_due(
            &self,
            _: DateTime<Utc>,
            _: u64,
        ) -> Result<Vec<MlPrediction>> {
            Ok(self.due.clone())
        }

        async fn resolve_prediction(
            &self,
            prediction_id: i64,
            actual_up: bool,
            is_correct: bool,
            realized_return: f64,
        ) -> Result<bool> {
            if self.already_resolved {
                return Ok(false);
            }
            self.resolved
                .lock()
                .unwrap()
                .push((prediction_id, actual_up, is_correct, realized_return));
            Ok(true)
        }
    }

    struct MemCandles {
        candles: Vec<Candle>,
    }

    #[async_trait]
    impl CandleStore for MemCandles {
        async fn upsert_candles(&self, _: &[Candle]) -> Result<()> {
            Ok(())
        }

        async fn get_candles(&self, _: &str, _: &str, _: u64) -> Result<Vec<Candle>> {
            Ok(self.candles.clone())
        }

        async fn get_candles_in_range(
            &self,
            _: &str,
            _: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            Ok(self
                .candles
                .iter()
                .filter(|c| c.open_time >= from && c.open_time <= to)
                .cloned()
                .collect())
        }
    }

    fn due_prediction(open: DateTime<Utc>) -> MlPrediction {
        MlPrediction {
            id: 42,
            symbol: "BTC".to_string(),
            interval: "1h".to_string(),
            open_time: open,
            target_time: open + Duration::hours(4),
            model_key: "logreg".to_string(),
            model_version: 1,
            prob_up: 0.8,
            confidence: 0.6,
            direction: SignalDirection::Long,
            risk: 2,
            signal_id: None,
            details_json: "{}".to_string(),
            created_at: open,
            resolved_at: None,
            actual_up: None,
            is_correct: None,
            realized_return: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_outcomes_updates_due_prediction() {
        let open = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        let predictions = Arc::new(MemPredictions {
            due: vec![due_prediction(open)],
            resolved: Mutex::new(Vec::new()),
            already_resolved: false,
        });
        let candles = Arc::new(MemCandles {
            candles: vec![candle(open, 100.0), candle(open + Duration::hours(4), 105.0)],
        });

        let service = OutcomeService::new(predictions.clone(), candles);
        let resolved = service.resolve_outcomes(Utc::now(), 200).await.unwrap();
        assert_eq!(resolved, 1);

        let calls = predictions.resolved.lock().unwrap();
        let (id, actual_up, is_correct, realized) = calls[0];
        assert_eq!(id, 42);
        assert!(actual_up);
        assert!(is_correct);
        assert!((realized - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_resolve_outcomes_skips_missing_candles() {
        let open = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        let predictions = Arc::new(MemPredictions {
            due: vec![due_prediction(open)],
            resolved: Mutex::new(Vec::new()),
            already_resolved: false,
        });
        let candles = Arc::new(MemCandles {
            candles: vec![candle(open, 100.0)], // no target candle yet
        });

        let service = OutcomeService::new(predictions.clone(), candles);
        let resolved = service.resolve_outcomes(Utc::now(), 200).await.unwrap();
        assert_eq!(resolved, 0);
        assert!(predictions.resolved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_outcomes_respects_guard() {
        let open = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        let predictions = Arc::new(MemPredictions {
            due: vec![due_prediction(open)],
            resolved: Mutex::new(Vec::new()),
            already_resolved: true,
        });
        let candles = Arc::new(MemCandles {
            candles: vec![candle(open, 100.0), candle(open + Duration::hours(4), 105.0)],
        });

        let service = OutcomeService::new(predictions, candles);
        let resolved = service.resolve_outcomes(Utc::now(), 200).await.unwrap();
        assert_eq!(resolved, 0, "already-resolved rows are no-ops");
    }
}
