//! Daily training run at a fixed UTC hour.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::TrainingService;

pub struct TrainingJob {
    service: Arc<TrainingService>,
    train_hour_utc: u32,
}

impl TrainingJob {
    pub fn new(service: Arc<TrainingService>, train_hour_utc: u32) -> Self {
        TrainingJob {
            service,
            train_hour_utc: if train_hour_utc > 23 { 0 } else { train_hour_utc },
        }
    }

    pub async fn start(&self, cancel: CancellationToken) {
        loop {
            let now = Utc::now();
            let next = next_run_utc(now, self.train_hour_utc);
            let wait = (next - now)
                .to_std()
                .unwrap_or(Duration::from_secs(1))
                .max(Duration::from_secs(1));

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => self.run_once().await,
            }
        }
    }

    async fn run_once(&self) {
        match self.service.train_all(Utc::now()).await {
            Ok(results) => {
                for result in results {
                    info!(
                        "ML training result model={} version={} auc={:.4} promoted={}",
                        result.model_key, result.version, result.auc, result.promoted
                    );
                    if let Some(err) = result.promote_error {
                        error!("ML promotion error for {}: {}", result.model_key, err);
                    }
                }
            }
            Err(err) => error!("ML training error: {:#}", err),
        }
    }
}

/// Same-day run if the hour is still ahead, otherwise tomorrow.
pub fn next_run_utc(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let date = now.date_naive();
    let run = Utc
        .with_ymd_and_hms(
            date.year(),
            date.month(),
            date.day(),
            hour.min(23),
            0,
            0,
        )
        .single()
        .unwrap_or(now);
    if run > now {
        run
    } else {
        run + ChronoDuration::hours(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_run_same_day_when_hour_is_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 30, 0).unwrap();
        let next = next_run_utc(now, 18);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_next_day_when_hour_passed() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 10, 30, 0).unwrap();
        let next = next_run_utc(now, 3);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 2, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_exact_hour_rolls_over() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 3, 0, 0).unwrap();
        let next = next_run_utc(now, 3);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 2, 3, 0, 0).unwrap());
    }
}
