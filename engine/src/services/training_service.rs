//! Scheduled training of both classifiers with a guarded promotion gate.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use quantlab::eval::{chronological_split_bounds, compute_metrics, Metrics};
use quantlab::features::{feature_vector, target_label, FEATURE_NAMES, FEATURE_SPEC_VERSION};
use quantlab::models::{
    gbtree, logreg, GradientBoostedTrees, LogisticRegression, ARTIFACT_FORMAT_GBTREE,
    ARTIFACT_FORMAT_LOGREG, MODEL_KEY_LOGREG, MODEL_KEY_XGBOOST,
};
use serde_json::json;
use shared::domain::{MlFeatureRow, MlModelVersion};
use std::sync::Arc;

use crate::repositories::{FeatureStore, ModelStore};

/// Promotion needs a test set at least this large before it will consider
/// replacing an active model.
const MIN_PROMOTION_TEST_COUNT: usize = 300;
const PROMOTION_AUC_MARGIN: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub interval: String,
    pub train_window_days: i64,
    pub min_train_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            interval: "1h".to_string(),
            train_window_days: 90,
            min_train_samples: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelTrainResult {
    pub model_key: String,
    pub version: i32,
    pub sample_count: usize,
    pub test_count: usize,
    pub auc: f64,
    pub promoted: bool,
    pub promote_error: Option<String>,
}

pub struct TrainingService {
    features: Arc<dyn FeatureStore>,
    registry: Arc<dyn ModelStore>,
    cfg: TrainingConfig,
}

impl TrainingService {
    pub fn new(
        features: Arc<dyn FeatureStore>,
        registry: Arc<dyn ModelStore>,
        mut cfg: TrainingConfig,
    ) -> Self {
        let defaults = TrainingConfig::default();
        if cfg.interval.is_empty() {
            cfg.interval = defaults.interval;
        }
        if cfg.train_window_days <= 0 {
            cfg.train_window_days = defaults.train_window_days;
        }
        if cfg.min_train_samples == 0 {
            cfg.min_train_samples = defaults.min_train_samples;
        }
        TrainingService {
            features,
            registry,
            cfg,
        }
    }

    /// One training cycle: load the labeled window, split chronologically,
    /// train and evaluate both models, insert both versions, then decide
    /// promotion per key. Promotion failures land on the per-model result
    /// so the cycle still persists everything.
    pub async fn train_all(&self, now: DateTime<Utc>) -> Result<Vec<ModelTrainResult>> {
        let from = now - Duration::days(self.cfg.train_window_days);
        let rows = self
            .features
            .list_labeled_rows(&self.cfg.interval, from, now)
            .await?;
        let (samples, labels) = build_dataset(&rows);
        if samples.len() < self.cfg.min_train_samples {
            return Err(anyhow!(
                "not enough labeled samples: got {} need >= {}",
                samples.len(),
                self.cfg.min_train_samples
            ));
        }

        let (train_end, val_end) = chronological_split_bounds(samples.len())
            .ok_or_else(|| anyhow!("dataset split produced empty partitions"))?;
        let train_x = &samples[..train_end];
        let train_y = &labels[..train_end];
        let test_x = &samples[val_end..];
        let test_y = &labels[val_end..];
        if train_x.is_empty() || test_x.is_empty() {
            return Err(anyhow!("dataset split produced empty partitions"));
        }

        let mut results = Vec::with_capacity(2);

        let lr_opts = logreg::TrainOptions::default();
        let lr = LogisticRegression::train(train_x, train_y, &FEATURE_NAMES, lr_opts)
            .context("train logreg")?;
        let lr_blob = lr.to_bytes().context("marshal logreg model")?;
        let lr_metrics = compute_metrics(test_y, &lr.predict_batch(test_x));
        results.push(
            self.persist_and_maybe_promote(
                MODEL_KEY_LOGREG,
                now,
                from,
                lr_blob,
                ARTIFACT_FORMAT_LOGREG,
                json!({
                    "learning_rate": lr_opts.learning_rate,
                    "epochs": lr_opts.epochs,
                    "l2": lr_opts.l2,
                })
                .to_string(),
                &lr_metrics,
                samples.len(),
                test_y.len(),
            )
            .await?,
        );

        let gbt_opts = gbtree::TrainOptions::default();
        let gbt = GradientBoostedTrees::train(train_x, train_y, &FEATURE_NAMES, gbt_opts)
            .context("train gradient-boosted trees")?;
        let gbt_blob = gbt.to_bytes().context("marshal gbtree model")?;
        let gbt_metrics = compute_metrics(test_y, &gbt.predict_batch(test_x));
        results.push(
            self.persist_and_maybe_promote(
                MODEL_KEY_XGBOOST,
                now,
                from,
                gbt_blob,
                ARTIFACT_FORMAT_GBTREE,
                json!({
                    "rounds": gbt_opts.rounds,
                    "learning_rate": gbt_opts.learning_rate,
                    "max_depth": gbt_opts.max_depth,
                })
                .to_string(),
                &gbt_metrics,
                samples.len(),
                test_y.len(),
            )
            .await?,
        );

        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_and_maybe_promote(
        &self,
        model_key: &str,
        now: DateTime<Utc>,
        trained_from: DateTime<Utc>,
        artifact: Vec<u8>,
        artifact_format: &str,
        hyperparams_json: String,
        metrics: &Metrics,
        sample_count: usize,
        test_count: usize,
    ) -> Result<ModelTrainResult> {
        let version = self.registry.next_version(model_key).await?;
        let inserted = self
            .registry
            .insert_model_version(MlModelVersion {
                id: 0,
                model_key: model_key.to_string(),
                version,
                feature_spec_version: FEATURE_SPEC_VERSION.to_string(),
                trained_from,
                trained_to: now,
                trained_at: now,
                hyperparams_json,
                metrics_json: serde_json::to_string(metrics)?,
                artifact_format: artifact_format.to_string(),
                artifact_blob: artifact,
                is_active: false,
                activated_at: None,
            })
            .await?;

        let mut result = ModelTrainResult {
            model_key: model_key.to_string(),
            version: inserted.version,
            sample_count,
            test_count,
            auc: metrics.auc,
            promoted: false,
            promote_error: None,
        };

        match self
            .should_promote(model_key, metrics.auc, test_count, inserted.version)
            .await
        {
            Ok(true) => {
                if let Err(err) = self.registry.activate_model(model_key, inserted.version).await {
                    result.promote_error = Some(format!("{:#}", err));
                } else {
                    result.promoted = true;
                }
            }
            Ok(false) => {}
            Err(err) => result.promote_error = Some(format!("{:#}", err)),
        }
        Ok(result)
    }

    async fn should_promote(
        &self,
        model_key: &str,
        new_auc: f64,
        test_count: usize,
        new_version: i32,
    ) -> Result<bool> {
        let Some(active) = self.registry.get_active_model(model_key).await? else {
            return Ok(true);
        };
        if active.version == new_version {
            // Already active: promotion is idempotent, no rewrite.
            return Ok(active.is_active);
        }
        if test_count < MIN_PROMOTION_TEST_COUNT {
            return Ok(false);
        }
        let Some(active_auc) = metric_value(&active.metrics_json, "auc") else {
            return Ok(true);
        };
        Ok(new_auc >= active_auc + PROMOTION_AUC_MARGIN)
    }
}

fn build_dataset(rows: &[MlFeatureRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut samples = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(label) = target_label(row) else {
            continue;
        };
        samples.push(feature_vector(row));
        labels.push(label);
    }
    (samples, labels)
}

fn metric_value(metrics_json: &str, key: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(metrics_json).ok()?;
    value.get(key)?.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MemFeatures {
        rows: Vec<MlFeatureRow>,
    }

    #[async_trait]
    impl FeatureStore for MemFeatures {
        async fn upsert_rows(&self, _: &[MlFeatureRow]) -> Result<()> {
            Ok(())
        }

        async fn list_labeled_rows(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<MlFeatureRow>> {
            Ok(self.rows.clone())
        }

        async fn list_latest_by_interval(&self, _: &str) -> Result<Vec<MlFeatureRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MemRegistry {
        models: Mutex<Vec<MlModelVersion>>,
    }

    #[async_trait]
    impl ModelStore for MemRegistry {
        async fn next_version(&self, model_key: &str) -> Result<i32> {
            let models = self.models.lock().unwrap();
            Ok(models
                .iter()
                .filter(|m| m.model_key == model_key)
                .map(|m| m.version)
                .max()
                .unwrap_or(0)
                + 1)
        }

        async fn insert_model_version(&self, mut model: MlModelVersion) -> Result<MlModelVersion> {
            let mut models = self.models.lock().unwrap();
            model.id = models.len() as i64 + 1;
            models.push(model.clone());
            Ok(model)
        }

        async fn get_active_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
            let models = self.models.lock().unwrap();
            Ok(models
                .iter()
                .filter(|m| m.model_key == model_key && m.is_active)
                .max_by_key(|m| m.version)
                .cloned())
        }

        async fn get_latest_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
            let models = self.models.lock().unwrap();
            Ok(models
                .iter()
                .filter(|m| m.model_key == model_key)
                .max_by_key(|m| m.version)
                .cloned())
        }

        async fn activate_model(&self, model_key: &str, version: i32) -> Result<()> {
            let mut models = self.models.lock().unwrap();
            if !models
                .iter()
                .any(|m| m.model_key == model_key && m.version == version)
            {
                return Err(anyhow!("model version {}/{} not found", model_key, version));
            }
            for model in models.iter_mut() {
                if model.model_key == model_key {
                    model.is_active = model.version == version;
                    model.activated_at = model.is_active.then(Utc::now);
                }
            }
            Ok(())
        }
    }

    fn labeled_rows(count: usize) -> Vec<MlFeatureRow> {
        let start = DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap();
        (0..count)
            .map(|i| {
                let signal = ((i * 29) % 13) as f64 / 13.0 - 0.5;
                let noise = ((i * 7) % 5) as f64 / 50.0;
                MlFeatureRow {
                    symbol: "BTC".to_string(),
                    interval: "1h".to_string(),
                    open_time: start + Duration::hours(i as i64),
                    ret_1h: signal + noise,
                    ret_4h: signal * 0.8,
                    ret_12h: noise,
                    ret_24h: -signal * 0.1,
                    volatility_6h: 0.01 + noise.abs(),
                    volatility_24h: 0.02,
                    volume_z_24h: signal * 2.0,
                    rsi_14: 50.0 + signal * 30.0,
                    macd_line: signal,
                    macd_signal: signal * 0.5,
                    macd_hist: signal * 0.5,
                    bb_pos: 0.5 + signal * 0.4,
                    bb_width: 0.05,
                    target_up_4h: Some(signal > 0.0),
                }
            })
            .collect()
    }

    fn service(rows: Vec<MlFeatureRow>, registry: Arc<MemRegistry>) -> TrainingService {
        TrainingService::new(
            Arc::new(MemFeatures { rows }),
            registry,
            TrainingConfig {
                interval: "1h".to_string(),
                train_window_days: 90,
                min_train_samples: 50,
            },
        )
    }

    #[tokio::test]
    async fn test_first_training_promotes_both_models() {
        let registry = Arc::new(MemRegistry::default());
        let svc = service(labeled_rows(200), registry.clone());
        let results = svc.train_all(Utc::now()).await.unwrap();

        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.version, 1);
            assert!(result.promoted, "first model for {} promotes", result.model_key);
            assert!(result.promote_error.is_none());
        }
        assert!(registry
            .get_active_model(MODEL_KEY_LOGREG)
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .get_active_model(MODEL_KEY_XGBOOST)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_small_test_set_blocks_second_promotion() {
        let registry = Arc::new(MemRegistry::default());
        let svc = service(labeled_rows(200), registry.clone());
        svc.train_all(Utc::now()).await.unwrap();

        // 200 rows leave a 30-row test set, far below the 300 gate, so the
        // second training round must not displace the active version 1.
        let results = svc.train_all(Utc::now()).await.unwrap();
        for result in &results {
            assert_eq!(result.version, 2);
            assert!(!result.promoted);
        }
        let active = registry
            .get_active_model(MODEL_KEY_LOGREG)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.version, 1);
    }

    #[tokio::test]
    async fn test_too_few_samples_fails_cycle() {
        let registry = Arc::new(MemRegistry::default());
        let svc = service(labeled_rows(10), registry);
        let err = svc.train_all(Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains("not enough labeled samples"));
    }

    #[tokio::test]
    async fn test_model_exclusivity_across_promotions() {
        let registry = Arc::new(MemRegistry::default());
        let svc = service(labeled_rows(200), registry.clone());
        svc.train_all(Utc::now()).await.unwrap();
        svc.train_all(Utc::now()).await.unwrap();

        let models = registry.models.lock().unwrap();
        for key in [MODEL_KEY_LOGREG, MODEL_KEY_XGBOOST] {
            let active = models
                .iter()
                .filter(|m| m.model_key == key && m.is_active)
                .count();
            assert!(active <= 1, "at most one active model per key");
        }
    }
}
