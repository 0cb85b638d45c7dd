//! Binary classifiers with serializable artifacts.
//!
//! Both models share the same contract: train on row-major samples with
//! {0, 1} labels, predict the probability of the positive class, and
//! round-trip bit-identically through their artifact bytes.

pub mod gbtree;
pub mod logreg;

pub use gbtree::GradientBoostedTrees;
pub use logreg::LogisticRegression;

pub const MODEL_KEY_LOGREG: &str = "logreg";
pub const MODEL_KEY_XGBOOST: &str = "xgboost";
pub const MODEL_KEY_ENSEMBLE_V1: &str = "ensemble_v1";

pub const ARTIFACT_FORMAT_LOGREG: &str = "json/logreg-v1";
pub const ARTIFACT_FORMAT_GBTREE: &str = "json/gbtree-v1";
