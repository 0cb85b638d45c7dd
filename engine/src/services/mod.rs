//! Domain services orchestrating providers, quant code and repositories.

pub mod feature_service;
pub mod inference_service;
pub mod market_intel;
pub mod outcome_service;
pub mod price_service;
pub mod training_service;

pub use feature_service::FeatureService;
pub use inference_service::{InferenceConfig, InferenceService};
pub use market_intel::{MarketIntelConfig, MarketIntelService};
pub use outcome_service::OutcomeService;
pub use price_service::PriceService;
pub use training_service::{TrainingConfig, TrainingService};
