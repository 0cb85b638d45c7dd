//! Periodic job runners. All share the same shape: run once immediately,
//! then on every tick, and stop promptly when the root token cancels.
//! A cycle's error is logged and never kills its runner.

pub mod inference_job;
pub mod market_intel_job;
pub mod outcome_job;
pub mod price_poller;
pub mod training_job;

pub use inference_job::InferenceJob;
pub use market_intel_job::MarketIntelJob;
pub use outcome_job::OutcomeJob;
pub use price_poller::PricePoller;
pub use training_job::TrainingJob;
