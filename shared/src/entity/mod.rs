pub mod candles;
pub mod market_composite_snapshots;
pub mod market_intel_item_symbols;
pub mod market_intel_items;
pub mod market_onchain_snapshots;
pub mod ml_feature_rows;
pub mod ml_model_versions;
pub mod ml_predictions;
pub mod signals;
