//! Per-chain on-chain activity providers.
//!
//! Each provider reads a public explorer endpoint, normalizes a handful of
//! load metrics against fixed baselines into a score in [-1, 1], and tags
//! the result with its own provider key so multiple providers per symbol can
//! coexist.

pub mod ada_koios;
pub mod btc_mempool;
pub mod eth_blockscout;
pub mod xrp_xrpscan;

pub use ada_koios::AdaKoiosProvider;
pub use btc_mempool::BtcMempoolProvider;
pub use eth_blockscout::EthBlockscoutProvider;
pub use xrp_xrpscan::XrpScanProvider;

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

pub(crate) fn onchain_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .context("build on-chain http client")
}

pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    remote: &str,
) -> Result<serde_json::Value> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{} error {}: {}", remote, status, body));
    }
    response
        .json()
        .await
        .with_context(|| format!("decode {} payload", remote))
}
