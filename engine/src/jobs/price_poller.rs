//! Three-tier price polling: fast snapshot refresh, round-robin short
//! candles, round-robin long candles. The tiers start staggered so the
//! provider's rate budget is not burned in one burst.

use shared::domain::SUPPORTED_SYMBOLS;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::PriceService;

const SHORT_CANDLE_PERIOD: Duration = Duration::from_secs(5 * 60);
const SHORT_CANDLE_START_DELAY: Duration = Duration::from_secs(10);
const SHORT_CANDLES_PER_TICK: usize = 2;
const LONG_CANDLE_PERIOD: Duration = Duration::from_secs(30 * 60);
const LONG_CANDLE_START_DELAY: Duration = Duration::from_secs(30);

pub struct PricePoller {
    service: Arc<PriceService>,
    poll_interval: Duration,
}

impl PricePoller {
    pub fn new(service: Arc<PriceService>, poll_interval_secs: u64) -> Self {
        PricePoller {
            service,
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
        }
    }

    /// Runs all three tiers until the token cancels.
    pub async fn start(&self, cancel: CancellationToken) {
        info!("Price poller starting");
        tokio::join!(
            self.poll_prices(&cancel),
            self.poll_short_candles(&cancel),
            self.poll_long_candles(&cancel),
        );
        info!("Price poller stopped");
    }

    async fn poll_prices(&self, cancel: &CancellationToken) {
        if let Err(err) = self.service.refresh_prices().await {
            error!("price refresh error: {:#}", err);
        }
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(err) = self.service.refresh_prices().await {
                        error!("price refresh error: {:#}", err);
                    }
                }
            }
        }
    }

    async fn poll_short_candles(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(SHORT_CANDLE_START_DELAY) => {}
        }

        let mut index = 0usize;
        self.short_batch(&mut index).await;
        let mut ticker = tokio::time::interval(SHORT_CANDLE_PERIOD);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.short_batch(&mut index).await,
            }
        }
    }

    async fn short_batch(&self, index: &mut usize) {
        for _ in 0..SHORT_CANDLES_PER_TICK {
            let symbol = SUPPORTED_SYMBOLS[*index % SUPPORTED_SYMBOLS.len()];
            *index += 1;
            if let Err(err) = self.service.refresh_short_candles(symbol).await {
                error!("short candle refresh error for {}: {:#}", symbol, err);
            }
        }
    }

    async fn poll_long_candles(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(LONG_CANDLE_START_DELAY) => {}
        }

        let mut index = 0usize;
        self.long_batch(&mut index).await;
        let mut ticker = tokio::time::interval(LONG_CANDLE_PERIOD);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.long_batch(&mut index).await,
            }
        }
    }

    async fn long_batch(&self, index: &mut usize) {
        let symbol = SUPPORTED_SYMBOLS[*index % SUPPORTED_SYMBOLS.len()];
        *index += 1;
        if let Err(err) = self.service.refresh_long_candles(symbol).await {
            error!("long candle refresh error for {}: {:#}", symbol, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MarketDataSource;
    use crate::repositories::CandleStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use shared::domain::{Candle, PriceSnapshot};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        chart_symbols: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MarketDataSource for RecordingProvider {
        async fn fetch_prices(&self) -> Result<HashMap<String, PriceSnapshot>> {
            Ok(HashMap::new())
        }

        async fn fetch_market_chart(
            &self,
            symbol: &str,
            _: u32,
            _: &[&str],
        ) -> Result<Vec<Candle>> {
            self.chart_symbols.lock().unwrap().push(symbol.to_string());
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct NullCandleStore;

    #[async_trait]
    impl CandleStore for NullCandleStore {
        async fn upsert_candles(&self, _: &[Candle]) -> Result<()> {
            Ok(())
        }

        async fn get_candles(&self, _: &str, _: &str, _: u64) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }

        async fn get_candles_in_range(
            &self,
            _: &str,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    fn poller_with_provider() -> (PricePoller, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider::default());
        let service = Arc::new(PriceService::new(
            provider.clone(),
            Arc::new(NullCandleStore),
            None,
        ));
        (PricePoller::new(service, 60), provider)
    }

    #[tokio::test]
    async fn test_short_batch_round_robin() {
        let (poller, provider) = poller_with_provider();
        let mut index = 0usize;
        poller.short_batch(&mut index).await;
        poller.short_batch(&mut index).await;

        let calls = provider.chart_symbols.lock().unwrap();
        assert_eq!(*calls, vec!["BTC", "ETH", "SOL", "XRP"]);
        assert_eq!(index, 4);
    }

    #[tokio::test]
    async fn test_long_batch_wraps_around_universe() {
        let (poller, provider) = poller_with_provider();
        let mut index = 0usize;
        for _ in 0..SUPPORTED_SYMBOLS.len() + 1 {
            poller.long_batch(&mut index).await;
        }

        let calls = provider.chart_symbols.lock().unwrap();
        assert_eq!(calls.len(), SUPPORTED_SYMBOLS.len() + 1);
        assert_eq!(calls[0], "BTC");
        assert_eq!(calls[SUPPORTED_SYMBOLS.len()], "BTC");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stops_on_cancel() {
        let (poller, _provider) = poller_with_provider();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { poller.start(cancel).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cancel.cancel();
        handle.await.expect("poller shuts down cleanly");
    }
}
