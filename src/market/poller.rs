use crate::backend::TradingBackend;
use crate::market::cache::PriceCache;
use crate::market::types::TickSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pull path of the dual-source cache design: periodically fetches ticker
/// statistics for a watchlist and writes them through the same
/// `PriceCache::update` entry point as the push feed.
pub struct PricePoller {
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl PricePoller {
    pub fn spawn(
        backend: Arc<dyn TradingBackend>,
        cache: Arc<PriceCache>,
        symbols: Vec<String>,
        interval: Duration,
    ) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();

        let join_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match backend.get_ticker_stats(&symbols).await {
                            Ok(ticks) => {
                                for mut tick in ticks {
                                    tick.source = TickSource::Poll;
                                    cache.update(tick);
                                }
                            }
                            Err(error) if error.is_rate_limited() => {
                                debug!("ticker poll rate limited, skipping cycle");
                            }
                            Err(error) => {
                                warn!(%error, "ticker poll failed");
                            }
                        }
                    }
                }
            }
        });

        Self {
            cancellation_token,
            join_handle,
        }
    }

    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        let _ = (&mut self.join_handle).await;
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
