pub mod cache;
pub mod feed;
pub mod history;
pub mod poller;
pub mod types;

pub use cache::{PriceCache, PriceSubscription};
pub use feed::PriceFeed;
pub use history::{merge, HistoryPoint};
pub use poller::PricePoller;
pub use types::{PriceCacheEntry, PriceTick, TickSource};

/// Envelope type carrying push price ticks.
pub const PRICE_UPDATE_EVENT: &str = "crypto.price.update";

pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
