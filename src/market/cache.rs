use crate::market::types::{PriceCacheEntry, PriceTick, TickSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type ChangeCallback = Arc<dyn Fn(&PriceCacheEntry) + Send + Sync>;

struct Subscriber {
    id: u64,
    symbol: Option<String>,
    callback: ChangeCallback,
}

/// Single source of truth for the latest known price per symbol, written by
/// the push feed and the poller through the same entry point, read by any
/// number of consumers. Entries are never deleted.
pub struct PriceCache {
    entries: RwLock<HashMap<String, PriceCacheEntry>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Push ticks with a known previous price get their change fields
    /// recomputed against it; everything else uses the tick's own values.
    /// 24h statistics are last-known, never cleared.
    pub fn update(&self, tick: PriceTick) {
        let entry = {
            let mut writable = self.entries.write();
            let existing = writable.get(&tick.symbol);

            let (price_change, price_change_percent) = match existing {
                Some(previous) if tick.source == TickSource::Push && previous.price > 0.0 => {
                    let delta = tick.price - previous.price;
                    (delta, delta / previous.price * 100.0)
                }
                _ => (
                    tick.price_change.unwrap_or(0.0),
                    tick.price_change_percent.unwrap_or(0.0),
                ),
            };

            let entry = PriceCacheEntry {
                symbol: tick.symbol.clone(),
                price: tick.price,
                price_change,
                price_change_percent,
                high_24h: tick.high_24h.or_else(|| existing.and_then(|e| e.high_24h)),
                low_24h: tick.low_24h.or_else(|| existing.and_then(|e| e.low_24h)),
                volume_24h: tick
                    .volume_24h
                    .or_else(|| existing.and_then(|e| e.volume_24h)),
                observed_at: tick.observed_at,
            };

            writable.insert(tick.symbol, entry.clone());
            entry
        };

        // Snapshot the matching callbacks so none runs under the registry
        // lock; a callback may subscribe or unsubscribe.
        let callbacks: Vec<ChangeCallback> = {
            let readable = self.subscribers.read();
            readable
                .iter()
                .filter(|subscriber| match &subscriber.symbol {
                    Some(symbol) => symbol == &entry.symbol,
                    None => true,
                })
                .map(|subscriber| Arc::clone(&subscriber.callback))
                .collect()
        };

        for callback in callbacks {
            callback(&entry);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<PriceCacheEntry> {
        self.entries.read().get(symbol).cloned()
    }

    /// Observes changes for one symbol (`Some`) or all symbols (`None`).
    /// The subscription unsubscribes on drop.
    pub fn on_change<F>(self: &Arc<Self>, symbol: Option<&str>, callback: F) -> PriceSubscription
    where
        F: Fn(&PriceCacheEntry) + Send + Sync + 'static,
    {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Subscriber {
            id,
            symbol: symbol.map(str::to_string),
            callback: Arc::new(callback),
        });

        PriceSubscription {
            cache: Arc::downgrade(self),
            id,
        }
    }

    fn remove_subscriber(&self, id: u64) {
        self.subscribers
            .write()
            .retain(|subscriber| subscriber.id != id);
    }
}

/// RAII handle for a change subscription. Dropping it (or calling
/// `unsubscribe`) stops further callbacks; outliving the cache is harmless.
pub struct PriceSubscription {
    cache: Weak<PriceCache>,
    id: u64,
}

impl PriceSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for PriceSubscription {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.remove_subscriber(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::PriceTick;
    use std::sync::atomic::AtomicUsize;

    fn push_tick(symbol: &str, price: f64) -> PriceTick {
        PriceTick {
            observed_at: 1_700_000_000_000,
            ..PriceTick::push(symbol, price)
        }
    }

    fn poll_tick(symbol: &str, price: f64) -> PriceTick {
        PriceTick {
            observed_at: 1_700_000_000_000,
            ..PriceTick::poll(symbol, price)
        }
    }

    #[test]
    fn recomputes_change_on_push_with_previous_entry() {
        let cache = PriceCache::new();
        cache.update(push_tick("BTCUSDT", 50_000.0));
        cache.update(push_tick("BTCUSDT", 50_500.0));

        let entry = cache.get("BTCUSDT").expect("entry must exist");
        assert!((entry.price_change - 500.0).abs() < 1e-9);
        assert!((entry.price_change_percent - 1.0).abs() < 1e-9);
    }

    #[test]
    fn first_push_tick_falls_back_to_supplied_percent() {
        let cache = PriceCache::new();
        let mut tick = push_tick("BTCUSDT", 50_000.0);
        tick.price_change_percent = Some(2.5);
        cache.update(tick);

        let entry = cache.get("BTCUSDT").expect("entry must exist");
        assert_eq!(entry.price_change, 0.0);
        assert_eq!(entry.price_change_percent, 2.5);
    }

    #[test]
    fn poll_ticks_use_supplied_percent_verbatim() {
        let cache = PriceCache::new();
        cache.update(push_tick("BTCUSDT", 50_000.0));

        let mut tick = poll_tick("BTCUSDT", 51_000.0);
        tick.price_change = Some(-10.0);
        tick.price_change_percent = Some(-0.5);
        cache.update(tick);

        let entry = cache.get("BTCUSDT").expect("entry must exist");
        assert_eq!(entry.price_change, -10.0);
        assert_eq!(entry.price_change_percent, -0.5);
    }

    #[test]
    fn retains_last_known_24h_fields() {
        let cache = PriceCache::new();
        let mut first = push_tick("BTCUSDT", 50_000.0);
        first.volume_24h = Some(1_234.5);
        first.high_24h = Some(51_000.0);
        cache.update(first);

        cache.update(push_tick("BTCUSDT", 50_100.0));

        let entry = cache.get("BTCUSDT").expect("entry must exist");
        assert_eq!(entry.volume_24h, Some(1_234.5));
        assert_eq!(entry.high_24h, Some(51_000.0));
    }

    #[test]
    fn get_returns_none_for_unknown_symbol() {
        let cache = PriceCache::new();
        assert!(cache.get("ETHUSDT").is_none());
    }

    #[test]
    fn notifies_symbol_filtered_subscribers_only() {
        let cache = Arc::new(PriceCache::new());
        let btc_calls = Arc::new(AtomicUsize::new(0));
        let all_calls = Arc::new(AtomicUsize::new(0));

        let btc_counter = Arc::clone(&btc_calls);
        let _btc_sub = cache.on_change(Some("BTCUSDT"), move |_| {
            btc_counter.fetch_add(1, Ordering::SeqCst);
        });
        let all_counter = Arc::clone(&all_calls);
        let _all_sub = cache.on_change(None, move |_| {
            all_counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.update(push_tick("BTCUSDT", 50_000.0));
        cache.update(push_tick("ETHUSDT", 3_000.0));

        assert_eq!(btc_calls.load(Ordering::SeqCst), 1);
        assert_eq!(all_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_subscription_receives_no_callbacks() {
        let cache = Arc::new(PriceCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let subscription = cache.on_change(Some("BTCUSDT"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.update(push_tick("BTCUSDT", 50_000.0));
        subscription.unsubscribe();
        cache.update(push_tick("BTCUSDT", 50_100.0));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn push_sequence_matches_scenario() {
        let cache = PriceCache::new();
        cache.update(push_tick("BTCUSDT", 50_000.0));

        let first = cache.get("BTCUSDT").expect("entry must exist");
        assert_eq!(first.price, 50_000.0);
        assert_eq!(first.price_change, 0.0);

        cache.update(push_tick("BTCUSDT", 50_500.0));
        let second = cache.get("BTCUSDT").expect("entry must exist");
        assert!((second.price_change - 500.0).abs() < 1e-9);
        assert!((second.price_change_percent - 1.0).abs() < 1e-9);
    }
}
