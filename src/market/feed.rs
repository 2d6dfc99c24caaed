use crate::auth::CredentialStore;
use crate::config::SocketConfig;
use crate::market::cache::PriceCache;
use crate::market::types::parse_price_update_payload;
use crate::market::PRICE_UPDATE_EVENT;
use crate::socket::client::{ConnectionState, SocketClient, SocketHandler};
use crate::socket::wire::Envelope;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bridges the push feed to the price cache: recognizes
/// `crypto.price.update` envelopes and writes them through
/// `PriceCache::update`. Everything else on the channel is ignored.
pub struct PriceFeed {
    socket: SocketClient,
}

struct CacheWriter {
    cache: Arc<PriceCache>,
}

impl SocketHandler for CacheWriter {
    fn on_connected(&self) {
        info!("price feed connected");
    }

    fn on_disconnected(&self) {
        info!("price feed disconnected");
    }

    fn on_error(&self, error: &str) {
        warn!(error, "price feed transport error");
    }

    fn on_message(&self, envelope: Envelope) {
        if envelope.kind != PRICE_UPDATE_EVENT {
            debug!(kind = %envelope.kind, "ignoring feed envelope");
            return;
        }

        let Some(data) = envelope.data else {
            warn!("price update envelope without data");
            return;
        };

        match parse_price_update_payload(data) {
            Ok(tick) => self.cache.update(tick),
            Err(error) => warn!(%error, "dropping malformed price update"),
        }
    }
}

impl PriceFeed {
    pub fn new(
        cache: Arc<PriceCache>,
        socket_config: SocketConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let handler = Arc::new(CacheWriter { cache });
        Self {
            socket: SocketClient::new(socket_config, credentials, handler),
        }
    }

    pub fn connect(&self) {
        self.socket.connect();
    }

    pub async fn disconnect(&self) {
        self.socket.disconnect().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.socket.state()
    }
}
