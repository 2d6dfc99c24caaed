use crate::error::Error;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_DEBOUNCE_WINDOW_MS: u64 = 1_000;
pub const DEFAULT_PERIODIC_REFRESH_MS: u64 = 5_000;
pub const DEFAULT_REFRESH_FLOOR_MS: u64 = 2_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_500;
pub const DEFAULT_SIGNAL_REFETCH_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_TRADE_LOG_LIMIT: u32 = 50;
pub const DEFAULT_BACKFILL_YEARS: u8 = 1;
pub const MIN_RECONNECT_DELAY_MS: u64 = 100;
pub const MAX_RECONNECT_DELAY_MS: u64 = 300_000;
pub const MIN_DEBOUNCE_WINDOW_MS: u64 = 50;
pub const MAX_DEBOUNCE_WINDOW_MS: u64 = 30_000;
pub const MIN_PERIODIC_REFRESH_MS: u64 = 500;
pub const MAX_PERIODIC_REFRESH_MS: u64 = 600_000;
pub const MIN_REFRESH_FLOOR_MS: u64 = 100;
pub const MAX_REFRESH_FLOOR_MS: u64 = 60_000;
pub const MAX_SETTLE_DELAY_MS: u64 = 60_000;
pub const MIN_SIGNAL_REFETCH_MS: u64 = 1_000;
pub const MAX_SIGNAL_REFETCH_MS: u64 = 3_600_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 300_000;
pub const MIN_TRADE_LOG_LIMIT: u32 = 1;
pub const MAX_TRADE_LOG_LIMIT: u32 = 500;
pub const MIN_BACKFILL_YEARS: u8 = 1;
pub const MAX_BACKFILL_YEARS: u8 = 5;

/// Actionable signals below this confidence never preempt the debounce.
pub const SIGNAL_CONFIDENCE_FLOOR: u8 = 50;

pub fn normalize_symbol(raw: &str) -> Result<String, Error> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(Error::InvalidArgument(
            "symbol must be non-empty alphanumeric ASCII".to_string(),
        ));
    }
    Ok(symbol)
}

/// Tuning knobs for the simulation refresh scheduler and the price poller.
/// All fields optional; `normalize` fills documented defaults and rejects
/// out-of-range values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncArgs {
    pub debounce_window_ms: Option<u64>,
    pub periodic_refresh_ms: Option<u64>,
    pub refresh_floor_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub signal_refetch_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub trade_log_limit: Option<u32>,
    pub backfill_years: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub debounce_window_ms: u64,
    pub periodic_refresh_ms: u64,
    pub refresh_floor_ms: u64,
    pub settle_delay_ms: u64,
    pub signal_refetch_ms: u64,
    pub poll_interval_ms: u64,
    pub trade_log_limit: u32,
    pub backfill_years: u8,
}

impl SyncArgs {
    pub fn normalize(self) -> Result<SyncConfig, Error> {
        let debounce_window_ms = self.debounce_window_ms.unwrap_or(DEFAULT_DEBOUNCE_WINDOW_MS);
        if !(MIN_DEBOUNCE_WINDOW_MS..=MAX_DEBOUNCE_WINDOW_MS).contains(&debounce_window_ms) {
            return Err(Error::InvalidArgument(format!(
                "debounceWindowMs must be between {MIN_DEBOUNCE_WINDOW_MS} and {MAX_DEBOUNCE_WINDOW_MS}"
            )));
        }

        let periodic_refresh_ms = self
            .periodic_refresh_ms
            .unwrap_or(DEFAULT_PERIODIC_REFRESH_MS);
        if !(MIN_PERIODIC_REFRESH_MS..=MAX_PERIODIC_REFRESH_MS).contains(&periodic_refresh_ms) {
            return Err(Error::InvalidArgument(format!(
                "periodicRefreshMs must be between {MIN_PERIODIC_REFRESH_MS} and {MAX_PERIODIC_REFRESH_MS}"
            )));
        }

        let refresh_floor_ms = self.refresh_floor_ms.unwrap_or(DEFAULT_REFRESH_FLOOR_MS);
        if !(MIN_REFRESH_FLOOR_MS..=MAX_REFRESH_FLOOR_MS).contains(&refresh_floor_ms) {
            return Err(Error::InvalidArgument(format!(
                "refreshFloorMs must be between {MIN_REFRESH_FLOOR_MS} and {MAX_REFRESH_FLOOR_MS}"
            )));
        }

        let settle_delay_ms = self.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS);
        if settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(Error::InvalidArgument(format!(
                "settleDelayMs must be at most {MAX_SETTLE_DELAY_MS}"
            )));
        }

        let signal_refetch_ms = self.signal_refetch_ms.unwrap_or(DEFAULT_SIGNAL_REFETCH_MS);
        if !(MIN_SIGNAL_REFETCH_MS..=MAX_SIGNAL_REFETCH_MS).contains(&signal_refetch_ms) {
            return Err(Error::InvalidArgument(format!(
                "signalRefetchMs must be between {MIN_SIGNAL_REFETCH_MS} and {MAX_SIGNAL_REFETCH_MS}"
            )));
        }

        let poll_interval_ms = self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&poll_interval_ms) {
            return Err(Error::InvalidArgument(format!(
                "pollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
            )));
        }

        let trade_log_limit = self.trade_log_limit.unwrap_or(DEFAULT_TRADE_LOG_LIMIT);
        if !(MIN_TRADE_LOG_LIMIT..=MAX_TRADE_LOG_LIMIT).contains(&trade_log_limit) {
            return Err(Error::InvalidArgument(format!(
                "tradeLogLimit must be between {MIN_TRADE_LOG_LIMIT} and {MAX_TRADE_LOG_LIMIT}"
            )));
        }

        let backfill_years = self.backfill_years.unwrap_or(DEFAULT_BACKFILL_YEARS);
        if !(MIN_BACKFILL_YEARS..=MAX_BACKFILL_YEARS).contains(&backfill_years) {
            return Err(Error::InvalidArgument(format!(
                "backfillYears must be between {MIN_BACKFILL_YEARS} and {MAX_BACKFILL_YEARS}"
            )));
        }

        Ok(SyncConfig {
            debounce_window_ms,
            periodic_refresh_ms,
            refresh_floor_ms,
            settle_delay_ms,
            signal_refetch_ms,
            poll_interval_ms,
            trade_log_limit,
            backfill_years,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketArgs {
    pub url: String,
    pub reconnect_delay_ms: Option<u64>,
    pub auto_reconnect: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub auto_reconnect: bool,
}

impl SocketArgs {
    pub fn normalize(self) -> Result<SocketConfig, Error> {
        let url = self.url.trim().to_string();
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(Error::InvalidArgument(
                "url must use the ws:// or wss:// scheme".to_string(),
            ));
        }

        let reconnect_delay_ms = self.reconnect_delay_ms.unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
        if !(MIN_RECONNECT_DELAY_MS..=MAX_RECONNECT_DELAY_MS).contains(&reconnect_delay_ms) {
            return Err(Error::InvalidArgument(format!(
                "reconnectDelayMs must be between {MIN_RECONNECT_DELAY_MS} and {MAX_RECONNECT_DELAY_MS}"
            )));
        }

        Ok(SocketConfig {
            url,
            reconnect_delay_ms,
            auto_reconnect: self.auto_reconnect.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sync_args_defaults() {
        let config = SyncArgs::default()
            .normalize()
            .expect("defaults should be valid");

        assert_eq!(config.debounce_window_ms, DEFAULT_DEBOUNCE_WINDOW_MS);
        assert_eq!(config.periodic_refresh_ms, DEFAULT_PERIODIC_REFRESH_MS);
        assert_eq!(config.refresh_floor_ms, DEFAULT_REFRESH_FLOOR_MS);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(config.signal_refetch_ms, DEFAULT_SIGNAL_REFETCH_MS);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.trade_log_limit, DEFAULT_TRADE_LOG_LIMIT);
        assert_eq!(config.backfill_years, DEFAULT_BACKFILL_YEARS);
    }

    #[test]
    fn validates_debounce_range() {
        let result = SyncArgs {
            debounce_window_ms: Some(10),
            ..SyncArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_refresh_floor_range() {
        let result = SyncArgs {
            refresh_floor_ms: Some(0),
            ..SyncArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_trade_log_limit_range() {
        let result = SyncArgs {
            trade_log_limit: Some(10_000),
            ..SyncArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn normalizes_symbol_to_uppercase() {
        let symbol = normalize_symbol(" btcusdt ").expect("symbol should normalize");
        assert_eq!(symbol, "BTCUSDT");
    }

    #[test]
    fn rejects_non_alphanumeric_symbol() {
        assert!(normalize_symbol("BTC/USDT").is_err());
        assert!(normalize_symbol("").is_err());
    }

    #[test]
    fn rejects_socket_url_without_ws_scheme() {
        let result = SocketArgs {
            url: "https://example.com/ws".to_string(),
            reconnect_delay_ms: None,
            auto_reconnect: None,
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn socket_args_default_to_auto_reconnect() {
        let config = SocketArgs {
            url: "wss://example.com/ws".to_string(),
            reconnect_delay_ms: None,
            auto_reconnect: None,
        }
        .normalize()
        .expect("socket args should normalize");

        assert!(config.auto_reconnect);
        assert_eq!(config.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
    }
}
