use crate::error::Error;
use crate::market::now_unix_ms;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TickSource {
    Push,
    Poll,
}

/// One observation of a symbol's price and 24h statistics, from either the
/// push feed or a poll response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub observed_at: i64,
    pub source: TickSource,
}

impl PriceTick {
    pub fn push(symbol: &str, price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            price_change: None,
            price_change_percent: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            observed_at: now_unix_ms(),
            source: TickSource::Push,
        }
    }

    pub fn poll(symbol: &str, price: f64) -> Self {
        Self {
            source: TickSource::Poll,
            ..Self::push(symbol, price)
        }
    }
}

/// Stored value per symbol: the most recent tick with change fields resolved
/// and 24h statistics carried forward as "last known".
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceCacheEntry {
    pub symbol: String,
    pub price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub observed_at: i64,
}

/// Payload of a `crypto.price.update` envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdateWire {
    pub symbol: String,
    pub price: f64,
    pub price_change_percent_24h: Option<f64>,
    pub high_price_24h: Option<f64>,
    pub low_price_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub last_update: Option<i64>,
}

impl TryFrom<PriceUpdateWire> for PriceTick {
    type Error = Error;

    fn try_from(value: PriceUpdateWire) -> Result<Self, Self::Error> {
        let symbol = value.symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(Error::InvalidArgument(
                "price update symbol must be non-empty".to_string(),
            ));
        }
        if !value.price.is_finite() || value.price < 0.0 {
            return Err(Error::InvalidArgument(
                "price must be finite and non-negative".to_string(),
            ));
        }

        Ok(Self {
            symbol,
            price: value.price,
            price_change: None,
            price_change_percent: value.price_change_percent_24h,
            high_24h: value.high_price_24h,
            low_24h: value.low_price_24h,
            volume_24h: value.volume_24h,
            observed_at: value.last_update.unwrap_or_else(now_unix_ms),
            source: TickSource::Push,
        })
    }
}

pub fn parse_price_update_payload(data: simd_json::OwnedValue) -> Result<PriceTick, Error> {
    let wire: PriceUpdateWire = simd_json::serde::from_owned_value(data)?;
    wire.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> simd_json::OwnedValue {
        let mut bytes = json.as_bytes().to_vec();
        simd_json::to_owned_value(&mut bytes).expect("test payload must be valid json")
    }

    #[test]
    fn parses_valid_price_update_payload() {
        let tick = parse_price_update_payload(payload(
            r#"{"symbol":"btcusdt","price":50000.5,"priceChangePercent24h":1.2,"highPrice24h":51000.0,"lowPrice24h":49000.0,"volume24h":1234.5,"lastUpdate":1700000000000}"#,
        ))
        .expect("payload should parse");

        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.price, 50000.5);
        assert_eq!(tick.price_change_percent, Some(1.2));
        assert_eq!(tick.volume_24h, Some(1234.5));
        assert_eq!(tick.observed_at, 1_700_000_000_000);
        assert_eq!(tick.source, TickSource::Push);
    }

    #[test]
    fn parses_minimal_price_update_payload() {
        let tick = parse_price_update_payload(payload(r#"{"symbol":"ETHUSDT","price":3000.0}"#))
            .expect("minimal payload should parse");

        assert_eq!(tick.symbol, "ETHUSDT");
        assert!(tick.price_change_percent.is_none());
        assert!(tick.observed_at > 0);
    }

    #[test]
    fn rejects_non_finite_price() {
        let result = parse_price_update_payload(payload(r#"{"symbol":"BTCUSDT","price":-1.0}"#));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_symbol() {
        let result = parse_price_update_payload(payload(r#"{"symbol":"  ","price":100.0}"#));
        assert!(result.is_err());
    }
}
