use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Existing series at or below this length are treated as bootstrap data and
/// replaced outright instead of merged.
pub const BACKFILL_THRESHOLD: usize = 100;

/// One point of a price-history series, ordered ascending by resolved
/// timestamp. Backend payloads carry either an epoch-ms `timestamp` or a
/// `date` string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl HistoryPoint {
    pub fn at(timestamp: i64, price: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            date: None,
            price,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }
}

fn parse_date_ms(date: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

/// Keyless points get a synthetic unique key so they are never silently
/// dropped; `index` is the point's position across both input series.
fn point_key(point: &HistoryPoint, index: usize) -> i64 {
    if let Some(timestamp) = point.timestamp {
        return timestamp;
    }
    if let Some(parsed) = point.date.as_deref().and_then(parse_date_ms) {
        return parsed;
    }
    i64::MIN + index as i64
}

/// Reconciles a backfilled series with an incremental one: dedup by
/// timestamp, incoming wins on collision, output sorted ascending. A short
/// existing series (at most [`BACKFILL_THRESHOLD`] points) is not worth
/// preserving and the incoming series is returned as-is.
pub fn merge(existing: &[HistoryPoint], incoming: &[HistoryPoint]) -> Vec<HistoryPoint> {
    if existing.len() <= BACKFILL_THRESHOLD {
        return incoming.to_vec();
    }

    let mut by_key: BTreeMap<i64, HistoryPoint> = BTreeMap::new();
    for (index, point) in existing.iter().chain(incoming).enumerate() {
        by_key.insert(point_key(point, index), point.clone());
    }

    by_key.into_values().collect()
}
