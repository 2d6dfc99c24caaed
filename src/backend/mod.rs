pub mod http;

use crate::error::Error;
use crate::market::history::HistoryPoint;
use crate::market::types::PriceTick;
use crate::sim::types::{
    PredictionPoint, SimulationRecord, SimulationSettings, Trade, TradingSignal,
};
use async_trait::async_trait;
use serde::Deserialize;

pub use http::HttpBackend;

/// Response of a simulation refresh call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub simulation: SimulationRecord,
    pub current_price: f64,
    pub signal: TradingSignal,
    pub history: Option<Vec<HistoryPoint>>,
    pub predictions: Option<Vec<PredictionPoint>>,
}

/// Response of a trading-signal fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOutcome {
    pub current_price: f64,
    pub signal: TradingSignal,
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    pub predictions: Option<Vec<PredictionPoint>>,
}

/// Scope of a historical-series fetch: a multi-year daily backfill or a
/// short interval window.
#[derive(Debug, Clone, Default)]
pub struct HistoryRange {
    pub years: Option<u8>,
    pub interval: Option<String>,
    pub limit: Option<u32>,
}

impl HistoryRange {
    pub fn years(years: u8) -> Self {
        Self {
            years: Some(years),
            ..Self::default()
        }
    }
}

/// The trading backend as consumed by this core. Object-safe so tests
/// substitute mocks.
#[async_trait]
pub trait TradingBackend: Send + Sync {
    async fn create_simulation(
        &self,
        symbol: &str,
        initial_investment: f64,
        settings: &SimulationSettings,
    ) -> Result<SimulationRecord, Error>;

    async fn stop_simulation(&self, id: &str) -> Result<(), Error>;

    async fn refresh_simulation(&self, id: &str) -> Result<RefreshOutcome, Error>;

    async fn get_active_simulations(&self) -> Result<Vec<SimulationRecord>, Error>;

    async fn get_trades(&self, simulation_id: &str, limit: u32) -> Result<Vec<Trade>, Error>;

    async fn get_trading_signal(&self, symbol: &str) -> Result<SignalOutcome, Error>;

    async fn get_historical_series(
        &self,
        symbol: &str,
        range: &HistoryRange,
    ) -> Result<Vec<HistoryPoint>, Error>;

    async fn get_ticker_stats(&self, symbols: &[String]) -> Result<Vec<PriceTick>, Error>;
}
