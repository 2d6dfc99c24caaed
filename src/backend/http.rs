use crate::auth::CredentialStore;
use crate::backend::{HistoryRange, RefreshOutcome, SignalOutcome, TradingBackend};
use crate::error::Error;
use crate::market::history::HistoryPoint;
use crate::market::now_unix_ms;
use crate::market::types::{PriceTick, TickSource};
use crate::sim::types::{SimulationRecord, SimulationSettings, Trade};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const ERROR_BODY_MAX_LEN: usize = 512;

fn simulations_endpoint(base_url: &str) -> String {
    format!("{base_url}/trading/simulations")
}

fn stop_endpoint(base_url: &str, id: &str) -> String {
    format!("{base_url}/trading/simulations/{id}/stop")
}

fn refresh_endpoint(base_url: &str, id: &str) -> String {
    format!("{base_url}/trading/simulations/{id}/refresh")
}

fn active_simulations_endpoint(base_url: &str) -> String {
    format!("{base_url}/trading/simulations?status=active")
}

fn trades_endpoint(base_url: &str, id: &str, limit: u32) -> String {
    format!("{base_url}/trading/simulations/{id}/trades?limit={limit}")
}

fn signal_endpoint(base_url: &str, symbol: &str) -> String {
    format!("{base_url}/trading/signal/{}", symbol.to_ascii_uppercase())
}

fn history_endpoint(base_url: &str, symbol: &str, range: &HistoryRange) -> String {
    let mut endpoint = format!("{base_url}/trading/history/{}", symbol.to_ascii_uppercase());
    let mut separator = '?';
    if let Some(years) = range.years {
        endpoint.push_str(&format!("{separator}years={years}"));
        separator = '&';
    }
    if let Some(interval) = &range.interval {
        endpoint.push_str(&format!("{separator}interval={interval}"));
        separator = '&';
    }
    if let Some(limit) = range.limit {
        endpoint.push_str(&format!("{separator}limit={limit}"));
    }
    endpoint
}

fn tickers_endpoint(base_url: &str, symbols: &[String]) -> String {
    let joined = symbols
        .iter()
        .map(|symbol| symbol.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(",");
    format!("{base_url}/crypto/tickers?symbols={joined}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSimulationBody<'a> {
    symbol: &'a str,
    initial_investment: f64,
    settings: &'a SimulationSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerStatsWire {
    symbol: String,
    price: f64,
    price_change: Option<f64>,
    price_change_percent: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    volume_24h: Option<f64>,
    last_update: Option<i64>,
}

impl TryFrom<TickerStatsWire> for PriceTick {
    type Error = Error;

    fn try_from(value: TickerStatsWire) -> Result<Self, Self::Error> {
        if !value.price.is_finite() || value.price < 0.0 {
            return Err(Error::InvalidArgument(
                "ticker price must be finite and non-negative".to_string(),
            ));
        }

        Ok(Self {
            symbol: value.symbol.to_ascii_uppercase(),
            price: value.price,
            price_change: value.price_change,
            price_change_percent: value.price_change_percent,
            high_24h: value.high_24h,
            low_24h: value.low_24h,
            volume_24h: value.volume_24h,
            observed_at: value.last_update.unwrap_or_else(now_unix_ms),
            source: TickSource::Poll,
        })
    }
}

/// `TradingBackend` over the dashboard's REST API. Sends a bearer token from
/// the credential store on every request; a 401 clears the store before
/// surfacing `Unauthorized` so the app layer can tear down the socket.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            credentials,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, Error> {
        let builder = match self.credentials.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited),
            StatusCode::UNAUTHORIZED => {
                if let Err(error) = self.credentials.clear().await {
                    warn!(%error, "failed to clear credentials after 401");
                }
                Err(Error::Unauthorized)
            }
            status if status.is_success() => Ok(response),
            status => {
                let mut message = response.text().await.unwrap_or_default();
                message.truncate(ERROR_BODY_MAX_LEN);
                Err(Error::Backend {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl TradingBackend for HttpBackend {
    async fn create_simulation(
        &self,
        symbol: &str,
        initial_investment: f64,
        settings: &SimulationSettings,
    ) -> Result<SimulationRecord, Error> {
        let body = CreateSimulationBody {
            symbol,
            initial_investment,
            settings,
        };
        let response = self
            .send(
                self.client
                    .post(simulations_endpoint(&self.base_url))
                    .json(&body),
            )
            .await?;
        Ok(response.json::<SimulationRecord>().await?)
    }

    async fn stop_simulation(&self, id: &str) -> Result<(), Error> {
        self.send(self.client.post(stop_endpoint(&self.base_url, id)))
            .await?;
        Ok(())
    }

    async fn refresh_simulation(&self, id: &str) -> Result<RefreshOutcome, Error> {
        let response = self
            .send(self.client.post(refresh_endpoint(&self.base_url, id)))
            .await?;
        Ok(response.json::<RefreshOutcome>().await?)
    }

    async fn get_active_simulations(&self) -> Result<Vec<SimulationRecord>, Error> {
        let response = self
            .send(self.client.get(active_simulations_endpoint(&self.base_url)))
            .await?;
        Ok(response.json::<Vec<SimulationRecord>>().await?)
    }

    async fn get_trades(&self, simulation_id: &str, limit: u32) -> Result<Vec<Trade>, Error> {
        let response = self
            .send(
                self.client
                    .get(trades_endpoint(&self.base_url, simulation_id, limit)),
            )
            .await?;
        Ok(response.json::<Vec<Trade>>().await?)
    }

    async fn get_trading_signal(&self, symbol: &str) -> Result<SignalOutcome, Error> {
        let response = self
            .send(self.client.get(signal_endpoint(&self.base_url, symbol)))
            .await?;
        Ok(response.json::<SignalOutcome>().await?)
    }

    async fn get_historical_series(
        &self,
        symbol: &str,
        range: &HistoryRange,
    ) -> Result<Vec<HistoryPoint>, Error> {
        let response = self
            .send(
                self.client
                    .get(history_endpoint(&self.base_url, symbol, range)),
            )
            .await?;
        Ok(response.json::<Vec<HistoryPoint>>().await?)
    }

    async fn get_ticker_stats(&self, symbols: &[String]) -> Result<Vec<PriceTick>, Error> {
        let response = self
            .send(self.client.get(tickers_endpoint(&self.base_url, symbols)))
            .await?;
        let payload = response.json::<Vec<TickerStatsWire>>().await?;

        let mut ticks = Vec::with_capacity(payload.len());
        for wire in payload {
            ticks.push(wire.try_into()?);
        }
        Ok(ticks)
    }
}
