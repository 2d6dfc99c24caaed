use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Active,
    Stopped,
    Completed,
}

impl SimulationStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One running strategy instance as the backend reports it. Created by
/// `create`, mutated only by refresh responses or `stop`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRecord {
    pub id: String,
    pub symbol: String,
    pub initial_investment: f64,
    pub current_balance: f64,
    pub holdings: f64,
    pub total_trades: u32,
    pub total_profit: f64,
    pub status: SimulationStatus,
    #[serde(default)]
    pub settings: SimulationSettings,
}

/// Strategy knobs, round-tripped to the backend untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_amount_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        }
    }

    /// Buy and sell transitions preempt the refresh debounce; hold never
    /// does.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

/// Replaced wholesale on every refresh; never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradingSignal {
    pub signal: SignalKind,
    pub confidence: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub simulation_id: String,
    pub side: TradeSide,
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    pub total: f64,
    pub profit: Option<f64>,
    pub executed_at: i64,
}

/// Model output attached to signal and refresh responses; replaced on
/// arrival, cleared on stop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPoint {
    pub timestamp: i64,
    pub predicted_price: f64,
    pub confidence: Option<u8>,
}
