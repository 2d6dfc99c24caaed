// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use marketsync::backend::{HistoryRange, RefreshOutcome, SignalOutcome, TradingBackend};
use marketsync::market::{HistoryPoint, PriceTick};
use marketsync::sim::{
    SignalKind, SimulationRecord, SimulationSettings, SimulationStatus, Trade, TradeSide,
    TradingSignal,
};
use marketsync::Error;
use parking_lot::Mutex;

pub fn record(id: &str, symbol: &str) -> SimulationRecord {
    SimulationRecord {
        id: id.to_string(),
        symbol: symbol.to_string(),
        initial_investment: 1_000.0,
        current_balance: 1_000.0,
        holdings: 0.0,
        total_trades: 0,
        total_profit: 0.0,
        status: SimulationStatus::Active,
        settings: SimulationSettings::default(),
    }
}

pub fn trade(id: &str, simulation_id: &str) -> Trade {
    Trade {
        id: id.to_string(),
        simulation_id: simulation_id.to_string(),
        side: TradeSide::Buy,
        symbol: "BTC".to_string(),
        price: 50_000.0,
        amount: 0.01,
        total: 500.0,
        profit: None,
        executed_at: 1_700_000_000_000,
    }
}

pub fn signal(kind: SignalKind, confidence: u8) -> TradingSignal {
    TradingSignal {
        signal: kind,
        confidence,
        reasons: Vec::new(),
    }
}

#[derive(Clone, Copy)]
pub enum MockFailure {
    RateLimited,
    ServerError,
}

impl MockFailure {
    fn into_error(self) -> Error {
        match self {
            Self::RateLimited => Error::RateLimited,
            Self::ServerError => Error::Backend {
                status: 500,
                message: "internal error".to_string(),
            },
        }
    }
}

/// Canned-response backend. Every call increments its counter so tests
/// assert on how often the orchestrator reached out, not just on state.
pub struct MockBackend {
    pub create_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub signal_calls: AtomicUsize,
    pub trades_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub ticker_calls: AtomicUsize,

    pub refresh_price: Mutex<f64>,
    pub refresh_signal: Mutex<TradingSignal>,
    pub refresh_status: Mutex<SimulationStatus>,
    pub refresh_failure: Mutex<Option<MockFailure>>,
    pub signal_response: Mutex<SignalOutcome>,
    pub active: Mutex<Vec<SimulationRecord>>,
    pub history_points: Mutex<Vec<HistoryPoint>>,
    pub trades: Mutex<Vec<Trade>>,
    pub ticker_ticks: Mutex<Vec<PriceTick>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            signal_calls: AtomicUsize::new(0),
            trades_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            refresh_price: Mutex::new(50_000.0),
            refresh_signal: Mutex::new(signal(SignalKind::Hold, 10)),
            refresh_status: Mutex::new(SimulationStatus::Active),
            refresh_failure: Mutex::new(None),
            signal_response: Mutex::new(SignalOutcome {
                current_price: 50_000.0,
                signal: signal(SignalKind::Hold, 10),
                history: Vec::new(),
                predictions: None,
            }),
            active: Mutex::new(Vec::new()),
            history_points: Mutex::new(Vec::new()),
            trades: Mutex::new(Vec::new()),
            ticker_ticks: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradingBackend for MockBackend {
    async fn create_simulation(
        &self,
        symbol: &str,
        initial_investment: f64,
        settings: &SimulationSettings,
    ) -> Result<SimulationRecord, Error> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut created = record("sim-1", symbol);
        created.initial_investment = initial_investment;
        created.current_balance = initial_investment;
        created.settings = settings.clone();
        Ok(created)
    }

    async fn stop_simulation(&self, _id: &str) -> Result<(), Error> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_simulation(&self, id: &str) -> Result<RefreshOutcome, Error> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.refresh_failure.lock() {
            return Err(failure.into_error());
        }

        let mut simulation = record(id, "BTC");
        simulation.status = *self.refresh_status.lock();
        simulation.total_trades += 1;
        Ok(RefreshOutcome {
            simulation,
            current_price: *self.refresh_price.lock(),
            signal: self.refresh_signal.lock().clone(),
            history: None,
            predictions: None,
        })
    }

    async fn get_active_simulations(&self) -> Result<Vec<SimulationRecord>, Error> {
        Ok(self.active.lock().clone())
    }

    async fn get_trades(&self, _simulation_id: &str, _limit: u32) -> Result<Vec<Trade>, Error> {
        self.trades_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.trades.lock().clone())
    }

    async fn get_trading_signal(&self, _symbol: &str) -> Result<SignalOutcome, Error> {
        self.signal_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.signal_response.lock().clone())
    }

    async fn get_historical_series(
        &self,
        _symbol: &str,
        _range: &HistoryRange,
    ) -> Result<Vec<HistoryPoint>, Error> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history_points.lock().clone())
    }

    async fn get_ticker_stats(&self, _symbols: &[String]) -> Result<Vec<PriceTick>, Error> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ticker_ticks.lock().clone())
    }
}

/// Lets spawned tasks observe timer wakeups under the paused clock.
pub async fn run_until_idle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
