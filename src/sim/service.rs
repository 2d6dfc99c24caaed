use crate::backend::{HistoryRange, RefreshOutcome, TradingBackend};
use crate::config::{normalize_symbol, SyncConfig, SIGNAL_CONFIDENCE_FLOOR};
use crate::error::Error;
use crate::market::cache::{PriceCache, PriceSubscription};
use crate::market::history::{self, HistoryPoint};
use crate::market::types::PriceTick;
use crate::sim::scheduler::{self, RefreshTrigger, SchedulerHandle};
use crate::sim::types::{
    PredictionPoint, SimulationRecord, SimulationSettings, Trade, TradingSignal,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Default)]
pub(crate) struct SchedulingState {
    pub auto_refresh: bool,
    pub last_refresh_at: Option<Instant>,
    pub last_signal_fetch_at: Option<Instant>,
    pub last_observed_signal: Option<crate::sim::types::SignalKind>,
    pub last_observed_price: Option<f64>,
}

#[derive(Default)]
pub(crate) struct SimState {
    pub simulation: Option<SimulationRecord>,
    pub signal: Option<TradingSignal>,
    pub history: Vec<HistoryPoint>,
    pub predictions: Vec<PredictionPoint>,
    pub trades: Vec<Trade>,
    pub scheduling: SchedulingState,
}

pub(crate) struct ServiceInner {
    pub backend: Arc<dyn TradingBackend>,
    pub cache: Arc<PriceCache>,
    pub config: SyncConfig,
    pub state: Mutex<SimState>,
    pub scheduler: Mutex<Option<SchedulerHandle>>,
    pub price_subscription: Mutex<Option<PriceSubscription>>,
}

/// Owns the one active simulation record and the policy deciding when to
/// call backend refresh. Price deltas arm a debounce, actionable signal
/// transitions preempt it, and a periodic tick catches everything else.
pub struct SimulationService {
    inner: Arc<ServiceInner>,
}

impl SimulationService {
    pub fn new(
        backend: Arc<dyn TradingBackend>,
        cache: Arc<PriceCache>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                backend,
                cache,
                config,
                state: Mutex::new(SimState::default()),
                scheduler: Mutex::new(None),
                price_subscription: Mutex::new(None),
            }),
        }
    }

    pub async fn create(
        &self,
        initial_investment: f64,
        symbol: &str,
        settings: SimulationSettings,
    ) -> Result<SimulationRecord, Error> {
        if !initial_investment.is_finite() || initial_investment <= 0.0 {
            return Err(Error::InvalidArgument(
                "initialInvestment must be a finite positive number".to_string(),
            ));
        }
        let symbol = normalize_symbol(symbol)?;

        let record = self
            .inner
            .backend
            .create_simulation(&symbol, initial_investment, &settings)
            .await?;

        self.activate(record.clone()).await;
        Ok(record)
    }

    /// Re-attaches to a simulation the backend still reports as active,
    /// starting the same scheduling as `create` without creating anything.
    pub async fn resume(&self) -> Result<Option<SimulationRecord>, Error> {
        let records = self.inner.backend.get_active_simulations().await?;
        let Some(record) = records.into_iter().find(|record| record.status.is_active()) else {
            return Ok(None);
        };

        info!(id = %record.id, symbol = %record.symbol, "resuming active simulation");
        self.activate(record.clone()).await;
        Ok(Some(record))
    }

    /// Stops the simulation. The backend call is best-effort; local state is
    /// cleared unconditionally and the call is idempotent.
    pub async fn stop(&self) {
        let id = {
            self.inner
                .state
                .lock()
                .simulation
                .as_ref()
                .map(|simulation| simulation.id.clone())
        };

        if let Some(id) = id {
            if let Err(error) = self.inner.backend.stop_simulation(&id).await {
                warn!(%error, "backend stop failed, clearing local state anyway");
            }
        }

        let handle = self.inner.scheduler.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        self.inner.price_subscription.lock().take();
        *self.inner.state.lock() = SimState::default();
    }

    /// Throttled refresh; no-op inside the floor since the last attempt.
    pub async fn refresh(&self) {
        run_refresh(&self.inner, RefreshTrigger::Manual).await;
    }

    /// Throttled independently of `refresh`; `force` bypasses the window.
    pub async fn fetch_signal(&self, symbol: &str, force: bool) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            let now = Instant::now();
            if !force {
                if let Some(last) = state.scheduling.last_signal_fetch_at {
                    let refetch = Duration::from_millis(inner.config.signal_refetch_ms);
                    if now.duration_since(last) < refetch {
                        debug!("signal fetch skipped by throttle");
                        return;
                    }
                }
            }
            state.scheduling.last_signal_fetch_at = Some(now);
        }

        match inner.backend.get_trading_signal(symbol).await {
            Ok(outcome) => {
                inner
                    .cache
                    .update(PriceTick::poll(symbol, outcome.current_price));

                let signal_kind = outcome.signal.signal;
                let preempt = {
                    let mut state = inner.state.lock();
                    absorb_history(&mut state.history, outcome.history);
                    if let Some(predictions) = outcome.predictions {
                        state.predictions = predictions;
                    }
                    record_signal(&mut state, outcome.signal)
                };

                if preempt {
                    debug!(signal = signal_kind.as_str(), "actionable signal transition");
                    if let Some(handle) = inner.scheduler.lock().as_ref() {
                        handle.notify_signal_preempt();
                    }
                }
            }
            Err(error) if error.is_rate_limited() => {
                debug!("signal fetch rate limited, skipping cycle");
            }
            Err(error) => warn!(%error, symbol, "signal fetch failed"),
        }
    }

    pub fn simulation(&self) -> Option<SimulationRecord> {
        self.inner.state.lock().simulation.clone()
    }

    pub fn signal(&self) -> Option<TradingSignal> {
        self.inner.state.lock().signal.clone()
    }

    pub fn history(&self) -> Vec<HistoryPoint> {
        self.inner.state.lock().history.clone()
    }

    pub fn predictions(&self) -> Vec<PredictionPoint> {
        self.inner.state.lock().predictions.clone()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.inner.state.lock().trades.clone()
    }

    async fn activate(&self, record: SimulationRecord) {
        // Replace any previous simulation's scheduling outright.
        if let Some(handle) = self.inner.scheduler.lock().take() {
            handle.cancel();
        }
        self.inner.price_subscription.lock().take();

        let symbol = record.symbol.clone();
        {
            let mut state = self.inner.state.lock();
            *state = SimState::default();
            // Creation returned fresh state, so it counts as the initial
            // refresh for the throttle floor.
            state.scheduling.last_refresh_at = Some(Instant::now());
            state.simulation = Some(record);
        }

        self.install_price_trigger(&symbol);
        *self.inner.scheduler.lock() = Some(scheduler::spawn(
            Arc::downgrade(&self.inner),
            self.inner.config.clone(),
        ));

        // Backfill before the signal fetch so the short signal history
        // merges into the long series instead of replacing it. Backfill
        // failure is non-fatal; the next signal fetch supplies history.
        let range = HistoryRange::years(self.inner.config.backfill_years);
        match self
            .inner
            .backend
            .get_historical_series(&symbol, &range)
            .await
        {
            Ok(points) => {
                let mut state = self.inner.state.lock();
                if state.simulation.is_some() {
                    state.history = points;
                }
            }
            Err(error) => warn!(%error, symbol, "initial history backfill failed"),
        }

        self.fetch_signal(&symbol, true).await;
    }

    fn install_price_trigger(&self, symbol: &str) {
        let weak = Arc::downgrade(&self.inner);
        let subscription = self.inner.cache.on_change(Some(symbol), move |entry| {
            let Some(inner) = weak.upgrade() else { return };

            let changed = {
                let mut state = inner.state.lock();
                let previous = state.scheduling.last_observed_price.replace(entry.price);
                state.scheduling.auto_refresh
                    && matches!(previous, Some(price) if price != entry.price)
            };

            if changed {
                if let Some(handle) = inner.scheduler.lock().as_ref() {
                    handle.notify_price_delta();
                }
            }
        });

        *self.inner.price_subscription.lock() = Some(subscription);
    }
}

/// The throttled refresh all four trigger paths funnel into.
pub(crate) async fn run_refresh(inner: &Arc<ServiceInner>, trigger: RefreshTrigger) {
    let floor = Duration::from_millis(inner.config.refresh_floor_ms);
    let id = {
        let mut state = inner.state.lock();
        let Some(id) = state.simulation.as_ref().map(|simulation| simulation.id.clone()) else {
            return;
        };

        let now = Instant::now();
        if let Some(last) = state.scheduling.last_refresh_at {
            if now.duration_since(last) < floor {
                debug!(trigger = trigger.as_str(), "refresh skipped by throttle floor");
                return;
            }
        }
        // Attempt time is recorded before the call; the check is advisory
        // and the last response to land wins.
        state.scheduling.last_refresh_at = Some(now);
        id
    };

    match inner.backend.refresh_simulation(&id).await {
        Ok(outcome) => apply_refresh_outcome(inner, outcome).await,
        Err(error) if error.is_rate_limited() => {
            debug!(trigger = trigger.as_str(), "refresh rate limited, skipping cycle");
        }
        Err(error) => warn!(%error, trigger = trigger.as_str(), "refresh failed"),
    }
}

async fn apply_refresh_outcome(inner: &Arc<ServiceInner>, outcome: RefreshOutcome) {
    let symbol = outcome.simulation.symbol.clone();
    let simulation_id = outcome.simulation.id.clone();
    let still_active = outcome.simulation.status.is_active();
    let signal_kind = outcome.signal.signal;

    inner
        .cache
        .update(PriceTick::poll(&symbol, outcome.current_price));

    let preempt = {
        let mut state = inner.state.lock();
        if state.simulation.is_none() {
            // Stopped while the refresh was in flight.
            return;
        }
        state.simulation = Some(outcome.simulation);
        if let Some(points) = outcome.history {
            state.history = points;
        }
        if let Some(predictions) = outcome.predictions {
            state.predictions = predictions;
        }
        record_signal(&mut state, outcome.signal)
    };

    if !still_active {
        info!(id = %simulation_id, "backend reports simulation no longer active, clearing");
        if let Some(handle) = inner.scheduler.lock().take() {
            handle.cancel();
        }
        inner.price_subscription.lock().take();
        *inner.state.lock() = SimState::default();
        return;
    }

    if preempt {
        debug!(signal = signal_kind.as_str(), "actionable signal transition");
        if let Some(handle) = inner.scheduler.lock().as_ref() {
            handle.notify_signal_preempt();
        }
    }

    match inner
        .backend
        .get_trades(&simulation_id, inner.config.trade_log_limit)
        .await
    {
        Ok(trades) => {
            let mut state = inner.state.lock();
            if state.simulation.is_some() {
                state.trades = trades;
            }
        }
        Err(error) if error.is_rate_limited() => debug!("trade log rate limited"),
        Err(error) => warn!(%error, "trade log fetch failed"),
    }
}

/// Stores the signal and reports whether it preempts the debounce: a
/// transition to an actionable kind (from anything else, the unset state
/// included) at or above the confidence floor.
fn record_signal(state: &mut SimState, incoming: TradingSignal) -> bool {
    let previous = state.scheduling.last_observed_signal;
    let transitioned = incoming.signal.is_actionable()
        && previous != Some(incoming.signal)
        && incoming.confidence >= SIGNAL_CONFIDENCE_FLOOR;
    state.scheduling.last_observed_signal = Some(incoming.signal);
    state.signal = Some(incoming);
    transitioned
}

/// Merge when the stored series is a long backfill and the incoming one is
/// shorter; otherwise the incoming series replaces it.
fn absorb_history(current: &mut Vec<HistoryPoint>, incoming: Vec<HistoryPoint>) {
    if current.len() > history::BACKFILL_THRESHOLD && incoming.len() < current.len() {
        *current = history::merge(current, &incoming);
    } else {
        *current = incoming;
    }
}
