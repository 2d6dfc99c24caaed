use crate::config::SyncConfig;
use crate::sim::service::{run_refresh, ServiceInner};
use std::sync::Weak;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Manual,
    PriceDelta,
    SignalTransition,
    Periodic,
}

impl RefreshTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::PriceDelta => "price_delta",
            Self::SignalTransition => "signal_transition",
            Self::Periodic => "periodic",
        }
    }
}

pub(crate) enum SchedulerEvent {
    PriceDelta,
    SignalPreempt,
}

/// Named-timer owner for one active simulation: the debounce deadline, the
/// periodic interval, and the settle delay all live in the single task this
/// handle controls, so teardown cancels every pending timer at once.
pub(crate) struct SchedulerHandle {
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
    events: UnboundedSender<SchedulerEvent>,
}

impl SchedulerHandle {
    pub fn notify_price_delta(&self) {
        let _ = self.events.send(SchedulerEvent::PriceDelta);
    }

    pub fn notify_signal_preempt(&self) {
        let _ = self.events.send(SchedulerEvent::SignalPreempt);
    }

    /// Cancel without awaiting the task; used when the scheduler task itself
    /// initiates the teardown.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub async fn shutdown(mut self) {
        self.cancellation_token.cancel();
        let _ = (&mut self.join_handle).await;
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

pub(crate) fn spawn(service: Weak<ServiceInner>, config: SyncConfig) -> SchedulerHandle {
    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let join_handle = tokio::spawn(async move {
        // Creation already returned fresh state; automatic refreshing only
        // arms after the settle delay.
        tokio::select! {
            _ = task_token.cancelled() => return,
            _ = time::sleep(Duration::from_millis(config.settle_delay_ms)) => {}
        }
        {
            let Some(inner) = service.upgrade() else { return };
            inner.state.lock().scheduling.auto_refresh = true;
        }

        let period = Duration::from_millis(config.periodic_refresh_ms);
        let mut periodic = time::interval_at(Instant::now() + period, period);
        periodic.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let debounce_window = Duration::from_millis(config.debounce_window_ms);
        let mut debounce_deadline: Option<Instant> = None;

        loop {
            let armed_deadline = debounce_deadline;
            let debounce_wait = async move {
                match armed_deadline {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = periodic.tick() => {
                    let Some(inner) = service.upgrade() else { break };
                    run_refresh(&inner, RefreshTrigger::Periodic).await;
                }
                _ = debounce_wait => {
                    debounce_deadline = None;
                    let Some(inner) = service.upgrade() else { break };
                    run_refresh(&inner, RefreshTrigger::PriceDelta).await;
                }
                event = events_rx.recv() => {
                    match event {
                        Some(SchedulerEvent::PriceDelta) => {
                            // Repeated deltas inside the window coalesce
                            // into a single refresh.
                            debounce_deadline = Some(Instant::now() + debounce_window);
                        }
                        Some(SchedulerEvent::SignalPreempt) => {
                            // An actionable signal cancels the pending
                            // debounce and refreshes immediately.
                            debounce_deadline = None;
                            let Some(inner) = service.upgrade() else { break };
                            run_refresh(&inner, RefreshTrigger::SignalTransition).await;
                        }
                        None => break,
                    }
                }
            }
        }
    });

    SchedulerHandle {
        cancellation_token,
        join_handle,
        events: events_tx,
    }
}
