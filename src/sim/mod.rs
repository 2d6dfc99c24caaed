pub mod scheduler;
pub mod service;
pub mod types;

pub use scheduler::RefreshTrigger;
pub use service::SimulationService;
pub use types::{
    PredictionPoint, SignalKind, SimulationRecord, SimulationSettings, SimulationStatus, Trade,
    TradeSide, TradingSignal,
};
