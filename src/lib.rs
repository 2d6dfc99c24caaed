//! Real-time market-data and simulation-synchronization core.
//!
//! The crate splits into a reconnecting WebSocket feed ([`socket`],
//! [`market::feed`]), a dual-source price cache ([`market::cache`]), a REST
//! polling fallback ([`market::poller`]), the backend client ([`backend`])
//! and the simulation refresh orchestrator ([`sim`]).

pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod market;
pub mod sim;
pub mod socket;

pub use error::Error;
