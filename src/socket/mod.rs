pub mod client;
pub mod wire;

pub use client::{ConnectionState, SocketClient, SocketHandler};
pub use wire::Envelope;
