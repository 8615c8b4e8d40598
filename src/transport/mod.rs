pub mod scoped;
pub mod socket;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::TransportMode;

pub use scoped::ScopedConnection;
pub use socket::SocketTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("channel broken: {0}")]
    BrokenChannel(String),
}

/// Where a transport points, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub mode: TransportMode,
}

/// One outbound channel to the aggregator.
///
/// Implementations are not internally synchronized; the delivery engine
/// serializes access through a mutex.
#[async_trait]
pub trait Transport: Send {
    /// Establish the channel. A no-op when already open.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Write one complete frame. A failure leaves the transport closed.
    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Release the channel. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn endpoint(&self) -> Endpoint;
}
