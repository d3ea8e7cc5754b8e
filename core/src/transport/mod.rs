// Transport module: TCP sender link, receiver loop, LAN discovery

pub mod discovery;
pub mod link;
pub mod outbound;
pub mod receiver;

use std::net::SocketAddr;
use thiserror::Error;

use crate::message::{CanonicalError, EnvelopeError};
use crate::wire::FrameError;

pub use discovery::{
    bind_responder, discover, discover_at, respond, DiscoveryError, DATA_PORT, DISCOVERY_PORT,
    DISCOVERY_PROBE, DISCOVERY_REPLY,
};
pub use link::{CloseWatch, SenderLink};
pub use outbound::{Outbound, Planned};
pub use receiver::{
    accept_frame, run_receiver, serve_connection, ConnectionEnd, ReceiverEvent, Rejected,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Canonical encoding failed: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("Connect to {0} timed out")]
    ConnectTimeout(SocketAddr),
}
