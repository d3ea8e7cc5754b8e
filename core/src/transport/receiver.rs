//! Receiver: accept loop and per-connection frame reader
//!
//! Connections are served one at a time. Each accepted frame is decoded,
//! checked and handed to the consumer over a bounded channel; the consumer
//! owns the `Replica` and decides what to do with it. Frames that fail to
//! decode or verify are logged and dropped without closing the connection.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::message::{decode_value, message_from_value, verify, EnvelopeError, Message};
use crate::wire::{read_frame, read_frame_bounded};

/// Pause after a failed `accept` so a persistent error does not spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// What the receive loop tells its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    /// A sender connected; state from any earlier connection is void
    Connected { peer: SocketAddr },
    /// A verified message, in arrival order
    Message(Message),
    /// The connection is gone
    Disconnected { peer: SocketAddr, reason: ConnectionEnd },
}

/// Why a connection stopped being served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Clean EOF between frames
    PeerClosed,
    /// No complete frame within the read timeout
    TimedOut,
    /// Truncated frame, oversized frame or socket error
    Failed(String),
    /// The event channel was closed
    ConsumerGone,
}

impl fmt::Display for ConnectionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEnd::PeerClosed => write!(f, "peer closed"),
            ConnectionEnd::TimedOut => write!(f, "read timed out"),
            ConnectionEnd::Failed(reason) => write!(f, "{}", reason),
            ConnectionEnd::ConsumerGone => write!(f, "consumer gone"),
        }
    }
}

/// A frame that arrived intact but was not accepted
#[derive(Debug, Error)]
pub enum Rejected {
    #[error("undecodable envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("checksum mismatch (seq {seq:?})")]
    Checksum { seq: Option<u64> },
}

/// Decode one frame payload into a verified message.
///
/// The checksum is checked on the raw JSON object before the message schema
/// is applied, so fields unknown to this build are still covered.
pub fn accept_frame(payload: &[u8]) -> Result<Message, Rejected> {
    let value = decode_value(payload)?;
    if !verify(&value) {
        let seq = value.get("seq").and_then(|s| s.as_u64());
        return Err(Rejected::Checksum { seq });
    }
    Ok(message_from_value(value)?)
}

/// Read frames from one connection until it ends, forwarding accepted
/// messages to `events`.
pub async fn serve_connection<R>(
    mut reader: R,
    config: &SyncConfig,
    events: &mpsc::Sender<ReceiverEvent>,
) -> ConnectionEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::time::timeout(config.read_timeout, async {
            match config.max_frame_len {
                Some(max) => read_frame_bounded(&mut reader, max).await,
                None => read_frame(&mut reader).await,
            }
        })
        .await;

        let payload = match next {
            Err(_) => return ConnectionEnd::TimedOut,
            Ok(Ok(None)) => return ConnectionEnd::PeerClosed,
            Ok(Err(e)) => return ConnectionEnd::Failed(e.to_string()),
            Ok(Ok(Some(payload))) => payload,
        };

        match accept_frame(&payload) {
            Ok(message) => {
                debug!("Received {} seq {}", message.kind(), message.seq);
                if events.send(ReceiverEvent::Message(message)).await.is_err() {
                    return ConnectionEnd::ConsumerGone;
                }
            }
            Err(rejected) => warn!("Dropping frame: {}", rejected),
        }
    }
}

/// Accept senders on `listener` and serve them one after another.
///
/// Returns once the consumer drops its end of the channel.
pub async fn run_receiver(
    listener: TcpListener,
    config: SyncConfig,
    events: mpsc::Sender<ReceiverEvent>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Receiver listening on {}", addr);
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        info!("Sender connected from {}", peer);
        if events.send(ReceiverEvent::Connected { peer }).await.is_err() {
            return;
        }

        let reason = serve_connection(stream, &config, &events).await;
        info!("Sender {} disconnected: {}", peer, reason);
        if reason == ConnectionEnd::ConsumerGone {
            return;
        }
        if events
            .send(ReceiverEvent::Disconnected { peer, reason })
            .await
            .is_err()
        {
            return;
        }
    }
}
