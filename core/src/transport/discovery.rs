// LAN discovery: UDP probe/reply for finding a receiver
//
// The receiver answers exact probe datagrams on the discovery port. A sender
// broadcasts the probe and takes the first reply's source address, with the
// data port substituted, as the receiver's TCP endpoint.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// UDP port the receiver listens on for probes
pub const DISCOVERY_PORT: u16 = 50000;

/// TCP port the receiver accepts senders on
pub const DATA_PORT: u16 = 50010;

pub const DISCOVERY_PROBE: &[u8] = b"NOTEPAD_DISCOVERY_V1";
pub const DISCOVERY_REPLY: &[u8] = b"NOTEPAD_HERE_V1";

const DATAGRAM_BUF: usize = 1024;

/// Pause after a failed receive so a persistent error does not spin
const RECV_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to bind discovery socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Discovery I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bind the responder socket on all interfaces.
pub async fn bind_responder(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    UdpSocket::bind(addr)
        .await
        .map_err(|source| DiscoveryError::Bind { port, source })
}

/// Answer probes on `socket` for as long as the task runs.
///
/// Receive errors are logged and skipped. Some platforms report an ICMP
/// "port unreachable" from an earlier reply as an error on the next receive.
pub async fn respond(socket: &UdpSocket) {
    let mut buf = [0u8; DATAGRAM_BUF];
    loop {
        let (n, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Discovery receive failed: {}", e);
                tokio::time::sleep(RECV_BACKOFF).await;
                continue;
            }
        };
        if &buf[..n] != DISCOVERY_PROBE {
            debug!("Ignoring {} byte datagram from {}", n, from);
            continue;
        }
        info!("Discovery probe from {}, replying", from);
        if let Err(e) = socket.send_to(DISCOVERY_REPLY, from).await {
            warn!("Discovery reply to {} failed: {}", from, e);
        }
    }
}

/// Broadcast a probe and wait up to `wait` for a receiver to answer.
pub async fn discover(
    discovery_port: u16,
    data_port: u16,
    wait: Duration,
) -> Result<Option<SocketAddr>, DiscoveryError> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    let target = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, discovery_port));
    probe(&socket, target, data_port, wait).await
}

/// Send a probe to one address and wait up to `wait` for the answer.
pub async fn discover_at(
    target: SocketAddr,
    data_port: u16,
    wait: Duration,
) -> Result<Option<SocketAddr>, DiscoveryError> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
    probe(&socket, target, data_port, wait).await
}

async fn probe(
    socket: &UdpSocket,
    target: SocketAddr,
    data_port: u16,
    wait: Duration,
) -> Result<Option<SocketAddr>, DiscoveryError> {
    socket.send_to(DISCOVERY_PROBE, target).await?;
    debug!("Sent discovery probe to {}", target);

    let mut buf = [0u8; DATAGRAM_BUF];
    let reply = tokio::time::timeout(wait, async {
        loop {
            let (n, from) = socket.recv_from(&mut buf).await?;
            if &buf[..n] == DISCOVERY_REPLY {
                return Ok::<_, std::io::Error>(from);
            }
        }
    })
    .await;

    match reply {
        Ok(Ok(from)) => {
            let receiver = SocketAddr::new(from.ip(), data_port);
            info!("Found receiver at {}", receiver);
            Ok(Some(receiver))
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Ok(None),
    }
}
