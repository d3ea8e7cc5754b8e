//! Sender link: one outbound connection and its sequence counter
//!
//! The counter belongs to the link, so every new connection starts again at
//! seq 1. One lock covers seq allocation, the frame write and the counter
//! bump: concurrent callers can neither interleave frames nor reuse a seq.
//!
//! The receiver never writes back, so the read half of a TCP link is only
//! good for noticing that the receiver hung up. `CloseWatch` owns it.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::TransportError;
use crate::message::{encode, Message, MessageBody};
use crate::wire::write_frame;

struct LinkState<W> {
    writer: W,
    /// Seq of the last message fully written, 0 before the first
    last_seq: u64,
}

pub struct SenderLink<W> {
    state: Mutex<LinkState<W>>,
}

impl SenderLink<OwnedWriteHalf> {
    /// Open a TCP connection to a receiver.
    ///
    /// The returned watch resolves once the receiver closes its end, which
    /// it does after its read timeout.
    pub async fn connect(
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<(Self, CloseWatch<OwnedReadHalf>), TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(addr))??;
        stream.set_nodelay(true)?;
        info!("Connected to receiver at {}", addr);

        let (reader, writer) = stream.into_split();
        Ok((Self::new(writer), CloseWatch::new(reader)))
    }
}

impl<W> SenderLink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected writer. The seq counter starts at zero.
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(LinkState { writer, last_seq: 0 }),
        }
    }

    /// Stamp, encode and send a message body under the next seq.
    ///
    /// Returns the seq used. The counter only advances once the whole
    /// frame has been written; a failed write leaves the link unusable and
    /// the caller should drop it and reconnect.
    pub async fn send(&self, body: MessageBody) -> Result<u64, TransportError> {
        let mut state = self.state.lock().await;
        let seq = state.last_seq + 1;

        let mut message = Message {
            seq,
            body,
            checksum: None,
        };
        message.stamp()?;
        let bytes = encode(&message)?;

        write_frame(&mut state.writer, &bytes).await?;
        state.last_seq = seq;
        debug!("Sent {} seq {} ({} bytes)", message.kind(), seq, bytes.len());
        Ok(seq)
    }

    /// Seq of the last message sent on this link
    pub async fn last_seq(&self) -> u64 {
        self.state.lock().await.last_seq
    }

    /// Flush and close the write side.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.writer.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().writer
    }
}

/// Read side of a sender link, kept only to see the peer go away
pub struct CloseWatch<R> {
    reader: R,
}

impl<R> CloseWatch<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Wait until the peer closes the connection or it fails.
    ///
    /// Anything the peer writes is discarded. Cancel safe.
    pub async fn closed(&mut self) {
        let mut buf = [0u8; 256];
        loop {
            match self.reader.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => debug!("Discarding {} unexpected bytes from receiver", n),
                Err(e) => {
                    debug!("Link read failed: {}", e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{decode, PatchOp};
    use crate::wire::read_frame;
    use std::sync::Arc;

    async fn drain(wire: Vec<u8>) -> Vec<Message> {
        let mut src: &[u8] = &wire;
        let mut out = Vec::new();
        while let Some(frame) = read_frame(&mut src).await.unwrap() {
            out.push(decode(&frame).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_seq_starts_at_one_and_increments() {
        let link = SenderLink::new(Vec::new());
        assert_eq!(link.last_seq().await, 0);

        let first = link.send(MessageBody::Full { text: "a".into() }).await.unwrap();
        let second = link
            .send(MessageBody::Patch {
                patches: vec![PatchOp::replace(0, "b")],
            })
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(link.last_seq().await, 2);
    }

    #[tokio::test]
    async fn test_sent_frames_decode_and_verify() {
        let link = SenderLink::new(Vec::new());
        link.send(MessageBody::Full { text: "hello".into() }).await.unwrap();
        link.send(MessageBody::Full { text: "world".into() }).await.unwrap();

        let messages = drain(link.into_inner()).await;
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(Message::verify));
        assert_eq!(messages[0].seq, 1);
        assert_eq!(messages[1].seq, 2);
    }

    #[tokio::test]
    async fn test_fresh_link_restarts_sequence() {
        let first = SenderLink::new(Vec::new());
        first.send(MessageBody::Full { text: "x".into() }).await.unwrap();
        first.send(MessageBody::Full { text: "y".into() }).await.unwrap();

        let second = SenderLink::new(Vec::new());
        let seq = second.send(MessageBody::Full { text: "z".into() }).await.unwrap();
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn test_concurrent_senders_get_unique_ordered_seqs() {
        let link = Arc::new(SenderLink::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let link = link.clone();
            handles.push(tokio::spawn(async move {
                link.send(MessageBody::Full {
                    text: format!("writer {}", i),
                })
                .await
                .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let link = Arc::try_unwrap(link).ok().unwrap();
        let messages = drain(link.into_inner()).await;
        let seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_write_does_not_advance_seq() {
        let mock = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let link = SenderLink::new(mock);

        let result = link.send(MessageBody::Full { text: "lost".into() }).await;
        assert!(result.is_err());
        assert_eq!(link.last_seq().await, 0);
    }

    #[tokio::test]
    async fn test_close_watch_resolves_when_peer_drops() {
        let (ours, theirs) = tokio::io::duplex(64);
        let mut watch = CloseWatch::new(ours);
        drop(theirs);

        let closed = tokio::time::timeout(Duration::from_secs(1), watch.closed()).await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_close_watch_ignores_data_while_open() {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let mut watch = CloseWatch::new(ours);
        theirs.write_all(b"unexpected").await.unwrap();

        let early = tokio::time::timeout(Duration::from_millis(100), watch.closed()).await;
        assert!(early.is_err());

        drop(theirs);
        let closed = tokio::time::timeout(Duration::from_secs(1), watch.closed()).await;
        assert!(closed.is_ok());
    }
}
