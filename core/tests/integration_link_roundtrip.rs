//! End-to-end tests over loopback TCP
//!
//! Sender side: `Outbound` plans, `SenderLink` sends.
//! Receiver side: `run_receiver` feeds events into a consumer-owned `Replica`.
//!
//! Run with: cargo test --test integration_link_roundtrip

use std::time::{Duration, Instant};

use padsync_core::message::{encode, Message, MessageBody, PatchOp};
use padsync_core::replica::{ApplyOutcome, Replica, ReplicaState};
use padsync_core::transport::{run_receiver, ConnectionEnd, Outbound, ReceiverEvent, SenderLink};
use padsync_core::wire::write_frame;
use padsync_core::{PatchConfig, SyncConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

async fn start_receiver() -> (std::net::SocketAddr, mpsc::Receiver<ReceiverEvent>) {
    start_receiver_with(SyncConfig::default()).await
}

async fn start_receiver_with(
    config: SyncConfig,
) -> (std::net::SocketAddr, mpsc::Receiver<ReceiverEvent>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(run_receiver(listener, config, tx));
    (addr, rx)
}

async fn next_event(rx: &mut mpsc::Receiver<ReceiverEvent>) -> ReceiverEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for receiver event")
        .expect("receiver loop ended")
}

async fn next_message(rx: &mut mpsc::Receiver<ReceiverEvent>) -> Message {
    match next_event(rx).await {
        ReceiverEvent::Message(message) => message,
        other => panic!("expected a message, got {:?}", other),
    }
}

fn document(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("line number {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_full_then_patches_reach_replica() {
    let (addr, mut rx) = start_receiver().await;
    let (link, _watch) = SenderLink::connect(addr, WAIT).await.unwrap();

    let settle = Duration::from_millis(400);
    let start = Instant::now();
    let mut outbound = Outbound::new(settle, PatchConfig::default(), start);
    let mut replica = Replica::new();

    assert!(matches!(next_event(&mut rx).await, ReceiverEvent::Connected { .. }));

    let edits = [
        document(10),
        document(10).replace("line number 3", "third line, edited"),
        format!("{}\nline number 10", document(10).replace("line number 3", "third line, edited")),
        document(10).replace("line number 3", "third line, edited"),
    ];

    for (i, text) in edits.iter().enumerate() {
        let now = start + Duration::from_secs(i as u64 * 2);
        outbound.observe(text, now);
        let planned = outbound.poll(now + settle).expect("edit should produce a send");

        let seq = link.send(planned.body.clone()).await.unwrap();
        assert_eq!(seq, i as u64 + 1);
        outbound.commit(planned);

        let message = next_message(&mut rx).await;
        assert!(message.verify());
        assert!(replica.apply(&message).is_applied());
        assert_eq!(replica.text(), text.as_str());
        if i == 0 {
            assert_eq!(message.kind(), "full");
        } else {
            assert_eq!(message.kind(), "patch");
        }
    }

    assert_eq!(replica.state(), ReplicaState::Synced(4));
}

#[tokio::test]
async fn test_large_rewrite_is_sent_full() {
    let (addr, mut rx) = start_receiver().await;
    let (link, _watch) = SenderLink::connect(addr, WAIT).await.unwrap();
    next_event(&mut rx).await;

    let mut replica = Replica::new();
    link.send(MessageBody::Full { text: document(10) }).await.unwrap();
    replica.apply(&next_message(&mut rx).await);

    let start = Instant::now();
    let mut outbound = Outbound::new(Duration::ZERO, PatchConfig::default(), start);
    outbound.observe(&document(10), start);
    let planned = outbound.poll(start).unwrap();
    outbound.commit(planned);

    let rewritten = "something\nelse\nentirely";
    outbound.observe(rewritten, start);
    let planned = outbound.poll(start).unwrap();
    assert!(matches!(planned.body, MessageBody::Full { .. }));

    link.send(planned.body.clone()).await.unwrap();
    assert_eq!(replica.apply(&next_message(&mut rx).await), ApplyOutcome::Replaced);
    assert_eq!(replica.text(), rewritten);
}

#[tokio::test]
async fn test_reconnect_restarts_sequence_and_replica() {
    let (addr, mut rx) = start_receiver().await;
    let mut replica = Replica::new();

    let (first, _first_watch) = SenderLink::connect(addr, WAIT).await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ReceiverEvent::Connected { .. }));
    for text in ["one", "two", "three"] {
        first.send(MessageBody::Full { text: text.into() }).await.unwrap();
        replica.apply(&next_message(&mut rx).await);
    }
    assert_eq!(replica.last_seq(), 3);

    first.shutdown().await.unwrap();
    drop(first);
    assert!(matches!(
        next_event(&mut rx).await,
        ReceiverEvent::Disconnected { .. }
    ));

    let (second, _second_watch) = SenderLink::connect(addr, WAIT).await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ReceiverEvent::Connected { .. }));
    replica.reset();

    let seq = second.send(MessageBody::Full { text: "fresh".into() }).await.unwrap();
    assert_eq!(seq, 1);
    assert_eq!(
        replica.apply(&next_message(&mut rx).await),
        ApplyOutcome::Replaced
    );
    assert_eq!(replica.text(), "fresh");
}

#[tokio::test]
async fn test_idle_close_is_seen_and_next_edit_resent_full() {
    let config = SyncConfig {
        read_timeout: Duration::from_millis(300),
        ..SyncConfig::default()
    };
    let (addr, mut rx) = start_receiver_with(config).await;
    let mut replica = Replica::new();
    let start = Instant::now();
    let mut outbound = Outbound::new(Duration::ZERO, PatchConfig::default(), start);

    let (link, mut watch) = SenderLink::connect(addr, WAIT).await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ReceiverEvent::Connected { .. }));
    outbound.observe("one", start);
    let planned = outbound.poll(start).unwrap();
    link.send(planned.body.clone()).await.unwrap();
    outbound.commit(planned);
    replica.apply(&next_message(&mut rx).await);

    // The sender goes quiet and the receiver gives up on it
    assert!(matches!(
        next_event(&mut rx).await,
        ReceiverEvent::Disconnected {
            reason: ConnectionEnd::TimedOut,
            ..
        }
    ));
    tokio::time::timeout(WAIT, watch.closed())
        .await
        .expect("sender did not see the receiver close");
    drop(watch);
    drop(link);
    assert!(!outbound.has_unsent());

    outbound.observe("one\ntwo", start);
    assert!(outbound.has_unsent());

    let (link, _watch) = SenderLink::connect(addr, WAIT).await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ReceiverEvent::Connected { .. }));
    replica.reset();
    outbound.reset();

    let planned = outbound.poll(start).unwrap();
    assert!(matches!(planned.body, MessageBody::Full { .. }));
    assert_eq!(link.send(planned.body.clone()).await.unwrap(), 1);
    outbound.commit(planned);

    assert_eq!(
        replica.apply(&next_message(&mut rx).await),
        ApplyOutcome::Replaced
    );
    assert_eq!(replica.text(), "one\ntwo");
}

#[tokio::test]
async fn test_tampered_and_stale_frames_are_dropped() {
    let (addr, mut rx) = start_receiver().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    next_event(&mut rx).await;
    let mut replica = Replica::new();

    let good = Message::full(5, "a\nb\nc").stamped().unwrap();
    write_frame(&mut stream, &encode(&good).unwrap()).await.unwrap();

    let mut tampered = Message::patch(6, vec![PatchOp::replace(1, "B")])
        .stamped()
        .unwrap();
    tampered.body = MessageBody::Patch {
        patches: vec![PatchOp::replace(1, "evil")],
    };
    write_frame(&mut stream, &encode(&tampered).unwrap()).await.unwrap();

    let stale = Message::full(3, "old").stamped().unwrap();
    write_frame(&mut stream, &encode(&stale).unwrap()).await.unwrap();

    let next = Message::patch(7, vec![PatchOp::replace(2, "C")])
        .stamped()
        .unwrap();
    write_frame(&mut stream, &encode(&next).unwrap()).await.unwrap();

    // The tampered frame never reaches the consumer
    let received: Vec<Message> = vec![
        next_message(&mut rx).await,
        next_message(&mut rx).await,
        next_message(&mut rx).await,
    ];
    assert_eq!(
        received.iter().map(|m| m.seq).collect::<Vec<_>>(),
        vec![5, 3, 7]
    );

    let outcomes: Vec<ApplyOutcome> = received.iter().map(|m| replica.apply(m)).collect();
    assert_eq!(
        outcomes,
        vec![
            ApplyOutcome::Replaced,
            ApplyOutcome::Stale { seq: 3, last: 5 },
            ApplyOutcome::Patched,
        ]
    );
    assert_eq!(replica.text(), "a\nb\nC");
}
