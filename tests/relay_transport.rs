// Relay transport against a real signaling server on a loopback port

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use p2pong_sync::network::{signaling, Channel, ChannelEvent, RelayChannel, RelayTransport, Transport};

/// Start the signaling server on an ephemeral port, return its ws URL
fn start_server() -> String {
    let (addr_tx, addr_rx) = mpsc::channel();

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            let _ = signaling::serve(listener).await;
        });
    });

    let addr = addr_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    format!("ws://{}", addr)
}

/// Block until the channel yields a non-message event or the deadline passes
fn wait_event(channel: &mut RelayChannel, timeout: Duration) -> Option<ChannelEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(event) = channel.try_recv() {
            return Some(event);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

/// Dial until the host's registration is visible to the server
fn dial(url: &str, remote_id: &str) -> RelayChannel {
    let mut transport = RelayTransport::new(url);
    for attempt in 0..50 {
        let mut channel = transport
            .connect(&format!("guest_9_{}", attempt), remote_id)
            .unwrap();
        match wait_event(&mut channel, Duration::from_secs(5)) {
            Some(ChannelEvent::Open) => return channel,
            Some(ChannelEvent::Error(_)) => thread::sleep(Duration::from_millis(50)),
            other => panic!("unexpected event while dialing: {:?}", other),
        }
    }
    panic!("could not reach {}", remote_id);
}

#[test]
fn test_relay_pairs_and_forwards_frames() {
    let url = start_server();

    let mut host = RelayTransport::new(url.clone()).listen("host_9").unwrap();
    let mut guest = dial(&url, "host_9");
    assert_eq!(wait_event(&mut host, Duration::from_secs(5)), Some(ChannelEvent::Open));

    guest.send(b"ping".to_vec()).unwrap();
    host.send(b"pong".to_vec()).unwrap();
    assert_eq!(
        wait_event(&mut host, Duration::from_secs(5)),
        Some(ChannelEvent::Message(b"ping".to_vec()))
    );
    assert_eq!(
        wait_event(&mut guest, Duration::from_secs(5)),
        Some(ChannelEvent::Message(b"pong".to_vec()))
    );

    // Host hangs up; the guest is told
    host.close();
    assert_eq!(wait_event(&mut guest, Duration::from_secs(5)), Some(ChannelEvent::Close));
    assert!(host.send(b"late".to_vec()).is_err());
}

#[test]
fn test_duplicate_host_registration_is_rejected() {
    let url = start_server();

    let mut first = RelayTransport::new(url.clone()).listen("host_dup").unwrap();
    // Make sure the first registration landed before the second one
    let _guest = dial(&url, "host_dup");
    assert_eq!(wait_event(&mut first, Duration::from_secs(5)), Some(ChannelEvent::Open));

    let mut second = RelayTransport::new(url).listen("host_dup").unwrap();
    match wait_event(&mut second, Duration::from_secs(5)) {
        Some(ChannelEvent::Error(message)) => assert!(message.contains("taken")),
        other => panic!("expected rejection, got {:?}", other),
    }
}
