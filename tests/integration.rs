//! Integration tests for blynk-client.
//!
//! These exercise the public surface end-to-end: framing against the
//! correlator and router, the authentication material, and the framed
//! transport over in-memory streams.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;

use blynk_client::auth::hash_password;
use blynk_client::compress::decompress;
use blynk_client::protocol::{join_body, FrameBuffer, HEADER_SIZE};
use blynk_client::{
    BlynkError, Command, Correlator, Frame, Reply, RequestKind, ResponseCode, Transport,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Framing round-trip across the catalogue.
#[test]
fn test_frame_roundtrip() {
    let frames = vec![
        Frame::command(Command::Ping, 42, Bytes::new()),
        Frame::command(Command::Hardware, 1, Bytes::from_static(b"1-0\0vw\x007\x00255")),
        Frame::command(Command::LoadProfileGzipped, 65535, Bytes::new()),
        Frame::response(7, ResponseCode::Ok),
        Frame::response(9, ResponseCode::ServerError),
    ];

    let mut wire = Vec::new();
    for frame in &frames {
        wire.extend(frame.encode());
    }

    let mut parser = FrameBuffer::new();
    assert_eq!(parser.feed(&wire), frames);
    assert!(parser.is_empty());
}

/// PING encodes to the fixed 7-byte shape.
#[test]
fn test_ping_wire_shape() {
    let encoded = Frame::command(Command::Ping, 42, Bytes::new()).encode();
    assert_eq!(encoded, [0x06, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x00]);

    let mut parser = FrameBuffer::new();
    let frames = parser.feed(&encoded);
    assert_eq!(frames, vec![Frame::command(Command::Ping, 42, Bytes::new())]);
}

/// RESPONSE frames are exactly 7 bytes regardless of the status value.
#[test]
fn test_response_is_headers_only() {
    for code in [ResponseCode::Ok, ResponseCode::Unknown(0xDEAD_BEEF)] {
        let encoded = Frame::response(1, code).encode();
        assert_eq!(encoded.len(), HEADER_SIZE);

        let mut parser = FrameBuffer::new();
        let frames = parser.feed(&encoded);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().is_empty());
    }
}

/// The LOGIN body carries the salted digest, never the password.
#[test]
fn test_login_payload_shape() {
    let digest = hash_password("p", "a@b");
    let body = join_body(&["a@b", digest.as_str(), "iOS", "1.0.0", "App"]);

    let text = String::from_utf8(body.clone()).unwrap();
    let fields: Vec<&str> = text.split('\0').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "a@b");
    assert_eq!(fields[1], digest);
    assert_eq!(fields[4], "App");
    assert_ne!(fields[1], "p");

    let frame = Frame::command(Command::Login, 1, body.clone());
    let encoded = frame.encode();
    assert_eq!(
        u32::from_be_bytes([encoded[3], encoded[4], encoded[5], encoded[6]]),
        body.len() as u32
    );
}

/// OK response resolves a pending status-reply request; nothing reaches
/// observers.
#[tokio::test]
async fn test_ok_response_resolves_pending() {
    let correlator = Correlator::new();
    let (id, handle) = correlator
        .allocate(RequestKind::ResponseOnly, TIMEOUT)
        .unwrap();

    // Feed the wire bytes of a RESPONSE for that id.
    let mut parser = FrameBuffer::new();
    let frames = parser.feed(&Frame::response(id, ResponseCode::Ok).encode());
    for frame in frames {
        if let Frame::Response { message_id, code } = frame {
            assert!(correlator.resolve_response(message_id, code));
        }
    }

    assert_eq!(handle.wait().await.unwrap(), Reply::Code(ResponseCode::Ok));
}

/// An unmatched RESPONSE is not consumed, so the router can surface it.
#[tokio::test]
async fn test_unmatched_response_left_for_observers() {
    let correlator = Correlator::new();
    assert!(!correlator.resolve_response(9, ResponseCode::ServerError));
}

/// Profile load: the reply is a command frame sharing the request id,
/// carrying zlib data.
#[tokio::test]
async fn test_profile_dual_reply_flow() {
    use std::io::Write;

    let correlator = Correlator::new();
    let (id, handle) = correlator
        .allocate(RequestKind::DataResponse, TIMEOUT)
        .unwrap();

    let profile = br#"{"dashBoards":[{"id":1,"name":"Demo"}]}"#;
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(profile).unwrap();
    let compressed = enc.finish().unwrap();
    assert_eq!(compressed[0], 0x78);

    let reply = Frame::command(Command::LoadProfileGzipped, id, compressed);
    assert!(correlator.resolve_data(reply).is_none());

    match handle.wait().await.unwrap() {
        Reply::Data(frame) => {
            assert_eq!(decompress(frame.payload()).unwrap(), profile);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

/// Digest determinism and email case-insensitivity.
#[test]
fn test_hash_determinism() {
    assert_eq!(hash_password("p", "a@b"), hash_password("p", "A@B"));
    assert_eq!(
        hash_password("secret", "User@Host"),
        hash_password("secret", "user@host")
    );
    assert_ne!(hash_password("p", "a@b"), hash_password("q", "a@b"));
}

/// Full request/reply cycle over an in-memory transport: encode, frame,
/// correlate, resolve.
#[tokio::test]
async fn test_request_reply_over_transport() {
    let (local, mut remote) = duplex(4096);
    let (transport, mut frames) = Transport::start(local);
    let correlator = Arc::new(Correlator::new());

    // Fake server: answer every command frame with OK.
    tokio::spawn(async move {
        let mut parser = FrameBuffer::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match remote.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for frame in parser.feed(&buf[..n]) {
                let reply = Frame::response(frame.message_id(), ResponseCode::Ok).encode();
                if remote.write_all(&reply).await.is_err() {
                    return;
                }
            }
        }
    });

    // Routing task standing in for the session controller's pump.
    let pump_correlator = correlator.clone();
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Frame::Response { message_id, code } = frame {
                pump_correlator.resolve_response(message_id, code);
            }
        }
    });

    for _ in 0..10 {
        let (id, handle) = correlator
            .allocate(RequestKind::ResponseOnly, TIMEOUT)
            .unwrap();
        let frame = Frame::command(Command::Ping, id, Bytes::new());
        transport.send(frame.encode().into()).await.unwrap();
        assert_eq!(handle.wait().await.unwrap(), Reply::Code(ResponseCode::Ok));
    }
    assert_eq!(correlator.pending_len(), 0);
}

/// Transport termination fails all pending requests, exactly once each.
#[tokio::test]
async fn test_stream_end_fails_pending() {
    let (local, remote) = duplex(4096);
    let (_transport, mut frames) = Transport::start(local);
    let correlator = Arc::new(Correlator::new());

    let (_, h1) = correlator
        .allocate(RequestKind::ResponseOnly, TIMEOUT)
        .unwrap();
    let (_, h2) = correlator
        .allocate(RequestKind::DataResponse, TIMEOUT)
        .unwrap();

    drop(remote);
    assert!(frames.recv().await.is_none());

    correlator.fail_all(|| BlynkError::ConnectionClosed);
    assert!(matches!(h1.wait().await, Err(BlynkError::ConnectionClosed)));
    assert!(matches!(h2.wait().await, Err(BlynkError::ConnectionClosed)));
}

/// Events fan out to every subscriber of a broadcast channel.
#[tokio::test]
async fn test_event_fanout() {
    use blynk_client::Event;

    let (tx, mut rx1) = broadcast::channel::<Event>(16);
    let mut rx2 = tx.subscribe();

    tx.send(Event::HardwareConnected {
        dash_id: 1,
        device_id: 0,
    })
    .unwrap();

    let expected = Event::HardwareConnected {
        dash_id: 1,
        device_id: 0,
    };
    assert_eq!(rx1.recv().await.unwrap(), expected);
    assert_eq!(rx2.recv().await.unwrap(), expected);
}
