//! Framed TLS transport.
//!
//! Owns one TLS stream and exposes:
//! - a serialized `send` (all callers funnel into a single writer task,
//!   so the byte stream stays well-framed),
//! - a single-consumer inbound stream of parsed [`Frame`]s.
//!
//! The inbound stream terminating is the sole disconnect signal consumed
//! upstream; read errors and remote close are not surfaced separately.
//!
//! The framed pump is generic over `AsyncRead + AsyncWrite`, so the TLS
//! stream and in-memory test streams share one code path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rustls::pki_types::ServerName;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::config::Config;
use crate::error::{BlynkError, Result};
use crate::protocol::{Frame, FrameBuffer};

/// Inbound frame queue depth.
const INBOUND_QUEUE: usize = 256;

/// Outbound frame queue depth; a full queue applies backpressure to
/// senders.
const OUTBOUND_QUEUE: usize = 256;

/// Maximum frames coalesced into a single write.
const MAX_WRITE_BATCH: usize = 64;

/// Socket read buffer size.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// TCP keep-alive: idle time before the first probe.
const KEEPALIVE_TIME: Duration = Duration::from_secs(10);

/// TCP keep-alive: interval between probes.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// TCP keep-alive: probes before the peer is declared dead.
#[cfg(not(windows))]
const KEEPALIVE_RETRIES: u32 = 3;

/// A live framed connection.
///
/// Dropping the transport tears down both pump tasks.
pub struct Transport {
    outbound: mpsc::Sender<Bytes>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Transport {
    /// Open a TLS connection to the configured endpoint.
    ///
    /// Resolves only once the link is negotiated and readable. An attempt
    /// still waiting after `connect_timeout` is converted into a
    /// [`BlynkError::Connect`] failure.
    pub async fn connect(config: &Config) -> Result<(Self, mpsc::Receiver<Frame>)> {
        let addr = format!("{}:{}", config.host, config.port);

        let tcp = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| BlynkError::Connect(format!("{addr}: connect timed out")))?
            .map_err(|e| BlynkError::Connect(format!("{addr}: {e}")))?;

        configure_keepalive(&tcp)?;
        tcp.set_nodelay(true)?;

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| BlynkError::Connect(format!("invalid server name {:?}: {e}", config.host)))?;
        let connector = TlsConnector::from(Arc::new(config.tls.client_config()));

        let stream = timeout(config.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| BlynkError::Connect(format!("{addr}: TLS handshake timed out")))?
            .map_err(|e| BlynkError::Connect(format!("{addr}: TLS handshake failed: {e}")))?;

        tracing::debug!(%addr, "transport established");
        Ok(Self::start(stream))
    }

    /// Start the framed pump over an already-established stream.
    ///
    /// Returns the transport handle and the inbound frame stream. The
    /// stream yields frames in the exact order the peer framed them and
    /// terminates on remote close or any read error.
    pub fn start<S>(stream: S) -> (Self, mpsc::Receiver<Frame>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (frame_tx, frame_rx) = mpsc::channel(INBOUND_QUEUE);
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);

        let read_task = tokio::spawn(read_loop(read_half, frame_tx));
        let write_task = tokio::spawn(write_loop(out_rx, write_half));

        (
            Self {
                outbound: out_tx,
                read_task,
                write_task,
            },
            frame_rx,
        )
    }

    /// Append a complete encoded frame to the wire.
    ///
    /// Concurrent senders are linearised by the writer task; frames
    /// appear on the wire in the order their sends were accepted.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| BlynkError::NotConnected)
    }

    /// Close the underlying stream and terminate the inbound stream.
    pub fn disconnect(&self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Enable TCP keep-alive probing (10s idle, 5s interval, 3 probes).
fn configure_keepalive(stream: &TcpStream) -> Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    #[cfg(not(windows))]
    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    Ok(())
}

/// Read loop - parses bytes into frames and forwards them.
///
/// Returning drops the frame sender, which terminates the inbound stream.
async fn read_loop<R>(mut reader: R, frames: mpsc::Sender<Frame>)
where
    R: AsyncRead + Unpin,
{
    let mut parser = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("transport closed by peer");
                return;
            }
            Ok(n) => {
                for frame in parser.feed(&buf[..n]) {
                    if frames.send(frame).await.is_err() {
                        // Consumer went away; nothing left to do.
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "transport read failed");
                return;
            }
        }
    }
}

/// Writer loop - receives encoded frames and writes them to the stream.
///
/// Drains additional ready frames and coalesces the batch into a single
/// write before flushing.
async fn write_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        let mut buf = Vec::with_capacity(first.len());
        buf.extend_from_slice(&first);

        let mut batched = 1;
        while batched < MAX_WRITE_BATCH {
            match rx.try_recv() {
                Ok(frame) => {
                    buf.extend_from_slice(&frame);
                    batched += 1;
                }
                Err(_) => break,
            }
        }

        if let Err(e) = writer.write_all(&buf).await {
            tracing::debug!(error = %e, "transport write failed");
            return;
        }
        if let Err(e) = writer.flush().await {
            tracing::debug!(error = %e, "transport flush failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;
    use crate::protocol::{Command, ResponseCode};

    #[tokio::test]
    async fn test_inbound_frames_in_order() {
        let (local, mut remote) = duplex(4096);
        let (_transport, mut frames) = Transport::start(local);

        let mut bytes = Frame::response(1, ResponseCode::Ok).encode();
        bytes.extend(Frame::command(Command::Ping, 2, Bytes::new()).encode());
        remote.write_all(&bytes).await.unwrap();

        assert_eq!(
            frames.recv().await.unwrap(),
            Frame::response(1, ResponseCode::Ok)
        );
        assert_eq!(
            frames.recv().await.unwrap(),
            Frame::command(Command::Ping, 2, Bytes::new())
        );
    }

    #[tokio::test]
    async fn test_outbound_frames_reach_the_wire() {
        let (local, mut remote) = duplex(4096);
        let (transport, _frames) = Transport::start(local);

        let frame = Frame::command(Command::Ping, 42, Bytes::new());
        transport.send(frame.encode().into()).await.unwrap();

        let mut buf = vec![0u8; 7];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, frame.encode());
    }

    #[tokio::test]
    async fn test_remote_close_terminates_stream() {
        let (local, remote) = duplex(4096);
        let (_transport, mut frames) = Transport::start(local);

        drop(remote);
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_terminates_stream_and_send() {
        let (local, _remote) = duplex(4096);
        let (transport, mut frames) = Transport::start(local);

        transport.disconnect();
        assert!(frames.recv().await.is_none());

        // The writer task is gone; sends must fail from here on.
        let frame = Frame::command(Command::Ping, 1, Bytes::new()).encode();
        loop {
            match transport.send(frame.clone().into()).await {
                Err(BlynkError::NotConnected) => break,
                Ok(()) => tokio::task::yield_now().await,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_senders_stay_framed() {
        let (local, mut remote) = duplex(64 * 1024);
        let (transport, _frames) = Transport::start(local);
        let transport = Arc::new(transport);

        let mut tasks = Vec::new();
        for id in 1..=20u16 {
            let transport = transport.clone();
            tasks.push(tokio::spawn(async move {
                let body = format!("1-0\0vw\0{id}\0{id}");
                let frame = Frame::command(Command::Hardware, id, body.into_bytes());
                transport.send(frame.encode().into()).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Re-parse the wire bytes; interleaving would corrupt framing.
        let mut parser = FrameBuffer::new();
        let mut parsed = Vec::new();
        let mut buf = [0u8; 4096];
        while parsed.len() < 20 {
            let n = remote.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed mid-frame");
            parsed.extend(parser.feed(&buf[..n]));
        }
        assert_eq!(parsed.len(), 20);
        assert!(parser.is_empty());
    }
}
