//! # blynk-client
//!
//! Async Rust client for the Blynk-family IoT control protocol over TLS.
//!
//! The crate is the wire-protocol transport engine: framed TLS
//! connection, request/response correlation over wrapping 16-bit ids,
//! a single-writer message pump, keep-alive, automatic reconnect with
//! re-authentication, and an inbound router that turns raw frames into
//! domain events.
//!
//! ## Architecture
//!
//! - **Protocol** (7-byte header): binary framing, opcode and status
//!   catalogues, incremental parsing
//! - **Transport**: TLS stream with a serialized writer task and a
//!   single-consumer inbound frame stream
//! - **Client**: session controller owning login, keep-alive and the
//!   reconnect state machine
//!
//! ## Example
//!
//! ```ignore
//! use blynk_client::{Action, Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Config::new("blynk.example.org"));
//!     client.connect("user@example.org", "secret", "Blynk").await?;
//!
//!     let mut events = client.subscribe();
//!     client.activate_dashboard(1).await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod auth;
pub mod compress;
pub mod config;
pub mod correlator;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;

mod client;
mod router;

pub use action::Action;
pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use correlator::{Correlator, PendingHandle, Reply, RequestKind};
pub use error::{BlynkError, Result};
pub use event::{ConnectionState, Event, Hooks};
pub use protocol::{Command, Frame, ResponseCode};
pub use transport::{TlsPolicy, Transport};
