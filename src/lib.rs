//! # bercon: a BattlEye RCON client
//!
//! An async client for the BattlEye RCON protocol (DayZ, Arma 2/3 and other
//! BattlEye-protected servers) built on Tokio.
//!
//! ## Features
//!
//! - **Single-writer event loop**: all UDP writes and protocol state live in
//!   one manager task; callers communicate over bounded channels, no locks
//!   on the hot path.
//! - **Multipart assembly**: long command replies are reassembled in strict
//!   page order, with gaps surfaced as a per-call error.
//! - **Keepalive**: optional periodic empty commands keep the session logged
//!   in (BattlEye drops sessions idle beyond ~45 s).
//! - **Backpressure and deadlines**: `send` fails fast with `BufferFull`
//!   when all 256 sequence ids are busy, and every call is bounded by the
//!   configured deadline.
//! - **Typed errors**: stable [`Error`] variants for protocol and transport
//!   failures.
//! - **Reply parsing and rendering**: typed `players` / `admins` / `bans`
//!   parsers with table, JSON, Markdown and HTML output for the CLI.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bercon::{Config, Connection};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()
//!         .deadline(Duration::from_secs(3))
//!         .keepalive(Duration::from_secs(10))
//!         .start_keepalive(true);
//!
//!     let conn = Connection::open_with("127.0.0.1:2302", "MyRconPassword", config).await?;
//!
//!     // Server messages and login notifications.
//!     if let Some(mut events) = conn.events() {
//!         tokio::spawn(async move {
//!             while let Some(event) = events.recv().await {
//!                 println!("[msg seq={}] {}", event.seq, String::from_utf8_lossy(&event.body));
//!             }
//!         });
//!     }
//!
//!     let players = conn.send("players").await?;
//!     println!("{}", String::from_utf8_lossy(&players));
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Connection facade   │  open / send / close / tunables
//! ├──────────────────────┤
//! │  Manager task        │  single writer: seq ids, in-flight
//! │                      │  table, acks, keepalive
//! ├───────────┬──────────┤
//! │  Reader   │ Dispatch │  datagram decode / consumer events
//! ├───────────┴──────────┤
//! │  UDP socket          │  connected, one per session
//! └──────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod parser;
pub mod rc;
pub mod render;

pub use client::{Connection, PacketEvent};
pub use config::Config;
pub use error::{Error, Result};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
