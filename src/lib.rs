//! # zabbix-sender
//!
//! Rust client for the Zabbix trapper protocol.
//!
//! Pushes monitoring data points (host, item key, value, optional clock) to a
//! Zabbix server or proxy over TCP, and interprets the server's reply.
//!
//! ## Architecture
//!
//! - **Wire format** ([`protocol`]): `"ZBXD\x01"` + 8-byte length + JSON
//! - **Buffer** ([`DataBuffer`]): points accumulated before sending
//! - **Batching** ([`batch`]): buffer split into chunks, one connection each
//! - **Replies** ([`response`]): counters recovered from the `info` text
//! - **Front-ends**: [`Sender`] (tokio, chunks in parallel) and
//!   [`BlockingSender`] (chunks one after another)
//!
//! Every chunk yields one [`SendOutcome`]; a failed chunk never aborts the
//! rest of the batch.
//!
//! ## Example
//!
//! ```no_run
//! use zabbix_sender::Sender;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut sender = Sender::builder()
//!         .server("zabbix.example.net")
//!         .port(10051)
//!         .build();
//!
//!     sender.add_data("web01", "cpu.load", 0.42, None);
//!
//!     for outcome in sender.send_data(None, None).await {
//!         match outcome.into_result() {
//!             Ok(reply) => println!("processed {}", reply.info.processed),
//!             Err(e) => eprintln!("send failed: {}", e),
//!         }
//!     }
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod outcome;
pub mod protocol;
pub mod response;
pub mod transport;

mod blocking;
mod buffer;
mod client;

pub use blocking::BlockingSender;
pub use buffer::DataBuffer;
pub use client::{Sender, SenderBuilder};
pub use config::SenderConfig;
pub use error::{Result, SenderError};
pub use message::{DataPoint, ItemValue};
pub use outcome::SendOutcome;
pub use response::{FailurePolicy, Reply, ReplyInfo};
pub use transport::TcpTransport;
