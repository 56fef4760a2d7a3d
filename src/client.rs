//! Sender builder and the async sender.
//!
//! The [`SenderBuilder`] provides a fluent API for configuring the server
//! address, timeouts and reply policy. [`Sender`] is the non-blocking
//! variant: every chunk of a batch is sent on its own connection, all at
//! once, and the outcomes are collected in chunk order.
//!
//! # Example
//!
//! ```no_run
//! use zabbix_sender::{DataPoint, Sender};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut sender = Sender::builder().server("zabbix.example.net").build();
//!
//!     sender.add_data("web01", "cpu.load", 0.42, None);
//!     sender.add_data("web01", "proc.count", 211, Some(1_700_000_000));
//!
//!     for outcome in sender.send_data(None, Some(200)).await {
//!         println!("{}", outcome);
//!     }
//!     sender.clear_data();
//!
//!     let outcome = sender.send_single(DataPoint::new("web01", "status", "up")).await;
//!     assert!(outcome.is_success());
//! }
//! ```
//!
//! # Cancellation
//!
//! Dropping the future returned by a send method stops chunks that have not
//! finished writing their frame yet (they end as `Cancelled`). Chunks whose
//! frame is already on the wire keep running in the background until the
//! reply arrives or the timeout expires, so the server never sees a request
//! abandoned mid-exchange. Their outcomes are discarded.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::batch::encode_chunks;
use crate::blocking::BlockingSender;
use crate::buffer::DataBuffer;
use crate::config::SenderConfig;
use crate::error::{Result, SenderError};
use crate::message::{DataPoint, ItemValue, SenderMessage};
use crate::outcome::{ConnectionErrorKind, SendOutcome};
use crate::protocol::{encode_message, FrameAssembler};
use crate::response::{interpret, FailurePolicy, Reply};
use crate::transport::{AsyncTransport, TcpTransport, Transport};

/// Read buffer size for reply chunks.
const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Builder for configuring and creating a sender.
///
/// `build()` produces the async [`Sender`], `build_blocking()` the
/// [`BlockingSender`]; both share the same configuration.
pub struct SenderBuilder<T = TcpTransport> {
    config: SenderConfig,
    transport: T,
}

impl SenderBuilder<TcpTransport> {
    /// Create a new builder with default settings and a TCP transport.
    pub fn new() -> Self {
        Self {
            config: SenderConfig::default(),
            transport: TcpTransport::new(),
        }
    }
}

impl Default for SenderBuilder<TcpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SenderBuilder<T> {
    /// Replace the whole configuration.
    pub fn config(mut self, config: SenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the server host name or IP.
    ///
    /// Default: 127.0.0.1
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Set the server trapper port.
    ///
    /// Default: 10051
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the bound on connect plus the full exchange, per chunk.
    ///
    /// Default: 5 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set how replies reporting rejected points are classified.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Shorthand for `failure_policy(FailurePolicy::Strict)`.
    pub fn strict(self) -> Self {
        self.failure_policy(FailurePolicy::Strict)
    }

    /// Set the largest accepted reply payload.
    pub fn max_reply_size(mut self, size: u32) -> Self {
        self.config.max_reply_size = size;
        self
    }

    /// Limit simultaneously open connections (async sender only).
    ///
    /// Default: unlimited
    pub fn max_concurrent_connections(mut self, limit: usize) -> Self {
        self.config.max_concurrent_connections = Some(limit);
        self
    }

    /// Use a custom transport.
    pub fn transport<U>(self, transport: U) -> SenderBuilder<U> {
        SenderBuilder {
            config: self.config,
            transport,
        }
    }

    /// Build the async sender.
    pub fn build(self) -> Sender<T>
    where
        T: AsyncTransport,
    {
        Sender::with_transport(self.config, self.transport)
    }

    /// Build the blocking sender.
    pub fn build_blocking(self) -> BlockingSender<T>
    where
        T: Transport,
    {
        BlockingSender::with_transport(self.config, self.transport)
    }
}

/// Non-blocking sender.
///
/// Owns a [`DataBuffer`]; sending never clears it.
pub struct Sender<T: AsyncTransport = TcpTransport> {
    config: Arc<SenderConfig>,
    transport: Arc<T>,
    limiter: Option<Arc<Semaphore>>,
    buffer: DataBuffer,
}

impl Sender<TcpTransport> {
    /// Create a new sender builder.
    pub fn builder() -> SenderBuilder<TcpTransport> {
        SenderBuilder::new()
    }

    /// Create a TCP sender with the given configuration.
    pub fn new(config: SenderConfig) -> Self {
        Self::with_transport(config, TcpTransport::new())
    }
}

impl<T: AsyncTransport> Sender<T> {
    /// Create a sender over a custom transport.
    pub fn with_transport(config: SenderConfig, transport: T) -> Self {
        let limiter = config
            .max_concurrent_connections
            .filter(|&limit| limit > 0)
            .map(|limit| Arc::new(Semaphore::new(limit)));

        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            limiter,
            buffer: DataBuffer::new(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// The owned buffer.
    pub fn buffer(&self) -> &DataBuffer {
        &self.buffer
    }

    /// Mutable access to the owned buffer.
    pub fn buffer_mut(&mut self) -> &mut DataBuffer {
        &mut self.buffer
    }

    /// Buffer a data point for a later `send_data`.
    pub fn add_data(
        &mut self,
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ItemValue>,
        clock: Option<i64>,
    ) {
        self.buffer.add(host, key, value, clock);
    }

    /// Buffer an already-built data point.
    pub fn add_point(&mut self, point: DataPoint) {
        self.buffer.push(point);
    }

    /// Remove all buffered points.
    pub fn clear_data(&mut self) {
        self.buffer.clear();
    }

    /// Copy of the buffered points.
    pub fn data(&self) -> Vec<DataPoint> {
        self.buffer.snapshot()
    }

    /// Remove one buffered point; `true` if it was found.
    pub fn remove_data_point(&mut self, point: &DataPoint) -> bool {
        self.buffer.remove(point)
    }

    /// Send the buffered points, at most `max_per_conn` per connection.
    ///
    /// `packet_clock` is applied by the server to points without a clock.
    /// The buffer is left untouched.
    pub async fn send_data(
        &self,
        packet_clock: Option<i64>,
        max_per_conn: Option<usize>,
    ) -> Vec<SendOutcome> {
        self.send_buffered(self.buffer.as_slice(), max_per_conn, packet_clock)
            .await
    }

    /// Send each buffered point on its own connection.
    ///
    /// Outcomes line up with `data()`, which makes it the way to find out
    /// which individual points the server rejects.
    pub async fn send_one_by_one(&self) -> Vec<SendOutcome> {
        self.send_data(None, Some(1)).await
    }

    /// Send `points` split into chunks of at most `max_per_conn`.
    ///
    /// Every chunk is started immediately; one outcome per chunk is returned
    /// in chunk order once all of them have finished.
    pub async fn send_buffered(
        &self,
        points: &[DataPoint],
        max_per_conn: Option<usize>,
        packet_clock: Option<i64>,
    ) -> Vec<SendOutcome> {
        let frames = encode_chunks(points, max_per_conn, packet_clock);
        if frames.is_empty() {
            return Vec::new();
        }

        tracing::debug!(
            points = points.len(),
            chunks = frames.len(),
            server = %self.config.address(),
            "Sending buffered data"
        );

        self.run_chunks(frames).await
    }

    /// Send one data point right away, bypassing the buffer.
    pub async fn send_single(&self, point: DataPoint) -> SendOutcome {
        let points = [point];
        let frame = encode_message(&SenderMessage::sender_data(&points, None));
        self.run_one(frame).await
    }

    /// Send one data point as if relayed by the proxy named `proxy`.
    ///
    /// Without a proxy name this is [`send_single`](Self::send_single).
    pub async fn send_as_proxy(&self, point: DataPoint, proxy: Option<&str>) -> SendOutcome {
        let Some(proxy) = proxy else {
            return self.send_single(point).await;
        };

        let points = [point];
        let frame = encode_message(&SenderMessage::history_data(proxy, &points));
        self.run_one(frame).await
    }

    async fn run_one(&self, frame: Result<Bytes>) -> SendOutcome {
        match self.run_chunks(vec![frame]).await.pop() {
            Some(outcome) => outcome,
            None => SendOutcome::ConnectionError {
                kind: ConnectionErrorKind::Dropped,
                detail: "no outcome produced".to_string(),
            },
        }
    }

    /// Spawn one exchange per frame and wait for all of them.
    async fn run_chunks(&self, frames: Vec<Result<Bytes>>) -> Vec<SendOutcome> {
        // Never sent on; dropping it (with this future) is the cancel signal.
        let (_cancel, cancel_rx) = watch::channel(());

        let handles: Vec<JoinHandle<SendOutcome>> = frames
            .into_iter()
            .enumerate()
            .map(|(chunk, frame)| self.spawn_exchange(chunk, frame, cancel_rx.clone()))
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| SendOutcome::ConnectionError {
                    kind: ConnectionErrorKind::Dropped,
                    detail: format!("chunk task failed: {}", e),
                })
            })
            .collect()
    }

    fn spawn_exchange(
        &self,
        chunk: usize,
        frame: Result<Bytes>,
        cancel: watch::Receiver<()>,
    ) -> JoinHandle<SendOutcome> {
        let transport = self.transport.clone();
        let config = self.config.clone();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let result = match frame {
                Ok(frame) => exchange(&*transport, &config, limiter, frame, cancel).await,
                Err(e) => Err(e),
            };

            let outcome = SendOutcome::from_result(result);
            if !outcome.is_success() {
                tracing::warn!(chunk, server = %config.address(), %outcome, "Chunk send failed");
            }
            outcome
        })
    }
}

/// One request/reply exchange on a fresh connection.
async fn exchange<T: AsyncTransport>(
    transport: &T,
    config: &SenderConfig,
    limiter: Option<Arc<Semaphore>>,
    frame: Bytes,
    mut cancel: watch::Receiver<()>,
) -> Result<Reply> {
    // Held until the exchange ends.
    let _permit = match limiter {
        Some(semaphore) => tokio::select! {
            biased;
            _ = cancel.changed() => return Err(SenderError::Cancelled),
            permit = semaphore.acquire_owned() => {
                Some(permit.map_err(|_| SenderError::Cancelled)?)
            }
        },
        None => None,
    };

    let deadline = Instant::now() + config.timeout;

    // Until the frame is fully written the exchange may be abandoned.
    let mut conn = tokio::select! {
        biased;
        _ = cancel.changed() => return Err(SenderError::Cancelled),
        connected = timeout_at(deadline, connect_and_write(transport, config, &frame)) => {
            connected.map_err(|_| SenderError::Timeout)??
        }
    };

    // The request is on the wire: finish reading even if cancelled.
    let reply = timeout_at(deadline, read_reply(&mut conn, config.max_reply_size))
        .await
        .map_err(|_| SenderError::Timeout)??;

    // One request per connection; the client closes.
    if let Err(e) = conn.shutdown().await {
        tracing::debug!(error = %e, "Error closing connection");
    }

    tracing::debug!(server = %config.address(), response = %reply, "Received reply");
    interpret(reply, config.failure_policy)
}

async fn connect_and_write<T: AsyncTransport>(
    transport: &T,
    config: &SenderConfig,
    frame: &[u8],
) -> Result<T::Connection> {
    let mut conn = transport
        .connect(&config.server, config.port)
        .await
        .map_err(|source| SenderError::Connect {
            addr: config.address(),
            source,
        })?;

    conn.write_all(frame).await?;
    conn.flush().await?;

    tracing::debug!(bytes = frame.len(), server = %config.address(), "Frame sent");
    Ok(conn)
}

/// Read exactly one reply frame, suspending whenever too few bytes arrived.
///
/// Stops reading as soon as the frame is complete or malformed.
pub(crate) async fn read_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_reply_size: u32,
) -> Result<Value> {
    let mut assembler = FrameAssembler::with_max_payload(max_reply_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(SenderError::ConnectionClosed);
        }

        if let Some(reply) = assembler.push(&buf[..n])? {
            if assembler.discarded() > 0 {
                tracing::debug!(
                    bytes = assembler.discarded(),
                    "Ignoring bytes after reply frame"
                );
            }
            return Ok(reply);
        }
    }
}
