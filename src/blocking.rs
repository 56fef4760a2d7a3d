//! Blocking sender.
//!
//! Same operations as the async [`Sender`](crate::Sender), but chunks are
//! sent one after another on the calling thread. Every chunk still gets its
//! own connection and its own outcome; a failed chunk does not stop the
//! ones after it.
//!
//! # Example
//!
//! ```no_run
//! use zabbix_sender::{BlockingSender, DataPoint};
//!
//! let mut sender = BlockingSender::builder()
//!     .server("zabbix.example.net")
//!     .build_blocking();
//!
//! sender.add_data("web01", "cpu.load", 0.42, None);
//! let outcomes = sender.send_data(None, None);
//! assert_eq!(outcomes.len(), 1);
//!
//! let reply = sender
//!     .send_single(DataPoint::new("web01", "status", "up"))
//!     .into_result()
//!     .unwrap();
//! println!("processed {}", reply.info.processed);
//! ```

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;

use crate::batch::encode_chunks;
use crate::buffer::DataBuffer;
use crate::client::SenderBuilder;
use crate::config::SenderConfig;
use crate::error::{Result, SenderError};
use crate::message::{DataPoint, ItemValue, SenderMessage};
use crate::outcome::SendOutcome;
use crate::protocol::{
    check_magic, decode_length, decode_payload, encode_message, validate_length, LENGTH_SIZE,
    MAGIC_SIZE,
};
use crate::response::{interpret, Reply};
use crate::transport::{BlockingConnection, TcpTransport, Transport};

/// Blocking sender.
///
/// Owns a [`DataBuffer`]; sending never clears it.
pub struct BlockingSender<T: Transport = TcpTransport> {
    config: SenderConfig,
    transport: T,
    buffer: DataBuffer,
}

impl BlockingSender<TcpTransport> {
    /// Create a new sender builder; finish with `build_blocking()`.
    pub fn builder() -> SenderBuilder<TcpTransport> {
        SenderBuilder::new()
    }

    /// Create a TCP sender with the given configuration.
    pub fn new(config: SenderConfig) -> Self {
        Self::with_transport(config, TcpTransport::new())
    }
}

impl<T: Transport> BlockingSender<T> {
    /// Create a sender over a custom transport.
    pub fn with_transport(config: SenderConfig, transport: T) -> Self {
        Self {
            config,
            transport,
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
    pub fn send_data(&self, packet_clock: Option<i64>, max_per_conn: Option<usize>) -> Vec<SendOutcome> {
        self.send_buffered(self.buffer.as_slice(), max_per_conn, packet_clock)
    }

    /// Send each buffered point on its own connection.
    pub fn send_one_by_one(&self) -> Vec<SendOutcome> {
        self.send_data(None, Some(1))
    }

    /// Send `points` split into chunks of at most `max_per_conn`, in order.
    pub fn send_buffered(
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

        frames
            .into_iter()
            .enumerate()
            .map(|(chunk, frame)| self.run_chunk(chunk, frame))
            .collect()
    }

    /// Send one data point right away, bypassing the buffer.
    pub fn send_single(&self, point: DataPoint) -> SendOutcome {
        let points = [point];
        self.run_chunk(0, encode_message(&SenderMessage::sender_data(&points, None)))
    }

    /// Send one data point as if relayed by the proxy named `proxy`.
    ///
    /// Without a proxy name this is [`send_single`](Self::send_single).
    pub fn send_as_proxy(&self, point: DataPoint, proxy: Option<&str>) -> SendOutcome {
        let Some(proxy) = proxy else {
            return self.send_single(point);
        };

        let points = [point];
        self.run_chunk(0, encode_message(&SenderMessage::history_data(proxy, &points)))
    }

    fn run_chunk(&self, chunk: usize, frame: Result<Bytes>) -> SendOutcome {
        let outcome = SendOutcome::from_result(frame.and_then(|frame| self.exchange(&frame)));
        if !outcome.is_success() {
            tracing::warn!(chunk, server = %self.config.address(), %outcome, "Chunk send failed");
        }
        outcome
    }

    /// One request/reply exchange on a fresh connection.
    fn exchange(&self, frame: &[u8]) -> Result<Reply> {
        let config = &self.config;
        // Sockets reject a zero timeout; the budget is already spent.
        if config.timeout.is_zero() {
            return Err(SenderError::Timeout);
        }
        let deadline = Instant::now() + config.timeout;

        let conn = self
            .transport
            .connect(&config.server, config.port, config.timeout)
            .map_err(|source| match source.kind() {
                io::ErrorKind::TimedOut => SenderError::Timeout,
                _ => SenderError::Connect {
                    addr: config.address(),
                    source,
                },
            })?;
        let mut conn = DeadlineIo::new(conn, deadline);

        conn.write_all(frame).map_err(io_error)?;
        conn.flush().map_err(io_error)?;
        tracing::debug!(bytes = frame.len(), server = %config.address(), "Frame sent");

        let reply = read_reply(&mut conn, config.max_reply_size)?;
        tracing::debug!(server = %config.address(), response = %reply, "Received reply");

        // Dropping the connection closes it.
        drop(conn);
        interpret(reply, config.failure_policy)
    }
}

/// Read exactly one reply frame from a blocking reader.
///
/// The payload buffer grows with the bytes actually received, so a bogus
/// declared length does not allocate up front.
pub(crate) fn read_reply<R: Read>(reader: &mut R, max_reply_size: u32) -> Result<Value> {
    let mut magic = [0u8; MAGIC_SIZE];
    reader.read_exact(&mut magic).map_err(io_error)?;
    check_magic(&magic)?;

    let mut length = [0u8; LENGTH_SIZE];
    reader.read_exact(&mut length).map_err(io_error)?;
    let length = decode_length(&length)?;
    validate_length(length, max_reply_size)?;

    let mut payload = Vec::new();
    reader
        .take(u64::from(length))
        .read_to_end(&mut payload)
        .map_err(io_error)?;
    if payload.len() < length as usize {
        return Err(SenderError::ConnectionClosed);
    }

    decode_payload(&payload, length)
}

fn io_error(e: io::Error) -> SenderError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => SenderError::ConnectionClosed,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => SenderError::Timeout,
        _ => SenderError::Io(e),
    }
}

/// Connection wrapper that shrinks the I/O timeout to what is left before
/// `deadline` ahead of every read and write.
struct DeadlineIo<C> {
    inner: C,
    deadline: Instant,
}

impl<C: BlockingConnection> DeadlineIo<C> {
    fn new(inner: C, deadline: Instant) -> Self {
        Self { inner, deadline }
    }

    fn arm(&mut self) -> io::Result<()> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        // A zero timeout means "block forever" to some sockets.
        if remaining == Duration::ZERO {
            return Err(io::ErrorKind::TimedOut.into());
        }
        self.inner.set_io_timeout(remaining)
    }
}

impl<C: BlockingConnection> Read for DeadlineIo<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.arm()?;
        self.inner.read(buf)
    }
}

impl<C: BlockingConnection> Write for DeadlineIo<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.arm()?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
