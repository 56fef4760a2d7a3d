//! Transport module - how a connection to the server is opened.
//!
//! Two capabilities, one per scheduling model:
//! - [`Transport`]: blocking `Read + Write` connections
//! - [`AsyncTransport`]: tokio `AsyncRead + AsyncWrite` connections
//!
//! [`TcpTransport`] implements both. Custom transports (SOCKS tunnels,
//! in-memory test doubles) plug in through the same traits.

mod tcp;

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use tcp::TcpTransport;

/// Blocking transport capability.
pub trait Transport: Send + Sync {
    /// Connection type; dropped to close.
    type Connection: BlockingConnection;

    /// Open a connection. `timeout` bounds the connect and each subsequent
    /// read or write on the returned connection.
    fn connect(&self, host: &str, port: u16, timeout: Duration)
        -> std::io::Result<Self::Connection>;
}

/// Non-blocking transport capability.
///
/// The sender wraps `connect` and the exchange in its own timeout, so
/// implementations need not enforce one.
#[async_trait]
pub trait AsyncTransport: Send + Sync + 'static {
    /// Connection type; shut down and dropped to close.
    type Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a connection.
    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Connection>;
}

/// Blocking connection whose I/O timeout can be adjusted between reads.
///
/// The blocking sender lowers the timeout before every read so that the
/// configured bound covers the whole exchange, not each read separately.
pub trait BlockingConnection: Read + Write {
    /// Bound the next read or write. The default does nothing.
    fn set_io_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
        Ok(())
    }
}

impl BlockingConnection for std::net::TcpStream {
    fn set_io_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}
