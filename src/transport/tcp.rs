//! Plain TCP transport.
//!
//! - Blocking: `std::net::TcpStream` with connect/read/write timeouts
//! - Async: `tokio::net::TcpStream`

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;

use super::{AsyncTransport, Transport};

/// Direct TCP connection to the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    /// Create a TCP transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable Nagle's algorithm on opened connections.
    ///
    /// Each connection writes one frame and then only reads, so this mostly
    /// matters for very small frames on high-latency links.
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Transport for TcpTransport {
    type Connection = TcpStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
        let mut last_err = None;

        // Try every resolved address, like `TcpStream::connect` does.
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(self.nodelay)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{}:{} did not resolve to any address", host, port),
            )
        }))
    }
}

#[async_trait]
impl AsyncTransport for TcpTransport {
    type Connection = tokio::net::TcpStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<tokio::net::TcpStream> {
        let stream = tokio::net::TcpStream::connect((host, port)).await?;
        stream.set_nodelay(self.nodelay)?;
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_blocking_connect_and_exchange() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let transport = TcpTransport::new().nodelay(true);
        let mut conn =
            Transport::connect(&transport, "127.0.0.1", port, Duration::from_secs(2)).unwrap();
        conn.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();

        assert_eq!(&buf, b"ping");
        assert_eq!(conn.read_timeout().unwrap(), Some(Duration::from_secs(2)));
        server.join().unwrap();
    }

    #[test]
    fn test_blocking_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = Transport::connect(&TcpTransport::new(), "127.0.0.1", port, Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_async_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
        let stream = AsyncTransport::connect(&TcpTransport::new(), "127.0.0.1", port)
            .await
            .unwrap();

        assert_eq!(stream.peer_addr().unwrap().port(), port);
        accept.await.unwrap().unwrap();
    }
}
