//! TCP stream and listener construction.
//!
//! Thin wrappers over `socket2` that hand measurement-ready std streams to
//! the sessions. Probe traffic is tiny and latency-sensitive, so Nagle's
//! algorithm is disabled on every stream.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Socket construction errors.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{host:?} did not resolve to any usable address")]
    Unresolvable { host: String },
}

/// Builds client connections to a measurement server.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new() -> Self {
        TcpConnector::default()
    }

    /// Bound the time spent establishing the connection.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Per-read deadline applied to the connected stream. `None` blocks
    /// forever.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Resolve `host` and connect to the first address that accepts.
    pub fn connect(&self, host: &str, port: u16) -> Result<TcpStream, SocketError> {
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(SocketError::Unresolvable {
                host: host.to_string(),
            });
        }

        let mut last_err: Option<SocketError> = None;
        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => {
                    tracing::debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(err) => {
                    tracing::debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(SocketError::Unresolvable {
            host: host.to_string(),
        }))
    }

    fn connect_addr(&self, addr: SocketAddr) -> Result<TcpStream, SocketError> {
        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        prepare_stream(&stream, self.read_timeout)?;
        Ok(stream)
    }
}

/// Builds the server's listening socket.
#[derive(Debug, Clone)]
pub struct TcpListenerBuilder {
    reuse_address: bool,
    backlog: i32,
}

impl TcpListenerBuilder {
    pub fn new() -> Self {
        TcpListenerBuilder {
            reuse_address: true,
            backlog: 128,
        }
    }

    pub fn reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Bind and listen on the given address.
    pub fn bind(&self, addr: SocketAddr) -> Result<TcpListener, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(self.reuse_address)?;
        socket.bind(&addr.into())?;
        socket.listen(self.backlog)?;
        Ok(socket.into())
    }
}

impl Default for TcpListenerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply measurement socket options to a stream (accepted or connected).
pub fn prepare_stream(
    stream: &TcpStream,
    read_timeout: Option<Duration>,
) -> Result<(), SocketError> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(read_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_listener_binds_ephemeral_port() {
        let listener = TcpListenerBuilder::new()
            .bind("127.0.0.1:0".parse().unwrap())
            .unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn test_connect_and_exchange() {
        let listener = TcpListenerBuilder::new()
            .bind("127.0.0.1:0".parse().unwrap())
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut stream = TcpConnector::new()
            .connect("127.0.0.1", addr.port())
            .unwrap();
        stream.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn test_read_timeout_applied() {
        let listener = TcpListenerBuilder::new()
            .bind("127.0.0.1:0".parse().unwrap())
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpConnector::new()
            .read_timeout(Some(Duration::from_millis(50)))
            .connect("127.0.0.1", addr.port())
            .unwrap();
        assert_eq!(
            stream.read_timeout().unwrap(),
            Some(Duration::from_millis(50))
        );
        // Keep the listener alive until the client is done.
        drop(listener);
    }

    #[test]
    fn test_unresolvable_host() {
        let result = TcpConnector::new().connect("host.invalid.netmeter.test", 9);
        assert!(result.is_err());
    }
}
