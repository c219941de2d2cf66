//! Netmeter I/O and Platform Abstraction
//!
//! TCP stream and listener construction, and the worker pool the server
//! transport dispatches sessions onto. The protocol core consumes the
//! streams built here and nothing else.

pub mod pool;
pub mod socket;

pub use pool::WorkerPool;
pub use socket::{prepare_stream, SocketError, TcpConnector, TcpListenerBuilder};
