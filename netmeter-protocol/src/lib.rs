//! Netmeter Protocol Core
//!
//! This crate implements the measurement protocol shared by the netmeter
//! client and server: the line-oriented message codec, the buffered line
//! channel over a byte stream, the two session state machines, and the
//! probe metrics. It never opens sockets itself; streams are supplied by
//! the transport layer (`netmeter-io`).

pub mod channel;
pub mod client;
pub mod message;
pub mod metrics;
pub mod server;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::{ChannelError, LineChannel};
pub use client::ClientSession;
pub use message::{
    Ack, MeasurementKind, Message, MessageCodec, ParseError, ParseMode, SetupRequest,
};
pub use metrics::{MetricsAccumulator, MetricsReport, ProbeResult};
pub use server::{ServerOutcome, ServerSession};
pub use session::{
    ClientState, ConfigError, ServerState, SessionConfig, SessionError, MAX_PAYLOAD_SIZE,
};
