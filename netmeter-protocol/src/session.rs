//! Session Vocabulary
//!
//! Configuration, lifecycle states, and the error taxonomy shared by the
//! client and server state machines. A session covers exactly one
//! connection; nothing here survives the stream it was built on.

use crate::channel::ChannelError;
use crate::message::{MeasurementKind, ParseError, SetupRequest};
use thiserror::Error;

/// Hard cap on the probe payload size. A payload plus its framing must stay
/// a single line of sane length.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Measurement parameters for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub kind: MeasurementKind,
    pub payload_size: usize,
    pub probe_count: u32,
    pub server_delay_ms: u32,
}

impl SessionConfig {
    /// Create a config with no server delay hint.
    pub fn new(kind: MeasurementKind, payload_size: usize, probe_count: u32) -> Self {
        SessionConfig {
            kind,
            payload_size,
            probe_count,
            server_delay_ms: 0,
        }
    }

    /// Set the server delay hint carried in the setup request.
    pub fn with_server_delay(mut self, delay_ms: u32) -> Self {
        self.server_delay_ms = delay_ms;
        self
    }

    /// Adopt the parameters a peer declared in its setup request.
    pub fn from_setup(setup: &SetupRequest) -> Self {
        SessionConfig {
            kind: setup.kind,
            payload_size: setup.payload_size,
            probe_count: setup.probe_count,
            server_delay_ms: setup.server_delay_ms,
        }
    }

    /// The setup request announcing this config.
    pub fn setup_request(&self) -> SetupRequest {
        SetupRequest {
            kind: self.kind,
            payload_size: self.payload_size,
            probe_count: self.probe_count,
            server_delay_ms: self.server_delay_ms,
        }
    }

    /// Reject parameters the measurement cannot run with. Called before any
    /// network I/O happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_count == 0 {
            return Err(ConfigError::ZeroProbes);
        }
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::PayloadTooLarge {
                size: self.payload_size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }
}

/// Invalid measurement parameters.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("probe count must be at least 1")]
    ZeroProbes,

    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Client session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Init,
    SetupSent,
    Ready,
    Measuring,
    Terminating,
    Closed,
    Failed,
}

impl ClientState {
    /// Position in the forward-only lifecycle. `Failed` shares the terminal
    /// phase with `Closed`: a failed session may still be closed, but
    /// neither terminal state can be left.
    pub(crate) fn phase(self) -> u8 {
        match self {
            ClientState::Init => 0,
            ClientState::SetupSent => 1,
            ClientState::Ready => 2,
            ClientState::Measuring => 3,
            ClientState::Terminating => 4,
            ClientState::Closed | ClientState::Failed => 5,
        }
    }
}

/// Server session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Accepted,
    AwaitSetup,
    Ready,
    Measuring,
    AwaitTerminate,
    Closed,
    Rejected,
}

impl ServerState {
    pub(crate) fn phase(self) -> u8 {
        match self {
            ServerState::Accepted => 0,
            ServerState::AwaitSetup => 1,
            ServerState::Ready => 2,
            ServerState::Measuring => 3,
            ServerState::AwaitTerminate => 4,
            ServerState::Closed | ServerState::Rejected => 5,
        }
    }
}

/// Failures confined to one session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),

    #[error("malformed message: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("operation not valid in the current session state")]
    InvalidState,

    #[error("setup rejected by peer: {detail}")]
    SetupRejected { detail: String },

    #[error("unexpected {got} while waiting for {expected}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    #[error("echo of probe {sequence} does not match what was sent")]
    EchoMismatch { sequence: u32 },

    #[error("probe payload length {actual} does not match declared {declared}")]
    PayloadSizeMismatch { declared: usize, actual: usize },

    #[error("probe sequence {got} out of order (expected {expected})")]
    OutOfSequence { expected: u32, got: u32 },
}
