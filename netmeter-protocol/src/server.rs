//! Server Session State Machine
//!
//! Per-connection responder: validates the setup request, echoes probes
//! byte-exactly, acknowledges termination. One session serves exactly one
//! connection and runs on a single thread; concurrency across connections
//! is the transport's concern.

use crate::channel::LineChannel;
use crate::message::{Ack, Message, MessageCodec};
use crate::session::{ServerState, SessionConfig, SessionError};
use std::io::{Read, Write};

/// How a server session ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOutcome {
    /// Full setup, echo, terminate lifecycle.
    Completed { probes_echoed: u64 },
    /// The setup request was invalid; a rejection was sent and the
    /// connection closed without a measurement phase.
    Rejected,
}

/// One connection's responder.
pub struct ServerSession<S> {
    channel: LineChannel<S>,
    codec: MessageCodec,
    state: ServerState,
    config: Option<SessionConfig>,
    expected_sequence: u32,
    probes_echoed: u64,
}

impl<S: Read + Write> ServerSession<S> {
    /// Take ownership of an accepted stream.
    pub fn new(stream: S) -> Self {
        Self::with_codec(stream, MessageCodec::default())
    }

    /// Like [`ServerSession::new`] with an explicit codec (strict parsing).
    pub fn with_codec(stream: S, codec: MessageCodec) -> Self {
        ServerSession {
            channel: LineChannel::new(stream),
            codec,
            state: ServerState::Accepted,
            config: None,
            expected_sequence: 1,
            probes_echoed: 0,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Parameters the client declared, once setup succeeded.
    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    fn advance(&mut self, next: ServerState) {
        debug_assert!(
            next.phase() >= self.state.phase(),
            "server state may not regress: {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "server state");
        self.state = next;
    }

    fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        self.channel.write_line(&self.codec.encode(message))?;
        Ok(())
    }

    /// Drive the whole session to completion.
    ///
    /// Protocol violations after a successful setup, and any channel
    /// failure, abort the session without a reply; only a bad setup gets
    /// the rejection line.
    pub fn run(&mut self) -> Result<ServerOutcome, SessionError> {
        if self.state != ServerState::Accepted {
            return Err(SessionError::InvalidState);
        }
        match self.serve() {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.advance(ServerState::Closed);
                Err(err)
            }
        }
    }

    fn serve(&mut self) -> Result<ServerOutcome, SessionError> {
        self.advance(ServerState::AwaitSetup);
        let line = self.channel.read_line()?;
        let setup = match self.codec.decode(&line) {
            Ok(Message::Setup(setup)) => setup,
            Ok(other) => {
                tracing::debug!(got = other.kind_name(), "first message is not a setup");
                return self.reject();
            }
            Err(err) => {
                tracing::debug!(error = %err, "invalid setup line");
                return self.reject();
            }
        };

        let config = SessionConfig::from_setup(&setup);
        tracing::info!(
            kind = %config.kind,
            payload_size = config.payload_size,
            probe_count = config.probe_count,
            server_delay_ms = config.server_delay_ms,
            "session configured"
        );
        self.send(&Message::Ack(Ack::ready()))?;
        self.config = Some(config);
        self.advance(ServerState::Ready);

        self.echo_loop(config)
    }

    fn reject(&mut self) -> Result<ServerOutcome, SessionError> {
        self.send(&Message::Ack(Ack::rejected()))?;
        self.advance(ServerState::Rejected);
        Ok(ServerOutcome::Rejected)
    }

    fn echo_loop(&mut self, config: SessionConfig) -> Result<ServerOutcome, SessionError> {
        loop {
            let line = self.channel.read_line()?;
            match self.codec.decode(&line)? {
                Message::Probe { payload, sequence } => {
                    if self.state == ServerState::Ready {
                        self.advance(ServerState::Measuring);
                    }
                    if payload.len() != config.payload_size {
                        return Err(SessionError::PayloadSizeMismatch {
                            declared: config.payload_size,
                            actual: payload.len(),
                        });
                    }
                    if sequence != self.expected_sequence {
                        return Err(SessionError::OutOfSequence {
                            expected: self.expected_sequence,
                            got: sequence,
                        });
                    }
                    // Echo the original line bytes, not a re-encoding.
                    self.channel.write_line(&line)?;
                    self.expected_sequence += 1;
                    self.probes_echoed += 1;
                }
                Message::Terminate => {
                    self.advance(ServerState::AwaitTerminate);
                    self.send(&Message::TerminateAck)?;
                    self.advance(ServerState::Closed);
                    return Ok(ServerOutcome::Completed {
                        probes_echoed: self.probes_echoed,
                    });
                }
                other => {
                    return Err(SessionError::UnexpectedMessage {
                        expected: "probe or terminate",
                        got: other.kind_name(),
                    })
                }
            }
        }
    }
}
