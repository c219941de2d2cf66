//! Client Session State Machine
//!
//! Drives a full measurement run from the initiating side: setup handshake,
//! sequential timed probes, terminate handshake. The session owns its
//! channel and is strictly synchronous; probe *i + 1* is not sent until the
//! echo of probe *i* arrived.

use crate::channel::LineChannel;
use crate::message::{Ack, Message, MessageCodec, PAYLOAD_FILL};
use crate::metrics::{MetricsAccumulator, MetricsReport};
use crate::session::{ClientState, ConfigError, SessionConfig, SessionError};
use bytes::Bytes;
use std::io::{Read, Write};
use std::time::Instant;

/// One measurement run against a server.
pub struct ClientSession<S> {
    channel: LineChannel<S>,
    codec: MessageCodec,
    config: SessionConfig,
    state: ClientState,
    next_sequence: u32,
    metrics: MetricsAccumulator,
}

impl<S: Read + Write> ClientSession<S> {
    /// Take ownership of a connected stream. Fails on invalid parameters
    /// before anything touches the wire.
    pub fn new(stream: S, config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_codec(stream, config, MessageCodec::default())
    }

    /// Like [`ClientSession::new`] with an explicit codec (strict parsing).
    pub fn with_codec(
        stream: S,
        config: SessionConfig,
        codec: MessageCodec,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ClientSession {
            channel: LineChannel::new(stream),
            codec,
            config,
            state: ClientState::Init,
            next_sequence: 1,
            metrics: MetricsAccumulator::new(config.kind),
        })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.metrics
    }

    fn advance(&mut self, next: ClientState) {
        debug_assert!(
            next.phase() >= self.state.phase(),
            "client state may not regress: {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "client state");
        self.state = next;
    }

    fn send(&mut self, message: &Message) -> Result<(), SessionError> {
        self.channel.write_line(&self.codec.encode(message))?;
        Ok(())
    }

    /// Send the setup request and await the server's verdict.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != ClientState::Init {
            return Err(SessionError::InvalidState);
        }
        match self.negotiate() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.advance(ClientState::Failed);
                Err(err)
            }
        }
    }

    fn negotiate(&mut self) -> Result<(), SessionError> {
        self.send(&Message::Setup(self.config.setup_request()))?;
        self.advance(ClientState::SetupSent);
        let line = self.channel.read_line()?;
        match self.codec.decode(&line)? {
            Message::Ack(Ack { ok: true, detail }) => {
                tracing::debug!(detail, "setup accepted");
                self.advance(ClientState::Ready);
                Ok(())
            }
            Message::Ack(Ack { ok: false, detail }) => Err(SessionError::SetupRejected { detail }),
            other => Err(SessionError::UnexpectedMessage {
                expected: "ack",
                got: other.kind_name(),
            }),
        }
    }

    /// Run all probes back to back, timing each round trip.
    pub fn run_probes(&mut self) -> Result<(), SessionError> {
        if self.state != ClientState::Ready {
            return Err(SessionError::InvalidState);
        }
        self.advance(ClientState::Measuring);
        match self.exchange_probes() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.advance(ClientState::Failed);
                Err(err)
            }
        }
    }

    fn exchange_probes(&mut self) -> Result<(), SessionError> {
        let payload = Bytes::from(vec![PAYLOAD_FILL; self.config.payload_size]);
        for _ in 0..self.config.probe_count {
            let sequence = self.next_sequence;
            let encoded = self.codec.encode(&Message::Probe {
                payload: payload.clone(),
                sequence,
            });

            let started = Instant::now();
            self.channel.write_line(&encoded)?;
            let echo_line = self.channel.read_line()?;
            let elapsed = started.elapsed();

            match self.codec.decode(&echo_line)? {
                Message::Probe {
                    payload: echoed,
                    sequence: echoed_seq,
                } => {
                    if echoed_seq != sequence || echoed != payload {
                        return Err(SessionError::EchoMismatch { sequence });
                    }
                }
                other => {
                    return Err(SessionError::UnexpectedMessage {
                        expected: "echo",
                        got: other.kind_name(),
                    })
                }
            }

            let result = self
                .metrics
                .record(sequence, self.config.payload_size, elapsed);
            tracing::debug!(sequence, rtt_micros = result.rtt_micros, "probe completed");
            self.next_sequence += 1;
        }
        Ok(())
    }

    /// End the session and release the channel, returning the collected
    /// metrics. From `Ready` or `Measuring` the terminate handshake runs
    /// best-effort: a failure there is logged, never fatal.
    pub fn close(mut self) -> Result<MetricsReport, SessionError> {
        match self.state {
            ClientState::Ready | ClientState::Measuring => {
                self.advance(ClientState::Terminating);
                if let Err(err) = self.terminate_handshake() {
                    tracing::warn!(error = %err, "termination handshake failed; closing anyway");
                }
                self.advance(ClientState::Closed);
            }
            ClientState::Failed => {
                self.advance(ClientState::Closed);
            }
            _ => return Err(SessionError::InvalidState),
        }
        Ok(self.metrics.report())
    }

    fn terminate_handshake(&mut self) -> Result<(), SessionError> {
        self.send(&Message::Terminate)?;
        let line = self.channel.read_line()?;
        match self.codec.decode(&line)? {
            Message::TerminateAck => Ok(()),
            other => Err(SessionError::UnexpectedMessage {
                expected: "terminate-ack",
                got: other.kind_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MeasurementKind;
    use crate::testutil::{written_lines, MockStream};

    fn rtt_config(payload_size: usize, probes: u32) -> SessionConfig {
        SessionConfig::new(MeasurementKind::Rtt, payload_size, probes)
    }

    #[test]
    fn test_zero_probes_rejected_before_io() {
        let (stream, output) = MockStream::from_lines(&[]);
        let result = ClientSession::new(stream, rtt_config(10, 0));
        assert!(matches!(result, Err(ConfigError::ZeroProbes)));
        assert!(output.borrow().is_empty());
    }

    #[test]
    fn test_full_run() {
        let (stream, output) = MockStream::from_lines(&[
            "200 OK: Ready",
            "m XXXX 1",
            "m XXXX 2",
            "m XXXX 3",
            "ta",
        ]);
        let mut session = ClientSession::new(stream, rtt_config(4, 3)).unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), ClientState::Ready);
        session.run_probes().unwrap();
        let report = session.close().unwrap();

        assert_eq!(report.probes.len(), 3);
        let sequences: Vec<u32> = report.probes.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let lines = written_lines(&output);
        assert_eq!(
            lines,
            vec!["s rtt 4 3 0", "m XXXX 1", "m XXXX 2", "m XXXX 3", "t"]
        );
    }

    #[test]
    fn test_setup_rejection_fails_session() {
        let (stream, _) = MockStream::from_lines(&["404 ERROR: Invalid Connection Setup Message"]);
        let mut session = ClientSession::new(stream, rtt_config(10, 1)).unwrap();
        let err = session.start().unwrap_err();
        assert!(matches!(err, SessionError::SetupRejected { .. }));
        assert_eq!(session.state(), ClientState::Failed);
        assert!(matches!(
            session.run_probes(),
            Err(SessionError::InvalidState)
        ));
    }

    #[test]
    fn test_failed_session_can_close() {
        let (stream, _) = MockStream::from_lines(&["404 ERROR: Invalid Connection Setup Message"]);
        let mut session = ClientSession::new(stream, rtt_config(10, 1)).unwrap();
        let _ = session.start();
        let report = session.close().unwrap();
        assert!(report.probes.is_empty());
    }

    #[test]
    fn test_wrong_echo_sequence_is_mismatch() {
        let (stream, _) = MockStream::from_lines(&["200 OK: Ready", "m XX 9"]);
        let mut session = ClientSession::new(stream, rtt_config(2, 1)).unwrap();
        session.start().unwrap();
        let err = session.run_probes().unwrap_err();
        assert!(matches!(err, SessionError::EchoMismatch { sequence: 1 }));
        assert_eq!(session.state(), ClientState::Failed);
    }

    #[test]
    fn test_wrong_echo_payload_is_mismatch() {
        let (stream, _) = MockStream::from_lines(&["200 OK: Ready", "m YY 1"]);
        let mut session = ClientSession::new(stream, rtt_config(2, 1)).unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.run_probes(),
            Err(SessionError::EchoMismatch { .. })
        ));
    }

    #[test]
    fn test_server_hangup_during_probes() {
        let (stream, _) = MockStream::from_lines(&["200 OK: Ready", "m XX 1"]);
        let mut session = ClientSession::new(stream, rtt_config(2, 2)).unwrap();
        session.start().unwrap();
        let err = session.run_probes().unwrap_err();
        assert!(matches!(err, SessionError::Channel(_)));
        assert_eq!(session.state(), ClientState::Failed);
    }

    #[test]
    fn test_probes_invalid_before_start() {
        let (stream, _) = MockStream::from_lines(&[]);
        let mut session = ClientSession::new(stream, rtt_config(2, 1)).unwrap();
        assert!(matches!(
            session.run_probes(),
            Err(SessionError::InvalidState)
        ));
    }

    #[test]
    fn test_missing_terminate_ack_is_not_fatal() {
        let (stream, output) = MockStream::from_lines(&["200 OK: Ready", "m X 1"]);
        let mut session = ClientSession::new(stream, rtt_config(1, 1)).unwrap();
        session.start().unwrap();
        session.run_probes().unwrap();
        let report = session.close().unwrap();
        assert_eq!(report.probes.len(), 1);
        assert_eq!(written_lines(&output).last().unwrap(), "t");
    }

    #[test]
    fn test_zero_payload_probes() {
        let (stream, output) = MockStream::from_lines(&["200 OK: Ready", "m 1", "m 2", "ta"]);
        let mut session = ClientSession::new(stream, rtt_config(0, 2)).unwrap();
        session.start().unwrap();
        session.run_probes().unwrap();
        let report = session.close().unwrap();
        assert_eq!(report.probes.len(), 2);
        let lines = written_lines(&output);
        assert_eq!(lines, vec!["s rtt 0 2 0", "m 1", "m 2", "t"]);
    }

    #[test]
    fn test_tput_mode_records_throughput() {
        let (stream, _) = MockStream::from_lines(&["200 OK: Ready", "m XXXXXXXX 1", "ta"]);
        let config = SessionConfig::new(MeasurementKind::Tput, 8, 1);
        let mut session = ClientSession::new(stream, config).unwrap();
        session.start().unwrap();
        session.run_probes().unwrap();
        let report = session.close().unwrap();
        assert!(report.probes[0].throughput_bps.unwrap() > 0.0);
        assert!(report.mean_throughput_bps.unwrap() > 0.0);
    }
}
