//! Wire Messages and the Line Codec
//!
//! Every protocol message occupies exactly one `\n`-terminated line of
//! space-separated ASCII fields (the terminator itself belongs to the
//! channel layer, not the codec). The leading token of a line selects the
//! message kind; setup acknowledgments are status lines keyed on a numeric
//! code instead of a tag.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Leading token of a setup request line.
pub const SETUP_TAG: &str = "s";

/// Leading token of a probe line (measurement and echo are wire-identical).
pub const PROBE_TAG: &str = "m";

/// Leading token of a terminate line.
pub const TERMINATE_TAG: &str = "t";

/// Leading token of a terminate acknowledgment line.
pub const TERMINATE_ACK_TAG: &str = "ta";

/// Prefix of a positive setup acknowledgment line.
pub const ACK_OK_PREFIX: &str = "200 OK:";

/// Prefix of a negative setup acknowledgment line.
pub const ACK_ERR_PREFIX: &str = "404 ERROR:";

/// Detail text of the acknowledgment accepting a setup.
pub const SETUP_OK_DETAIL: &str = "Ready";

/// Detail text of the acknowledgment rejecting a setup.
pub const SETUP_REJECTED_DETAIL: &str = "Invalid Connection Setup Message";

/// Filler byte for probe payloads.
pub const PAYLOAD_FILL: u8 = b'X';

/// What a session measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    /// Round-trip time per probe, in microseconds.
    Rtt,
    /// Throughput per probe, in bits per second.
    Tput,
}

impl MeasurementKind {
    /// Parse the wire token (`rtt` or `tput`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "rtt" => Some(MeasurementKind::Rtt),
            "tput" => Some(MeasurementKind::Tput),
            _ => None,
        }
    }

    /// The wire token for this kind.
    pub fn as_token(self) -> &'static str {
        match self {
            MeasurementKind::Rtt => "rtt",
            MeasurementKind::Tput => "tput",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Parameters carried by a setup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    /// Measurement kind for the whole session.
    pub kind: MeasurementKind,
    /// Exact byte length of every probe payload.
    pub payload_size: usize,
    /// Number of probes the client intends to send.
    pub probe_count: u32,
    /// Server-side delay hint in milliseconds. Carried for the peer's
    /// information; never enforced by either session.
    pub server_delay_ms: u32,
}

/// Setup acknowledgment (positive or negative).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
    pub detail: String,
}

impl Ack {
    /// The acknowledgment accepting a setup.
    pub fn ready() -> Self {
        Ack {
            ok: true,
            detail: SETUP_OK_DETAIL.to_string(),
        }
    }

    /// The acknowledgment rejecting a setup.
    pub fn rejected() -> Self {
        Ack {
            ok: false,
            detail: SETUP_REJECTED_DETAIL.to_string(),
        }
    }
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client request opening a measurement session.
    Setup(SetupRequest),
    /// Server verdict on a setup request.
    Ack(Ack),
    /// Measurement probe. The server's echo uses the identical wire form,
    /// so one variant covers both directions.
    Probe { payload: Bytes, sequence: u32 },
    /// Client request closing the session.
    Terminate,
    /// Server acknowledgment of a terminate.
    TerminateAck,
}

impl Message {
    /// Short name of the message kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::Setup(_) => "setup",
            Message::Ack(_) => "ack",
            Message::Probe { .. } => "probe",
            Message::Terminate => "terminate",
            Message::TerminateAck => "terminate-ack",
        }
    }
}

/// How numeric wire fields are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// `atoi`-style compatibility: a non-numeric field degrades to 0.
    #[default]
    Lenient,
    /// A non-numeric field is a [`ParseError`].
    Strict,
}

/// Line decoding failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    EmptyLine,

    #[error("unknown message tag {0:?}")]
    UnknownTag(String),

    #[error("wrong field count for {tag:?} line: expected {expected}, got {actual}")]
    WrongFieldCount {
        tag: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("unknown measurement type {0:?}")]
    UnknownMeasurementKind(String),

    #[error("invalid numeric field {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("line is not valid UTF-8")]
    NotUtf8,

    #[error("malformed status line")]
    MalformedStatus,
}

/// Encodes and decodes [`Message`]s to and from single lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec {
    mode: ParseMode,
}

impl MessageCodec {
    /// Create a codec with the given numeric parse mode.
    pub fn new(mode: ParseMode) -> Self {
        MessageCodec { mode }
    }

    /// The numeric parse mode in effect.
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Encode a message as one line, without the trailing `\n`.
    ///
    /// Probe payloads must not contain ASCII whitespace; the field
    /// separators could not be recovered otherwise.
    pub fn encode(&self, message: &Message) -> Vec<u8> {
        match message {
            Message::Setup(setup) => format!(
                "{} {} {} {} {}",
                SETUP_TAG,
                setup.kind.as_token(),
                setup.payload_size,
                setup.probe_count,
                setup.server_delay_ms
            )
            .into_bytes(),
            Message::Ack(ack) => {
                let prefix = if ack.ok { ACK_OK_PREFIX } else { ACK_ERR_PREFIX };
                format!("{} {}", prefix, ack.detail).into_bytes()
            }
            Message::Probe { payload, sequence } => {
                debug_assert!(
                    !payload.iter().any(|b| b.is_ascii_whitespace()),
                    "probe payload must not contain whitespace"
                );
                let mut line = Vec::with_capacity(payload.len() + 16);
                line.extend_from_slice(PROBE_TAG.as_bytes());
                if !payload.is_empty() {
                    line.push(b' ');
                    line.extend_from_slice(payload);
                }
                line.push(b' ');
                line.extend_from_slice(sequence.to_string().as_bytes());
                line
            }
            Message::Terminate => TERMINATE_TAG.as_bytes().to_vec(),
            Message::TerminateAck => TERMINATE_ACK_TAG.as_bytes().to_vec(),
        }
    }

    /// Decode one line (without its `\n`) into a message.
    pub fn decode(&self, line: &[u8]) -> Result<Message, ParseError> {
        let text = std::str::from_utf8(line).map_err(|_| ParseError::NotUtf8)?;
        let text = text.trim_end();

        if text.starts_with("200") || text.starts_with("404") {
            return self.decode_status(text);
        }

        let tokens: Vec<&str> = text.split_ascii_whitespace().collect();
        let tag = *tokens.first().ok_or(ParseError::EmptyLine)?;
        match tag {
            SETUP_TAG => self.decode_setup(&tokens),
            PROBE_TAG => self.decode_probe(&tokens),
            TERMINATE_TAG => match tokens.len() {
                1 => Ok(Message::Terminate),
                actual => Err(ParseError::WrongFieldCount {
                    tag: TERMINATE_TAG,
                    expected: "1",
                    actual,
                }),
            },
            TERMINATE_ACK_TAG => match tokens.len() {
                1 => Ok(Message::TerminateAck),
                actual => Err(ParseError::WrongFieldCount {
                    tag: TERMINATE_ACK_TAG,
                    expected: "1",
                    actual,
                }),
            },
            other => Err(ParseError::UnknownTag(other.to_string())),
        }
    }

    fn decode_status(&self, text: &str) -> Result<Message, ParseError> {
        if let Some(detail) = text.strip_prefix(ACK_OK_PREFIX) {
            return Ok(Message::Ack(Ack {
                ok: true,
                detail: detail.trim_start().to_string(),
            }));
        }
        if let Some(detail) = text.strip_prefix(ACK_ERR_PREFIX) {
            return Ok(Message::Ack(Ack {
                ok: false,
                detail: detail.trim_start().to_string(),
            }));
        }
        Err(ParseError::MalformedStatus)
    }

    fn decode_setup(&self, tokens: &[&str]) -> Result<Message, ParseError> {
        if tokens.len() != 5 {
            return Err(ParseError::WrongFieldCount {
                tag: SETUP_TAG,
                expected: "5",
                actual: tokens.len(),
            });
        }
        let kind = MeasurementKind::from_token(tokens[1])
            .ok_or_else(|| ParseError::UnknownMeasurementKind(tokens[1].to_string()))?;
        Ok(Message::Setup(SetupRequest {
            kind,
            payload_size: self.parse_field("payload_size", tokens[2])?,
            probe_count: self.parse_field("probe_count", tokens[3])?,
            server_delay_ms: self.parse_field("server_delay", tokens[4])?,
        }))
    }

    fn decode_probe(&self, tokens: &[&str]) -> Result<Message, ParseError> {
        // A zero-length payload leaves only the tag and the sequence.
        let (payload, seq_token) = match tokens.len() {
            2 => (Bytes::new(), tokens[1]),
            3 => (Bytes::copy_from_slice(tokens[1].as_bytes()), tokens[2]),
            actual => {
                return Err(ParseError::WrongFieldCount {
                    tag: PROBE_TAG,
                    expected: "2 or 3",
                    actual,
                })
            }
        };
        Ok(Message::Probe {
            payload,
            sequence: self.parse_field("sequence", seq_token)?,
        })
    }

    fn parse_field<T>(&self, field: &'static str, token: &str) -> Result<T, ParseError>
    where
        T: std::str::FromStr + Default,
    {
        match token.parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => match self.mode {
                ParseMode::Lenient => {
                    tracing::debug!(field, value = token, "non-numeric field degraded to 0");
                    Ok(T::default())
                }
                ParseMode::Strict => Err(ParseError::InvalidNumber {
                    field,
                    value: token.to_string(),
                }),
            },
        }
    }
}
