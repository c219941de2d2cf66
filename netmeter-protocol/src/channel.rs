//! Line-Oriented Channel Over a Byte Stream
//!
//! Wraps the byte-stream collaborator and frames it into `\n`-delimited
//! lines. Reads are buffered internally; the contract is still one blocking
//! call per line. Each session owns exactly one channel, so writes need no
//! locking.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Line delimiter. Excluded from every line a channel returns.
pub const NEWLINE: u8 = b'\n';

/// Refill granularity of the internal read buffer.
const READ_CHUNK: usize = 4096;

/// Channel failures.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The stream closed before any byte of the next line arrived.
    #[error("stream closed before a line was read")]
    EndOfStream,

    /// The per-read deadline on the underlying stream expired.
    #[error("read deadline expired")]
    Timeout,

    /// Any other stream failure.
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),
}

/// Reads and writes single lines over an owned byte stream.
pub struct LineChannel<S> {
    stream: S,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<S> LineChannel<S> {
    /// Take ownership of a stream.
    pub fn new(stream: S) -> Self {
        LineChannel {
            stream,
            buf: Vec::new(),
            start: 0,
            eof: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Release the underlying stream. Buffered unread bytes are dropped.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn take_line(&mut self, end: usize) -> Vec<u8> {
        let line = self.buf[self.start..end].to_vec();
        self.start = end + 1;
        self.compact();
        line
    }

    fn compact(&mut self) {
        if self.start == self.buf.len() {
            self.buf.clear();
            self.start = 0;
        } else if self.start > 2 * READ_CHUNK {
            self.buf.drain(..self.start);
            self.start = 0;
        }
    }
}

impl<S: Read + Write> LineChannel<S> {
    /// Block until a full line, stream end, or failure.
    ///
    /// Returns the line without its `\n`. A final line terminated by stream
    /// closure instead of `\n` is still delivered; only a closure with zero
    /// pending bytes is [`ChannelError::EndOfStream`].
    pub fn read_line(&mut self) -> Result<Vec<u8>, ChannelError> {
        loop {
            if let Some(pos) = self.buf[self.start..].iter().position(|&b| b == NEWLINE) {
                return Ok(self.take_line(self.start + pos));
            }
            if self.eof {
                if self.start < self.buf.len() {
                    let line = self.buf[self.start..].to_vec();
                    self.start = self.buf.len();
                    self.compact();
                    return Ok(line);
                }
                return Err(ChannelError::EndOfStream);
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io(e)),
            }
        }
    }

    /// Write one line, appending `\n`, as a single write followed by a flush.
    pub fn write_line(&mut self, line: &[u8]) -> Result<(), ChannelError> {
        debug_assert!(
            !line.contains(&NEWLINE),
            "a line may not contain the delimiter"
        );
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line);
        framed.push(NEWLINE);
        self.stream.write_all(&framed).map_err(map_io)?;
        self.stream.flush().map_err(map_io)?;
        Ok(())
    }
}

fn map_io(e: io::Error) -> ChannelError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ChannelError::Timeout,
        _ => ChannelError::Transport(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Stream double with scripted input and captured output.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            MockStream {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reader that trickles one byte per call, to exercise refills.
    struct TrickleStream(Cursor<Vec<u8>>);

    impl Read for TrickleStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = 1.min(buf.len());
            self.0.read(&mut buf[..n])
        }
    }

    impl Write for TrickleStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reads_consecutive_lines() {
        let mut channel = LineChannel::new(MockStream::new(b"first\nsecond\n"));
        assert_eq!(channel.read_line().unwrap(), b"first");
        assert_eq!(channel.read_line().unwrap(), b"second");
        assert!(matches!(
            channel.read_line(),
            Err(ChannelError::EndOfStream)
        ));
    }

    #[test]
    fn test_reads_across_refills() {
        let mut channel = LineChannel::new(TrickleStream(Cursor::new(b"hello world\n".to_vec())));
        assert_eq!(channel.read_line().unwrap(), b"hello world");
    }

    #[test]
    fn test_empty_line() {
        let mut channel = LineChannel::new(MockStream::new(b"\nnext\n"));
        assert_eq!(channel.read_line().unwrap(), b"");
        assert_eq!(channel.read_line().unwrap(), b"next");
    }

    #[test]
    fn test_unterminated_final_line_delivered() {
        let mut channel = LineChannel::new(MockStream::new(b"done\ntail"));
        assert_eq!(channel.read_line().unwrap(), b"done");
        assert_eq!(channel.read_line().unwrap(), b"tail");
        assert!(matches!(
            channel.read_line(),
            Err(ChannelError::EndOfStream)
        ));
    }

    #[test]
    fn test_end_of_stream_on_empty_input() {
        let mut channel = LineChannel::new(MockStream::new(b""));
        assert!(matches!(
            channel.read_line(),
            Err(ChannelError::EndOfStream)
        ));
    }

    #[test]
    fn test_write_line_appends_newline() {
        let mut channel = LineChannel::new(MockStream::new(b""));
        channel.write_line(b"t").unwrap();
        channel.write_line(b"").unwrap();
        assert_eq!(channel.get_ref().output, b"t\n\n");
    }

    #[test]
    fn test_long_line_spanning_chunks() {
        let mut input = vec![b'a'; 3 * READ_CHUNK];
        input.push(NEWLINE);
        input.extend_from_slice(b"next\n");
        let mut channel = LineChannel::new(MockStream::new(&input));
        assert_eq!(channel.read_line().unwrap().len(), 3 * READ_CHUNK);
        assert_eq!(channel.read_line().unwrap(), b"next");
    }
}
