//! Scripted stream double for session tests.

use std::cell::RefCell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

/// A `Read + Write` stream whose input is scripted up front and whose
/// output stays inspectable after the session consumed the stream.
pub(crate) struct MockStream {
    input: Cursor<Vec<u8>>,
    output: Rc<RefCell<Vec<u8>>>,
}

impl MockStream {
    /// Script the peer's lines (terminators added here) and return the
    /// stream plus a handle onto everything written into it.
    pub fn from_lines(lines: &[&str]) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mut input = Vec::new();
        for line in lines {
            input.extend_from_slice(line.as_bytes());
            input.push(b'\n');
        }
        let output = Rc::new(RefCell::new(Vec::new()));
        let stream = MockStream {
            input: Cursor::new(input),
            output: Rc::clone(&output),
        };
        (stream, output)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Split captured output back into lines for assertions.
pub(crate) fn written_lines(output: &Rc<RefCell<Vec<u8>>>) -> Vec<String> {
    let bytes = output.borrow();
    bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}
