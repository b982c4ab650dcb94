use std::io::{self, BufRead, Read};

use bytes::{Buf, Bytes};

/// A cursor over a fully buffered request body.
///
/// Cursors share the underlying buffer: reading, or closing, one of them
/// never affects another cursor created from the same bytes.
#[derive(Debug, Clone)]
pub struct BodyReader {
    remaining: Bytes,
}

impl BodyReader {
    pub fn new(body: Bytes) -> Self {
        Self { remaining: body }
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Releases this cursor. Subsequent reads return EOF.
    pub fn close(&mut self) {
        self.remaining = Bytes::new();
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.remaining.len());
        self.remaining.copy_to_slice(&mut buf[..len]);
        Ok(len)
    }
}

impl BufRead for BodyReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.remaining.chunk())
    }

    fn consume(&mut self, amt: usize) {
        self.remaining.advance(amt.min(self.remaining.len()));
    }
}
