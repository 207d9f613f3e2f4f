use std::io::Read;

use super::ReadBytes;
use crate::error::Result;

/// Adapts any `std::io::Read` into [`ReadBytes`].
///
/// The segment driver (component K) reads the header, every band, and the
/// file bands through a single `StreamReader` wrapping the caller's input;
/// Pack200 never seeks, so there is nothing here beyond byte counting.
pub struct StreamReader<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        StreamReader { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadBytes for StreamReader<R> {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        self.pos += 1;
        Ok(buf[0])
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }
}
