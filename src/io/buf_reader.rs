use super::{underrun, ReadBytes};
use crate::error::Result;

/// Reads bytes from an in-memory byte buffer, tracking a cursor position.
///
/// Grounded on the teacher's `symphonia_core::io::BufReader`, trimmed to
/// the subset Pack200 band decoding uses (no scanning, no vectored reads:
/// Pack200 never hunts for a byte pattern the way a RIFF/AIFF chunk reader
/// does).
pub struct BufReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BufReader { buf, pos: 0 }
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

impl ReadBytes for BufReader<'_> {
    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.buf.len() {
            return underrun("buf reader");
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.buf.len() - self.pos < buf.len() {
            return underrun("buf reader");
        }
        buf.copy_from_slice(&self.buf[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    #[inline]
    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_bytes_in_order() {
        let mut r = BufReader::new(&[1, 2, 3, 4]);
        assert_eq!(r.read_byte().unwrap(), 1);
        assert_eq!(r.read_be_u16().unwrap(), 0x0203);
        assert_eq!(r.read_byte().unwrap(), 4);
        assert!(r.read_byte().is_err());
    }

    #[test]
    fn reports_remaining() {
        let mut r = BufReader::new(&[0u8; 3]);
        assert_eq!(r.bytes_remaining(), 3);
        r.read_byte().unwrap();
        assert_eq!(r.bytes_remaining(), 2);
    }
}
