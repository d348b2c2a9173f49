//! Bounds-checked positional reads over untrusted package bytes.
//!
//! [`ByteReader`] is stateless: every read names its own offset, so any
//! number of threads can share one. [`ByteCursor`] layers a private position
//! on top for sequential parsing.

use binrw::Endian;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::OutOfRange;

#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Total size of the underlying buffer.
    pub const fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn read_exact(&self, offset: u64, len: u64) -> Result<&'a [u8], OutOfRange> {
        let err = OutOfRange {
            offset,
            len,
            size: self.len(),
        };

        let end = offset.checked_add(len).ok_or(err)?;
        if end > self.len() {
            return Err(err);
        }

        // Both bounds are <= buf.len(), so they fit in usize.
        Ok(&self.buf[offset as usize..end as usize])
    }

    pub fn read_u16(&self, offset: u64, endian: Endian) -> Result<u16, OutOfRange> {
        let b = self.read_exact(offset, 2)?;
        Ok(match endian {
            Endian::Big => BigEndian::read_u16(b),
            Endian::Little => LittleEndian::read_u16(b),
        })
    }

    pub fn read_u32(&self, offset: u64, endian: Endian) -> Result<u32, OutOfRange> {
        let b = self.read_exact(offset, 4)?;
        Ok(match endian {
            Endian::Big => BigEndian::read_u32(b),
            Endian::Little => LittleEndian::read_u32(b),
        })
    }

    pub fn read_u64(&self, offset: u64, endian: Endian) -> Result<u64, OutOfRange> {
        let b = self.read_exact(offset, 8)?;
        Ok(match endian {
            Endian::Big => BigEndian::read_u64(b),
            Endian::Little => LittleEndian::read_u64(b),
        })
    }

    /// Start a sequential cursor at `offset`.
    pub const fn cursor(&self, offset: u64) -> ByteCursor<'a> {
        ByteCursor {
            reader: *self,
            pos: offset,
        }
    }
}

/// Sequential reader with its own position. Each worker should own one.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    reader: ByteReader<'a>,
    pos: u64,
}

impl<'a> ByteCursor<'a> {
    pub const fn position(&self) -> u64 {
        self.pos
    }

    pub const fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn read_bytes(&mut self, len: u64) -> Result<&'a [u8], OutOfRange> {
        let b = self.reader.read_exact(self.pos, len)?;
        self.pos += len;
        Ok(b)
    }

    pub fn read_u16(&mut self, endian: Endian) -> Result<u16, OutOfRange> {
        let v = self.reader.read_u16(self.pos, endian)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self, endian: Endian) -> Result<u32, OutOfRange> {
        let v = self.reader.read_u32(self.pos, endian)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self, endian: Endian) -> Result<u64, OutOfRange> {
        let v = self.reader.read_u64(self.pos, endian)?;
        self.pos += 8;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_endians() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let r = ByteReader::new(&data);

        assert_eq!(r.read_u16(0, Endian::Big).unwrap(), 0x0102);
        assert_eq!(r.read_u16(0, Endian::Little).unwrap(), 0x0201);
        assert_eq!(r.read_u32(4, Endian::Big).unwrap(), 0x0506_0708);
        assert_eq!(r.read_u64(0, Endian::Little).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn rejects_reads_past_end() {
        let data = [0u8; 8];
        let r = ByteReader::new(&data);

        assert!(r.read_exact(8, 0).is_ok());
        assert_eq!(
            r.read_u32(6, Endian::Big),
            Err(OutOfRange {
                offset: 6,
                len: 4,
                size: 8
            })
        );
        assert!(r.read_exact(u64::MAX, 2).is_err());
        assert!(r.read_exact(1, u64::MAX).is_err());
    }

    #[test]
    fn cursor_advances_independently() {
        let data = [0xAA, 0xBB, 0x00, 0x00, 0x00, 0x2A];
        let r = ByteReader::new(&data);

        let mut a = r.cursor(0);
        let mut b = r.cursor(2);
        assert_eq!(a.read_u16(Endian::Big).unwrap(), 0xAABB);
        assert_eq!(b.read_u32(Endian::Big).unwrap(), 42);
        assert_eq!(a.position(), 2);
        assert_eq!(b.position(), 6);
        assert!(b.read_bytes(1).is_err());
        assert_eq!(b.position(), 6);
    }
}
