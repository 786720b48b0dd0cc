use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::OpResult;

/// Bitcoin-style compact-size integer, also known as CompactSize or VarInt.
///
/// The encoder always emits the minimal-length form (1/3/5/9 bytes depending
/// on the value), but the decoder accepts any of the four forms whatever
/// value they carry -- a 9-byte encoding of `5` decodes to `5` just fine, it
/// is simply never produced by `write_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    #[inline]
    pub fn new(value: u64) -> Self {
        VarInt(value)
    }

    /// Number of bytes `write_to` will emit for this value.
    pub fn encoded_len(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> OpResult<VarInt> {
        let first = reader.read_u8()?;
        let value = match first {
            0x00..=0xfc => u64::from(first),
            0xfd => u64::from(reader.read_u16::<LittleEndian>()?),
            0xfe => u64::from(reader.read_u32::<LittleEndian>()?),
            0xff => reader.read_u64::<LittleEndian>()?,
        };
        Ok(VarInt(value))
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> OpResult<()> {
        match self.0 {
            0..=0xfc => writer.write_u8(self.0 as u8)?,
            0xfd..=0xffff => {
                writer.write_u8(0xfd)?;
                writer.write_u16::<LittleEndian>(self.0 as u16)?;
            }
            0x1_0000..=0xffff_ffff => {
                writer.write_u8(0xfe)?;
                writer.write_u32::<LittleEndian>(self.0 as u32)?;
            }
            _ => {
                writer.write_u8(0xff)?;
                writer.write_u64::<LittleEndian>(self.0)?;
            }
        }
        Ok(())
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        VarInt(value)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(value: u64) -> VarInt {
        let mut buf = Vec::new();
        VarInt::new(value).write_to(&mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        VarInt::read_from(&mut cursor).unwrap()
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(roundtrip(0).0, 0);
        assert_eq!(roundtrip(0xfc).0, 0xfc);
        assert_eq!(roundtrip(0xfd).0, 0xfd);
        assert_eq!(roundtrip(0xffff).0, 0xffff);
        assert_eq!(roundtrip(0x1_0000).0, 0x1_0000);
        assert_eq!(roundtrip(u32::MAX as u64 + 1).0, u32::MAX as u64 + 1);
    }

    #[test]
    fn test_encoded_lengths() {
        assert_eq!(VarInt::new(0).encoded_len(), 1);
        assert_eq!(VarInt::new(0xfc).encoded_len(), 1);
        assert_eq!(VarInt::new(0xfd).encoded_len(), 3);
        assert_eq!(VarInt::new(0xffff).encoded_len(), 3);
        assert_eq!(VarInt::new(0x1_0000).encoded_len(), 5);
        assert_eq!(VarInt::new(0xffff_ffff).encoded_len(), 5);
        assert_eq!(VarInt::new(0x1_0000_0000).encoded_len(), 9);
    }

    #[test]
    fn test_concrete_scenarios() {
        // Literal hex scenarios from the spec's testable properties.
        let mut cur = Cursor::new(vec![0x00]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 0);

        let mut cur = Cursor::new(vec![0xfc]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 252);

        let mut cur = Cursor::new(vec![0xfd, 0xfd, 0x00]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 253);

        let mut cur = Cursor::new(vec![0xfd, 0xff, 0xff]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 65535);

        let mut cur = Cursor::new(vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 65536);

        let mut cur = Cursor::new(vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 1u64 << 32);
    }

    #[test]
    fn test_non_minimal_form_accepted() {
        // A 9-byte encoding of a small value is accepted on read even though
        // write_to would never produce it.
        let mut cur = Cursor::new(vec![0xff, 0x05, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(VarInt::read_from(&mut cur).unwrap().0, 5);
    }

    #[test]
    fn test_write_is_minimal() {
        let mut buf = Vec::new();
        VarInt::new(5).write_to(&mut buf).unwrap();
        assert_eq!(buf, vec![0x05]);
    }
}
