//! Bit-level reading for frame header fields.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read> {
    bs: BitReader<R, BigEndian>,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self::new(io::Cursor::new(bytes))
    }
}

impl<R: io::Read> BitstreamIoReader<R> {
    pub fn new(read: R) -> Self {
        Self {
            bs: BitReader::new(read),
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn skip(&mut self, n: u32) -> io::Result<()> {
        self.bs.skip(n)
    }
}

#[test]
fn reads_msb_first() -> io::Result<()> {
    let mut reader = BsIoSliceReader::from_slice(&[0b1010_0110, 0xFF]);
    assert!(reader.get()?);
    assert_eq!(reader.get_n::<u8>(3)?, 0b010);
    reader.skip(2)?;
    assert_eq!(reader.get_n::<u16>(10)?, 0b10_1111_1111);
    assert!(reader.get().is_err());
    Ok(())
}
