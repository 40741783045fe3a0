/// Little-endian serialization for fixed-layout file headers.
pub trait WriteBytesLe {
    fn write_le(&self, dst: &mut Vec<u8>);
}

macro_rules! impl_num_le {
    ($($t:ty),+) => { $(
        impl WriteBytesLe for $t { #[inline] fn write_le(&self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_le_bytes()); }}
    )+ }
}

impl_num_le!(u8, i8, u16, i16, u32, i32, u64, i64);

impl<T: WriteBytesLe, const N: usize> WriteBytesLe for [T; N] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}

impl<T: WriteBytesLe> WriteBytesLe for [T] {
    #[inline]
    fn write_le(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_le(dst));
    }
}
