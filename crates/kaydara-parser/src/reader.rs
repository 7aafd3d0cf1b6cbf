//! Cursor over a byte buffer with typed reads.

use kaydara_core::{FbxError, Result};

/// Byte order used for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Sequential reader over a borrowed buffer.
///
/// Every read checks bounds and reports `UnexpectedEof` with the offset at
/// which it ran out.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
    order: ByteOrder,
}

macro_rules! read_scalar {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let mut buf = [0u8; N];
            buf.copy_from_slice(self.take(N)?);
            Ok(match self.order {
                ByteOrder::Little => <$ty>::from_le_bytes(buf),
                ByteOrder::Big => <$ty>::from_be_bytes(buf),
            })
        }
    };
}

macro_rules! read_array {
    ($name:ident, $read:ident, $ty:ty) => {
        pub fn $name(&mut self, count: usize) -> Result<Vec<$ty>> {
            let needed = count.saturating_mul(std::mem::size_of::<$ty>());
            self.ensure(needed)?;
            (0..count).map(|_| self.$read()).collect()
        }
    };
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_order(data, ByteOrder::Little)
    }

    pub fn with_order(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            offset: 0,
            order,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(FbxError::UnexpectedEof {
                offset: self.offset,
                needed,
            });
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        self.ensure(count)?;
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? & 1 == 1)
    }

    read_scalar!(read_i16, i16);
    read_scalar!(read_u32, u32);
    read_scalar!(read_i32, i32);
    read_scalar!(read_u64, u64);
    read_scalar!(read_i64, i64);
    read_scalar!(read_f32, f32);
    read_scalar!(read_f64, f64);

    read_array!(read_bool_array, read_bool, bool);
    read_array!(read_i32_array, read_i32, i32);
    read_array!(read_i64_array, read_i64, i64);
    read_array!(read_f32_array, read_f32, f32);
    read_array!(read_f64_array, read_f64, f64);

    /// Read a string of `len` bytes.
    ///
    /// The value is cut at the first NUL byte, which also drops the
    /// `\0\x01Class` suffix binary files append to object names.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_little_and_big_endian() {
        let data = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(BinaryReader::new(&data).read_u32().unwrap(), 1);
        assert_eq!(
            BinaryReader::with_order(&data, ByteOrder::Big).read_u32().unwrap(),
            0x0100_0000
        );
    }

    #[test]
    fn test_eof_reports_offset() {
        let mut reader = BinaryReader::new(&[1, 2, 3]);
        reader.skip(2).unwrap();
        match reader.read_u32() {
            Err(FbxError::UnexpectedEof { offset, needed }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
            }
            other => panic!("Expected eof, got {:?}", other),
        }
    }

    #[test]
    fn test_string_stops_at_nul() {
        let data = b"Cube\0\x01Model";
        let mut reader = BinaryReader::new(data);
        assert_eq!(reader.read_string(data.len()).unwrap(), "Cube");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_array_bounds_checked_up_front() {
        let mut reader = BinaryReader::new(&[0u8; 12]);
        assert!(reader.read_f64_array(2).is_err());
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.read_f32_array(3).unwrap().len(), 3);
    }

    proptest! {
        #[test]
        fn prop_i64_matches_native(value: i64) {
            let le = value.to_le_bytes();
            prop_assert_eq!(BinaryReader::new(&le).read_i64().unwrap(), value);

            let be = value.to_be_bytes();
            prop_assert_eq!(
                BinaryReader::with_order(&be, ByteOrder::Big).read_i64().unwrap(),
                value
            );
        }

        #[test]
        fn prop_f64_matches_native(value in proptest::num::f64::NORMAL) {
            let le = value.to_le_bytes();
            prop_assert_eq!(BinaryReader::new(&le).read_f64().unwrap(), value);
        }
    }
}
