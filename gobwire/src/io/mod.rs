//! [`Reader`] over a fully buffered message and framing over byte streams.
use crate::{
    error::{unexpected_end, Result},
    types::TypeId,
    varint::{decode_uint, float_from_bits, unzigzag},
};

mod stream;
pub(crate) use stream::FrameReader;

#[inline(always)]
fn advance_slice_checked<'a, T>(input: &mut &'a [T], len: usize) -> Option<&'a [T]> {
    let (taken, rest) = input.split_at_checked(len)?;
    *input = rest;
    Some(taken)
}

/// In-memory reader over the bytes of one message.
///
/// Every primitive of the wire format is read through this cursor; running
/// out of bytes surfaces as [`Error::UnexpectedEnd`](crate::Error::UnexpectedEnd).
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    cursor: &'a [u8],
}

impl<'a> Reader<'a> {
    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: bytes }
    }

    /// Bytes left in the message.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.cursor.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    #[inline]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.cursor
    }

    /// Borrow exactly `len` bytes and advance past them.
    #[inline]
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        advance_slice_checked(&mut self.cursor, len).ok_or_else(|| unexpected_end(len))
    }

    /// Advance `amt` bytes and discard them.
    #[inline]
    pub fn consume(&mut self, amt: usize) -> Result<()> {
        self.read_exact(amt).map(|_| ())
    }

    #[inline]
    pub fn read_uint(&mut self) -> Result<u64> {
        let (value, read) = decode_uint(self.cursor)?;
        self.cursor = &self.cursor[read..];
        Ok(value)
    }

    #[inline]
    pub fn read_int(&mut self) -> Result<i64> {
        self.read_uint().map(unzigzag)
    }

    #[inline]
    pub fn read_float(&mut self) -> Result<f64> {
        self.read_uint().map(float_from_bits)
    }

    /// Read a length and bound it by the bytes left in the message.
    #[inline]
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_uint()?;
        match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => Ok(len),
            _ => Err(unexpected_end(usize::try_from(len).unwrap_or(usize::MAX))),
        }
    }

    /// Read a length-prefixed byte string.
    #[inline]
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.read_exact(len)
    }

    /// Read a signed type id.
    ///
    /// The sign is kept: negative ids announce a type definition.
    #[inline]
    pub fn read_type_id(&mut self) -> Result<TypeId> {
        let raw = self.read_int()?;
        i32::try_from(raw)
            .map(TypeId)
            .map_err(|_| crate::error::corrupt("type id out of range"))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{proptest_config::proptest_cfg, varint::encode_uint, Error},
        proptest::prelude::*,
    };

    #[test]
    fn read_len_bounded_by_message() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 10);
        buf.extend_from_slice(&[1, 2, 3]);
        let mut reader = Reader::new(&buf);
        assert!(matches!(reader.read_len(), Err(Error::UnexpectedEnd(10))));
    }

    #[test]
    fn read_type_id_keeps_sign() {
        let mut buf = Vec::new();
        crate::varint::encode_int(&mut buf, -65);
        crate::varint::encode_int(&mut buf, 64);
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.read_type_id().unwrap(), TypeId(-65));
        assert_eq!(reader.read_type_id().unwrap(), TypeId(64));
        assert!(reader.is_empty());
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn reader_read_exact(bytes in proptest::collection::vec(any::<u8>(), 0..=100)) {
            let half = bytes.len() / 2;
            let mut reader = Reader::new(&bytes);
            prop_assert_eq!(reader.read_exact(half).unwrap(), &bytes[..half]);
            prop_assert_eq!(reader.remaining(), bytes.len() - half);
            prop_assert_eq!(reader.as_slice(), &bytes[half..]);
            prop_assert!(reader.read_exact(bytes.len() - half + 1).is_err());
        }

        #[test]
        fn reader_byte_strings(strings in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..=40), 0..=8)) {
            let mut buf = Vec::new();
            for s in &strings {
                encode_uint(&mut buf, s.len() as u64);
                buf.extend_from_slice(s);
            }
            let mut reader = Reader::new(&buf);
            for s in &strings {
                prop_assert_eq!(reader.read_bytes().unwrap(), s.as_slice());
            }
            prop_assert!(reader.is_empty());
        }
    }
}
