//! Variable length integer encoding used for every integer on the wire.
//!
//! Unsigned values up to `0x7F` occupy a single byte. Larger values are
//! written as a byte holding the negated count of magnitude bytes, followed
//! by the minimal big-endian magnitude.
//!
//! ```
//! # use gobwire::varint::encode_uint;
//! let mut buf = Vec::new();
//! encode_uint(&mut buf, 127);
//! encode_uint(&mut buf, 128);
//! assert_eq!(buf, [0x7F, 0xFF, 0x80]);
//! ```
//!
//! Signed integers are zig-zag mapped before encoding so that small negative
//! and positive magnitudes are both cheap. Floats are sent with their byte
//! order reversed, which moves the exponent into the low bytes.
use crate::error::{bad_uint, unexpected_end, Result};

/// Largest number of magnitude bytes a length prefix may announce.
pub const MAX_UINT_BYTES: usize = 8;

/// Number of bytes [`encode_uint`] emits for `x`.
#[inline]
pub const fn uint_len(x: u64) -> usize {
    if x <= 0x7F {
        1
    } else {
        1 + MAX_UINT_BYTES - (x.leading_zeros() / 8) as usize
    }
}

#[inline]
pub fn encode_uint(buf: &mut Vec<u8>, x: u64) {
    if x <= 0x7F {
        buf.push(x as u8);
        return;
    }
    let bytes = x.to_be_bytes();
    let skip = (x.leading_zeros() / 8) as usize;
    let n = MAX_UINT_BYTES - skip;
    buf.push((n as u8).wrapping_neg());
    buf.extend_from_slice(&bytes[skip..]);
}

#[inline]
pub fn encode_int(buf: &mut Vec<u8>, i: i64) {
    encode_uint(buf, zigzag(i));
}

#[inline]
pub fn encode_float(buf: &mut Vec<u8>, f: f64) {
    encode_uint(buf, float_bits(f));
}

/// Decode an unsigned integer from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
#[inline]
pub fn decode_uint(bytes: &[u8]) -> Result<(u64, usize)> {
    let Some(&lead) = bytes.first() else {
        return Err(unexpected_end(1));
    };
    if lead <= 0x7F {
        return Ok((lead as u64, 1));
    }
    let n = prefix_len(lead)?;
    let Some(magnitude) = bytes.get(1..=n) else {
        return Err(unexpected_end(n));
    };
    Ok((fold_be(magnitude), n + 1))
}

/// Number of magnitude bytes announced by a length prefix byte (`lead > 0x7F`).
#[inline]
pub(crate) fn prefix_len(lead: u8) -> Result<usize> {
    let n = 256 - lead as usize;
    if n > MAX_UINT_BYTES {
        return Err(bad_uint());
    }
    Ok(n)
}

#[inline]
pub(crate) fn fold_be(magnitude: &[u8]) -> u64 {
    magnitude.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Map a signed integer onto the unsigned line, keeping small magnitudes small.
#[inline]
pub const fn zigzag(i: i64) -> u64 {
    if i < 0 {
        ((!i as u64) << 1) | 1
    } else {
        (i as u64) << 1
    }
}

#[inline]
pub const fn unzigzag(x: u64) -> i64 {
    let i = (x >> 1) as i64;
    if x & 1 != 0 {
        !i
    } else {
        i
    }
}

#[inline]
pub fn float_bits(f: f64) -> u64 {
    f.to_bits().swap_bytes()
}

#[inline]
pub fn float_from_bits(x: u64) -> f64 {
    f64::from_bits(x.swap_bytes())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, crate::Error, proptest::prelude::*};

    #[test]
    fn single_byte_boundary() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 127);
        assert_eq!(buf, [0x7F]);

        buf.clear();
        encode_uint(&mut buf, 128);
        assert_eq!(buf, [0xFF, 0x80]);

        buf.clear();
        encode_uint(&mut buf, 256);
        assert_eq!(buf, [0xFE, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, u64::MAX);
        assert_eq!(buf, [0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn oversized_prefix_is_bad_uint() {
        // 0xF7 announces nine magnitude bytes.
        let bytes = [0xF7, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert!(matches!(decode_uint(&bytes), Err(Error::BadUint)));
    }

    #[test]
    fn truncated_magnitude() {
        assert!(matches!(
            decode_uint(&[0xFE, 0x01]),
            Err(Error::UnexpectedEnd(2))
        ));
        assert!(matches!(decode_uint(&[]), Err(Error::UnexpectedEnd(1))));
    }

    #[test]
    fn zigzag_small_values() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(3), 6);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
    }

    #[test]
    fn integral_floats_are_short() {
        let mut buf = Vec::new();
        encode_float(&mut buf, 17.0);
        // 17.0 = 0x4031000000000000, reversed 0x3140.
        assert_eq!(buf, [0xFE, 0x31, 0x40]);
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn uint_roundtrip_minimal(x in any::<u64>()) {
            let mut buf = Vec::new();
            encode_uint(&mut buf, x);
            prop_assert_eq!(buf.len(), uint_len(x));
            let minimal = if x <= 0x7F { 1 } else { 1 + (64 - x.leading_zeros() as usize).div_ceil(8) };
            prop_assert_eq!(buf.len(), minimal);
            let (decoded, read) = decode_uint(&buf).unwrap();
            prop_assert_eq!(decoded, x);
            prop_assert_eq!(read, buf.len());
        }

        #[test]
        fn int_roundtrip(i in any::<i64>()) {
            prop_assert_eq!(unzigzag(zigzag(i)), i);
        }

        #[test]
        fn float_roundtrip(f in any::<f64>()) {
            let mut buf = Vec::new();
            encode_float(&mut buf, f);
            let (bits, _) = decode_uint(&buf).unwrap();
            prop_assert_eq!(float_from_bits(bits).to_bits(), f.to_bits());
        }
    }
}
