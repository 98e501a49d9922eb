//! Integer, hex and CompactSize encodings shared by every serializer in the
//! crate.

use crate::error::BtcError;

/// Decode a hex string into bytes.
///
/// Empty and odd-length strings are rejected.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, BtcError> {
    if hex_str.is_empty() {
        return Err(BtcError::Format("empty hex string".into()));
    }
    if hex_str.len() % 2 != 0 {
        return Err(BtcError::Format(format!(
            "odd-length hex string ({} chars)",
            hex_str.len()
        )));
    }
    hex::decode(hex_str).map_err(|e| BtcError::Format(format!("invalid hex: {e}")))
}

/// Encode bytes as lower-case hex. Empty input is rejected.
pub fn bytes_to_hex(bytes: &[u8]) -> Result<String, BtcError> {
    if bytes.is_empty() {
        return Err(BtcError::Format("cannot hex-encode empty bytes".into()));
    }
    Ok(hex::encode(bytes))
}

/// Reverse the byte order of a hex string (txid display order <-> internal order).
pub fn reverse_hex(hex_str: &str) -> Result<String, BtcError> {
    let mut bytes = hex_to_bytes(hex_str)?;
    bytes.reverse();
    bytes_to_hex(&bytes)
}

fn check_width(n: u64, bits: u32) -> Result<usize, BtcError> {
    if bits < 8 || bits > 64 || bits % 8 != 0 {
        return Err(BtcError::Format(format!(
            "integer width must be a whole number of bytes between 8 and 64 bits, got {bits}"
        )));
    }
    if bits < 64 && n >> bits != 0 {
        return Err(BtcError::Format(format!("{n} does not fit in {bits} bits")));
    }
    Ok((bits / 8) as usize)
}

/// Fixed-width big-endian encoding of `n` in `bits` bits.
pub fn number_to_bytes_be(n: u64, bits: u32) -> Result<Vec<u8>, BtcError> {
    let width = check_width(n, bits)?;
    Ok(n.to_be_bytes()[8 - width..].to_vec())
}

/// Fixed-width little-endian encoding of `n` in `bits` bits.
pub fn number_to_bytes_le(n: u64, bits: u32) -> Result<Vec<u8>, BtcError> {
    let width = check_width(n, bits)?;
    Ok(n.to_le_bytes()[..width].to_vec())
}

/// Bitcoin CompactSize encoding.
pub fn number_to_varint(n: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    write_varint(&mut buf, n);
    buf
}

/// Append the CompactSize encoding of `n` to `buf`.
pub fn write_varint(buf: &mut Vec<u8>, n: u64) {
    if n < 0xFD {
        buf.push(n as u8);
    } else if n <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xFFFF_FFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

/// Parse a CompactSize from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_varint(bytes: &[u8]) -> Result<(u64, usize), BtcError> {
    let first = *bytes
        .first()
        .ok_or_else(|| BtcError::Format("varint: no bytes".into()))?;
    let width = match first {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        n => return Ok((n as u64, 1)),
    };
    let body = bytes
        .get(1..1 + width)
        .ok_or_else(|| BtcError::Format(format!("varint: expected {width} more bytes")))?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(body);
    Ok((u64::from_le_bytes(le), 1 + width))
}

/// Prefix `data` with its CompactSize length.
pub fn with_varint_len(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 9);
    write_varint(&mut buf, data.len() as u64);
    buf.extend_from_slice(data);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let bytes = hex_to_bytes("00ff10").unwrap();
        assert_eq!(bytes, vec![0x00, 0xff, 0x10]);
        assert_eq!(bytes_to_hex(&bytes).unwrap(), "00ff10");
    }

    #[test]
    fn hex_rejects_empty_and_odd() {
        assert!(matches!(hex_to_bytes(""), Err(BtcError::Format(_))));
        assert!(matches!(hex_to_bytes("abc"), Err(BtcError::Format(_))));
        assert!(matches!(hex_to_bytes("zz"), Err(BtcError::Format(_))));
        assert!(matches!(bytes_to_hex(&[]), Err(BtcError::Format(_))));
    }

    #[test]
    fn reverse_hex_flips_byte_order() {
        assert_eq!(reverse_hex("0102ab").unwrap(), "ab0201");
    }

    #[test]
    fn fixed_width_encodings() {
        assert_eq!(number_to_bytes_be(0x0102, 32).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(number_to_bytes_le(0x0102, 32).unwrap(), vec![2, 1, 0, 0]);
        assert_eq!(number_to_bytes_le(1, 8).unwrap(), vec![1]);
        assert_eq!(number_to_bytes_le(u64::MAX, 64).unwrap(), vec![0xff; 8]);
    }

    #[test]
    fn fixed_width_rejects_bad_widths_and_overflow() {
        assert!(number_to_bytes_le(1, 4).is_err());
        assert!(number_to_bytes_le(1, 12).is_err());
        assert!(number_to_bytes_le(1, 72).is_err());
        assert!(number_to_bytes_be(256, 8).is_err());
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(number_to_varint(0), vec![0x00]);
        assert_eq!(number_to_varint(0xFC), vec![0xFC]);
        assert_eq!(number_to_varint(0xFD), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(number_to_varint(0xFFFF), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(number_to_varint(0x10000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(number_to_varint(0x1_0000_0000).len(), 9);
        assert_eq!(number_to_varint(0x1_0000_0000)[0], 0xFF);
    }

    #[test]
    fn read_varint_inverts_write() {
        for n in [0u64, 1, 0xFC, 0xFD, 300, 0xFFFF, 0x10000, 0xFFFF_FFFF, 0x1_0000_0000] {
            let encoded = number_to_varint(n);
            assert_eq!(read_varint(&encoded).unwrap(), (n, encoded.len()));
        }
    }

    #[test]
    fn read_varint_truncated() {
        assert!(read_varint(&[]).is_err());
        assert!(read_varint(&[0xFD, 0x01]).is_err());
    }

    #[test]
    fn with_varint_len_prefixes() {
        assert_eq!(with_varint_len(&[0xAA, 0xBB]), vec![0x02, 0xAA, 0xBB]);
        assert_eq!(with_varint_len(&[]), vec![0x00]);
    }
}
