//! Base58 and Base58Check text encodings (Bitcoin alphabet).
//!
//! Leading zero bytes map to leading `1` characters in both directions; the
//! big-number conversion itself is delegated to `bs58`.

use crypto_utils::checksum;

use crate::error::BtcError;

/// Plain Base58 encoding.
pub fn encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Plain Base58 decoding.
pub fn decode(text: &str) -> Result<Vec<u8>, BtcError> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| BtcError::Format(format!("invalid base58: {e}")))
}

/// Base58Check: `payload ++ checksum(payload)`, Base58 encoded.
pub fn encode_check(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    encode(&data)
}

/// Decode Base58Check text and return the payload without its checksum.
pub fn decode_check(text: &str) -> Result<Vec<u8>, BtcError> {
    let mut data = decode(text)?;
    if data.len() < 5 {
        return Err(BtcError::Format(format!(
            "base58check payload too short: {} bytes",
            data.len()
        )));
    }
    let split = data.len() - 4;
    if checksum(&data[..split]) != data[split..] {
        return Err(BtcError::Format("base58check checksum mismatch".into()));
    }
    data.truncate(split);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_testnet_address_vector() {
        let bytes = hex::decode("6f18ba14b3682295cb05230e31fecb0008924066083ec40de7").unwrap();
        assert_eq!(encode(&bytes), "mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt");
        assert_eq!(decode("mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt").unwrap(), bytes);
    }

    #[test]
    fn check_encoding_matches_manual_checksum() {
        let payload = hex::decode("6f18ba14b3682295cb05230e31fecb000892406608").unwrap();
        assert_eq!(encode_check(&payload), "mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt");
        assert_eq!(
            decode_check("mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt").unwrap(),
            payload
        );
    }

    #[test]
    fn leading_zero_bytes_become_ones() {
        assert_eq!(encode(&[0, 0, 1]), "112");
        assert_eq!(decode("112").unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        for bad in ["0abc", "Oabc", "Iabc", "labc"] {
            assert!(matches!(decode(bad), Err(BtcError::Format(_))), "{bad}");
        }
    }

    #[test]
    fn decode_check_rejects_corruption() {
        // Last character altered.
        assert!(decode_check("mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXu").is_err());
        assert!(decode_check("1111").is_err());
    }

    proptest! {
        #[test]
        fn roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn check_roundtrip(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
            prop_assert_eq!(decode_check(&encode_check(&bytes)).unwrap(), bytes);
        }
    }
}
