use crate::base58;
use crate::bech32;
use crate::error::BtcError;
use crate::network::BtcNetwork;

pub const OP_0: u8 = 0x00;
pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xA9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xAC;

/// Output script templates this crate can spend or pay to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    P2pkh,
    P2wpkh,
    P2wsh,
    Unknown,
}

impl ScriptType {
    /// Classify a scriptPubKey by its exact byte pattern.
    pub fn classify(script: &[u8]) -> Self {
        match script {
            [OP_DUP, OP_HASH160, 0x14, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
                ScriptType::P2pkh
            }
            [OP_0, 0x14, program @ ..] if program.len() == 20 => ScriptType::P2wpkh,
            [OP_0, 0x20, program @ ..] if program.len() == 32 => ScriptType::P2wsh,
            _ => ScriptType::Unknown,
        }
    }

    pub fn is_segwit(self) -> bool {
        matches!(self, ScriptType::P2wpkh | ScriptType::P2wsh)
    }
}

/// Whether spending `script_pubkey` takes the BIP143 witness path.
pub fn is_segwit(script_pubkey: &[u8]) -> bool {
    ScriptType::classify(script_pubkey).is_segwit()
}

/// Build a P2PKH scriptPubKey: OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(0x14);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build a P2WPKH scriptPubKey: OP_0 <20-byte hash>
pub fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.push(OP_0);
    script.push(0x14);
    script.extend_from_slice(pubkey_hash);
    script
}

/// Convert an address string into the scriptPubKey it locks to.
///
/// `1`/`m`/`n` addresses are Base58Check P2PKH, `bc1`/`tb1` addresses are
/// bech32 segwit programs. Anything else is unsupported.
pub fn address_to_script_pubkey(address: &str) -> Result<Vec<u8>, BtcError> {
    let lower = address.to_ascii_lowercase();
    if address.starts_with(&['1', 'm', 'n'][..]) {
        let payload = base58::decode_check(address)
            .map_err(|e| BtcError::InvalidAddress(format!("{address}: {e}")))?;
        if payload.len() != 21 {
            return Err(BtcError::InvalidAddress(format!(
                "{address}: expected 21-byte payload, got {}",
                payload.len()
            )));
        }
        if BtcNetwork::from_p2pkh_prefix(payload[0]).is_none() {
            return Err(BtcError::InvalidAddress(format!(
                "{address}: unknown version byte 0x{:02x}",
                payload[0]
            )));
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(p2pkh_script(&hash))
    } else if lower.starts_with("bc1") || lower.starts_with("tb1") {
        let wp = bech32::decode_address(address)
            .map_err(|e| BtcError::InvalidAddress(format!("{address}: {e}")))?;
        if BtcNetwork::from_hrp(&wp.hrp).is_none() {
            return Err(BtcError::InvalidAddress(format!(
                "{address}: unknown hrp {}",
                wp.hrp
            )));
        }
        Ok(wp.script_pubkey())
    } else {
        Err(BtcError::UnsupportedAddress(address.to_string()))
    }
}

/// Expand a P2WPKH scriptPubKey into its BIP143 scriptCode.
///
/// The result is the equivalent P2PKH script prefixed with its own length
/// byte, as it appears inside the segwit signature preimage.
pub fn script_pubkey_to_script_code(script_pubkey: &[u8]) -> Result<Vec<u8>, BtcError> {
    if ScriptType::classify(script_pubkey) != ScriptType::P2wpkh {
        return Err(BtcError::InvalidInput(format!(
            "scriptCode requires a P2WPKH scriptPubKey, got {}",
            hex::encode(script_pubkey)
        )));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script_pubkey[2..]);

    let p2pkh = p2pkh_script(&hash);
    let mut script_code = Vec::with_capacity(1 + p2pkh.len());
    script_code.push(p2pkh.len() as u8);
    script_code.extend_from_slice(&p2pkh);
    Ok(script_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn p2pkh_script_format() {
        let hash = [0x42; 20];
        let script = p2pkh_script(&hash);
        assert_eq!(script.len(), 25);
        assert_eq!(script[0], 0x76);
        assert_eq!(script[1], 0xA9);
        assert_eq!(script[2], 0x14);
        assert_eq!(&script[3..23], &hash);
        assert_eq!(script[23], 0x88);
        assert_eq!(script[24], 0xAC);
    }

    #[test]
    fn classification_is_exclusive() {
        let hash = [0x07; 20];
        assert_eq!(ScriptType::classify(&p2pkh_script(&hash)), ScriptType::P2pkh);
        assert_eq!(ScriptType::classify(&p2wpkh_script(&hash)), ScriptType::P2wpkh);

        let mut p2wsh = vec![0x00, 0x20];
        p2wsh.extend_from_slice(&[0x09; 32]);
        assert_eq!(ScriptType::classify(&p2wsh), ScriptType::P2wsh);

        assert!(!is_segwit(&p2pkh_script(&hash)));
        assert!(is_segwit(&p2wpkh_script(&hash)));
        assert!(is_segwit(&p2wsh));

        // Wrong push lengths are neither.
        assert_eq!(ScriptType::classify(&[0x00, 0x14, 0x01]), ScriptType::Unknown);
        assert_eq!(ScriptType::classify(&[]), ScriptType::Unknown);
        let mut p2tr = vec![0x51, 0x20];
        p2tr.extend_from_slice(&[0x01; 32]);
        assert!(!is_segwit(&p2tr));
    }

    #[test]
    fn p2pkh_address_to_script() {
        let script = address_to_script_pubkey("mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt").unwrap();
        assert_eq!(
            hex::encode(script),
            "76a91418ba14b3682295cb05230e31fecb00089240660888ac"
        );
    }

    #[test]
    fn segwit_address_to_script() {
        let script =
            address_to_script_pubkey("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap();
        assert_eq!(
            hex::encode(script),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn matches_reference_scripts() {
        for address in [
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXt",
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7",
        ] {
            let reference = bitcoin::Address::from_str(address)
                .unwrap()
                .assume_checked()
                .script_pubkey();
            assert_eq!(
                address_to_script_pubkey(address).unwrap(),
                reference.as_bytes(),
                "{address}"
            );
        }
    }

    #[test]
    fn unsupported_prefixes() {
        assert!(matches!(
            address_to_script_pubkey("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"),
            Err(BtcError::UnsupportedAddress(_))
        ));
        assert!(matches!(
            address_to_script_pubkey("ltc1qw508d6qejxtdg4y5r3zarvary0c5xw7kgmn4n9"),
            Err(BtcError::UnsupportedAddress(_))
        ));
        assert!(matches!(
            address_to_script_pubkey(""),
            Err(BtcError::UnsupportedAddress(_))
        ));
    }

    #[test]
    fn corrupted_addresses_are_invalid() {
        assert!(matches!(
            address_to_script_pubkey("mhmhRnN58ki9zbRJ63mpNGQXoYvdMXZsXu"),
            Err(BtcError::InvalidAddress(_))
        ));
        assert!(matches!(
            address_to_script_pubkey("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5"),
            Err(BtcError::InvalidAddress(_))
        ));
    }

    #[test]
    fn bech32_hrp_must_name_a_network() {
        // Checksums correctly, but the hrp is "bc1x".
        let foreign = crate::bech32::encode("bc1x", 0, &[0x11; 20]).unwrap();
        assert!(foreign.starts_with("bc1x1q"));
        assert!(matches!(
            address_to_script_pubkey(&foreign),
            Err(BtcError::InvalidAddress(_))
        ));
        assert!(!crate::address::is_valid_address(&foreign));

        let upper = crate::bech32::encode("tb", 0, &[0x11; 20]).unwrap().to_ascii_uppercase();
        assert_eq!(
            address_to_script_pubkey(&upper).unwrap(),
            p2wpkh_script(&[0x11; 20])
        );
    }

    #[test]
    fn script_code_for_p2wpkh() {
        let spk = hex::decode("00141d0f172a0ecb48aee1be1f2687d2963ae33f71a1").unwrap();
        assert_eq!(
            hex::encode(script_pubkey_to_script_code(&spk).unwrap()),
            "1976a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac"
        );
    }

    #[test]
    fn script_code_rejects_other_templates() {
        assert!(script_pubkey_to_script_code(&p2pkh_script(&[1; 20])).is_err());
    }
}
