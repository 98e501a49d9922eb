use crypto_utils::hash160;
use serde::{Deserialize, Serialize};

use crate::base58;
use crate::bech32;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::script::{address_to_script_pubkey, ScriptType};

/// Address formats derivable from a single public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Legacy Base58Check pay-to-pubkey-hash (`1...`, `m...`/`n...`).
    P2pkh,
    /// Native SegWit v0 pay-to-witness-pubkey-hash (`bc1q...`, `tb1q...`).
    P2wpkh,
}

/// Encode a 20-byte public key hash as an address of the given type.
pub fn hash_to_address(
    pubkey_hash: &[u8; 20],
    address_type: AddressType,
    network: BtcNetwork,
) -> Result<String, BtcError> {
    match address_type {
        AddressType::P2wpkh => bech32::get_address(pubkey_hash, network),
        AddressType::P2pkh => {
            let mut payload = Vec::with_capacity(21);
            payload.push(network.params().p2pkh_prefix);
            payload.extend_from_slice(pubkey_hash);
            Ok(base58::encode_check(&payload))
        }
    }
}

/// Derive an address from a 33-byte compressed secp256k1 public key.
///
/// The public key is hashed with Hash160 and then encoded per
/// [`hash_to_address`].
pub fn pubkey_to_address(
    pubkey_bytes: &[u8],
    address_type: AddressType,
    network: BtcNetwork,
) -> Result<String, BtcError> {
    if pubkey_bytes.len() != 33 || !matches!(pubkey_bytes[0], 0x02 | 0x03) {
        return Err(BtcError::InvalidPublicKey(format!(
            "expected 33-byte compressed key, got {} bytes",
            pubkey_bytes.len()
        )));
    }
    hash_to_address(&hash160(pubkey_bytes), address_type, network)
}

/// Whether `address` decodes to a P2PKH, P2WPKH or P2WSH scriptPubKey.
pub fn is_valid_address(address: &str) -> bool {
    match address_to_script_pubkey(address) {
        Ok(script) => ScriptType::classify(&script) != ScriptType::Unknown,
        Err(_) => false,
    }
}

/// Canonical spelling of an address: bech32 lower-cased, Base58 as given.
pub fn normalize_address(address: &str) -> String {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("bc1") || lower.starts_with("tb1") {
        lower
    } else {
        address.to_string()
    }
}

/// Network an address belongs to, judged by its version byte or HRP.
pub fn address_network(address: &str) -> Result<BtcNetwork, BtcError> {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("bc1") || lower.starts_with("tb1") {
        let wp = bech32::decode_address(address)
            .map_err(|e| BtcError::InvalidAddress(format!("{address}: {e}")))?;
        return BtcNetwork::from_hrp(&wp.hrp)
            .ok_or_else(|| BtcError::InvalidAddress(format!("unknown hrp {}", wp.hrp)));
    }
    if address.starts_with(&['1', 'm', 'n'][..]) {
        let payload = base58::decode_check(address)
            .map_err(|e| BtcError::InvalidAddress(format!("{address}: {e}")))?;
        let prefix = *payload
            .first()
            .ok_or_else(|| BtcError::InvalidAddress(format!("{address}: empty payload")))?;
        return BtcNetwork::from_p2pkh_prefix(prefix).ok_or_else(|| {
            BtcError::InvalidAddress(format!("{address}: unknown version byte 0x{prefix:02x}"))
        });
    }
    Err(BtcError::UnsupportedAddress(address.to_string()))
}
