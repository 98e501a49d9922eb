use k256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use tracing::trace;
use zeroize::{Zeroize, Zeroizing};

use crate::address::{pubkey_to_address, AddressType};
use crate::base58;
use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Length every signature produced by [`KeyPair::sign`] is normalized to.
pub const SIGNATURE_DER_LEN: usize = 70;

/// Upper bound on signing attempts before giving up.
pub const MAX_SIGNING_ATTEMPTS: u32 = 256;

/// Flag byte appended to WIF payloads whose public key is compressed.
const WIF_COMPRESSED_FLAG: u8 = 0x01;

/// A secp256k1 private key bound to a network.
#[derive(Clone)]
pub struct KeyPair {
    network: BtcNetwork,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Wrap a raw 32-byte private key.
    pub fn from_private_key(private_key: &[u8], network: BtcNetwork) -> Result<Self, BtcError> {
        if private_key.len() != 32 {
            return Err(BtcError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                private_key.len()
            )));
        }
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secp256k1 key: {e}")))?;
        Ok(Self {
            network,
            signing_key,
        })
    }

    /// Wrap a hex-encoded private key.
    pub fn from_private_key_hex(private_key_hex: &str, network: BtcNetwork) -> Result<Self, BtcError> {
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex)
                .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid hex: {e}")))?,
        );
        Self::from_private_key(&bytes, network)
    }

    /// Generate a fresh random key.
    pub fn random(network: BtcNetwork) -> Self {
        loop {
            let mut candidate: [u8; 32] = crypto_utils::random::random_bytes_fixed();
            let key = SigningKey::from_slice(&candidate);
            candidate.zeroize();
            // Zero or >= n has probability ~2^-128; just draw again.
            if let Ok(signing_key) = key {
                return Self {
                    network,
                    signing_key,
                };
            }
        }
    }

    /// Import a WIF string. The network is taken from its version byte.
    pub fn from_wif(wif: &str) -> Result<Self, BtcError> {
        let payload = Zeroizing::new(
            base58::decode_check(wif).map_err(|e| BtcError::InvalidWif(e.to_string()))?,
        );
        let network = payload
            .first()
            .and_then(|&p| BtcNetwork::from_wif_prefix(p))
            .ok_or_else(|| BtcError::InvalidWif("unknown version byte".into()))?;

        let key = match payload.len() {
            33 => &payload[1..33],
            34 if payload[33] == WIF_COMPRESSED_FLAG => &payload[1..33],
            n => {
                return Err(BtcError::InvalidWif(format!(
                    "unexpected payload length {n}"
                )))
            }
        };
        Self::from_private_key(key, network).map_err(|e| BtcError::InvalidWif(e.to_string()))
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    /// The same key bound to another network.
    pub fn with_network(&self, network: BtcNetwork) -> Self {
        Self {
            network,
            signing_key: self.signing_key.clone(),
        }
    }

    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }

    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&*self.private_key_bytes()))
    }

    /// 33-byte SEC1 compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Uncompressed WIF: Base58Check of `prefix ++ key`.
    pub fn wif(&self) -> Zeroizing<String> {
        let mut payload = Vec::with_capacity(33);
        payload.push(self.network.params().wif_prefix);
        payload.extend_from_slice(&*self.private_key_bytes());
        let encoded = Zeroizing::new(base58::encode_check(&payload));
        payload.zeroize();
        encoded
    }

    /// Compressed WIF, with the trailing 0x01 flag (`K`/`L` on mainnet).
    pub fn wif_compressed(&self) -> Zeroizing<String> {
        let mut payload = Vec::with_capacity(34);
        payload.push(self.network.params().wif_prefix);
        payload.extend_from_slice(&*self.private_key_bytes());
        payload.push(WIF_COMPRESSED_FLAG);
        let encoded = Zeroizing::new(base58::encode_check(&payload));
        payload.zeroize();
        encoded
    }

    /// Address of this key's compressed public key.
    pub fn address(&self, address_type: AddressType) -> Result<String, BtcError> {
        pubkey_to_address(&self.public_key(), address_type, self.network)
    }

    /// Sign a 32-byte digest, returning a 70-byte low-S DER signature.
    ///
    /// Each attempt mixes fresh randomness into the RFC6979 nonce; attempts
    /// whose DER encoding is shorter than 70 bytes are discarded.
    pub fn sign(&self, message_hash: &[u8; 32]) -> Result<Vec<u8>, BtcError> {
        for attempt in 1..=MAX_SIGNING_ATTEMPTS {
            let signature: Signature = self
                .signing_key
                .sign_prehash_with_rng(&mut OsRng, message_hash)
                .map_err(|e| BtcError::SigningError(format!("ECDSA signing failed: {e}")))?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let der = signature.to_der();
            if der.as_bytes().len() == SIGNATURE_DER_LEN {
                return Ok(der.as_bytes().to_vec());
            }
            trace!(attempt, len = der.as_bytes().len(), "discarding short DER signature");
        }
        Err(BtcError::SigningError(format!(
            "no {SIGNATURE_DER_LEN}-byte signature after {MAX_SIGNING_ATTEMPTS} attempts"
        )))
    }

    /// Verify a DER signature over a 32-byte digest with this key.
    pub fn verify(&self, message_hash: &[u8; 32], der_signature: &[u8]) -> bool {
        verify_der(self.signing_key.verifying_key(), message_hash, der_signature)
    }
}

/// Verify a DER signature against a SEC1-encoded public key.
pub fn verify_with_pubkey(pubkey: &[u8], message_hash: &[u8; 32], der_signature: &[u8]) -> bool {
    match VerifyingKey::from_sec1_bytes(pubkey) {
        Ok(vk) => verify_der(&vk, message_hash, der_signature),
        Err(_) => false,
    }
}

fn verify_der(key: &VerifyingKey, message_hash: &[u8; 32], der_signature: &[u8]) -> bool {
    match Signature::from_der(der_signature) {
        Ok(sig) => key.verify_prehash(message_hash, &sig).is_ok(),
        Err(_) => false,
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("network", &self.network)
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_utils::hash256;

    const WIF_VECTOR_KEY: &str = "0c28fca386c7a227600b2fe50b7cae11ec86d3bf1fbe471be89827e19d72aa1d";
    const WIF_VECTOR: &str = "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ";

    fn key_one() -> KeyPair {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        KeyPair::from_private_key(&bytes, BtcNetwork::Mainnet).unwrap()
    }

    #[test]
    fn wif_vector() {
        let kp = KeyPair::from_private_key_hex(WIF_VECTOR_KEY, BtcNetwork::Mainnet).unwrap();
        assert_eq!(kp.wif().as_str(), WIF_VECTOR);
    }

    #[test]
    fn wif_import_vector() {
        let kp = KeyPair::from_wif(WIF_VECTOR).unwrap();
        assert_eq!(kp.network(), BtcNetwork::Mainnet);
        assert_eq!(kp.private_key_hex().as_str(), WIF_VECTOR_KEY);
    }

    #[test]
    fn wif_roundtrip_testnet() {
        let kp = KeyPair::random(BtcNetwork::Testnet);
        let wif = kp.wif();
        assert!(wif.starts_with('9'), "testnet uncompressed WIF starts with 9, got {}", *wif);
        let back = KeyPair::from_wif(&wif).unwrap();
        assert_eq!(back.network(), BtcNetwork::Testnet);
        assert_eq!(*back.private_key_bytes(), *kp.private_key_bytes());
    }

    #[test]
    fn compressed_wif_is_accepted() {
        // Private key 1, compressed, mainnet.
        let kp = KeyPair::from_wif("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn").unwrap();
        assert_eq!(kp.public_key(), key_one().public_key());
        assert_eq!(
            key_one().wif_compressed().as_str(),
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn"
        );
    }

    #[test]
    fn wif_rejects_unknown_prefix_and_bad_checksum() {
        let mut payload = vec![0x05];
        payload.extend_from_slice(&[0x11; 32]);
        let wrong_prefix = base58::encode_check(&payload);
        assert!(matches!(
            KeyPair::from_wif(&wrong_prefix),
            Err(BtcError::InvalidWif(_))
        ));

        let mut corrupted = WIF_VECTOR.to_string();
        corrupted.pop();
        corrupted.push('K');
        assert!(matches!(
            KeyPair::from_wif(&corrupted),
            Err(BtcError::InvalidWif(_))
        ));
    }

    #[test]
    fn invalid_private_keys() {
        assert!(KeyPair::from_private_key(&[0u8; 32], BtcNetwork::Mainnet).is_err());
        assert!(KeyPair::from_private_key(&[1u8; 31], BtcNetwork::Mainnet).is_err());
        assert!(KeyPair::from_private_key(&[0xff; 32], BtcNetwork::Mainnet).is_err());
    }

    #[test]
    fn public_key_of_one_is_generator() {
        assert_eq!(
            key_one().public_key_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn addresses_of_one() {
        let kp = key_one();
        assert_eq!(
            kp.address(AddressType::P2wpkh).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        assert_eq!(
            kp.address(AddressType::P2pkh).unwrap(),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn signatures_are_70_bytes_low_s_and_verify() {
        let kp = KeyPair::random(BtcNetwork::Mainnet);
        for i in 0u8..16 {
            let digest = hash256(&[i]);
            let der = kp.sign(&digest).unwrap();
            assert_eq!(der.len(), SIGNATURE_DER_LEN);
            let sig = Signature::from_der(&der).unwrap();
            assert!(sig.normalize_s().is_none(), "signature must already be low-S");
            assert!(kp.verify(&digest, &der));
            assert!(verify_with_pubkey(&kp.public_key(), &digest, &der));
        }
    }

    #[test]
    fn signing_is_randomized() {
        let kp = key_one();
        let digest = hash256(b"same message");
        let a = kp.sign(&digest).unwrap();
        let b = kp.sign(&digest).unwrap();
        assert_ne!(a, b);
        assert!(kp.verify(&digest, &a) && kp.verify(&digest, &b));
    }

    #[test]
    fn verify_rejects_wrong_digest_key_and_garbage() {
        let kp = key_one();
        let other = KeyPair::random(BtcNetwork::Mainnet);
        let digest = hash256(b"message");
        let der = kp.sign(&digest).unwrap();
        assert!(!kp.verify(&hash256(b"other"), &der));
        assert!(!other.verify(&digest, &der));
        assert!(!kp.verify(&digest, &[0x30, 0x00]));
        assert!(!verify_with_pubkey(&[0x02; 33], &digest, &der));
    }

    #[test]
    fn debug_does_not_leak_private_key() {
        let kp = KeyPair::from_private_key_hex(WIF_VECTOR_KEY, BtcNetwork::Mainnet).unwrap();
        let debug = format!("{kp:?}");
        assert!(!debug.contains(WIF_VECTOR_KEY));
        assert!(debug.contains("public_key"));
    }
}
