//! Strategies for finding the key that signs a given input.

use std::collections::HashMap;

use crate::keypair::KeyPair;
use crate::transaction::InputTransaction;

/// Resolves the signing key for an input.
pub trait SignerSource {
    fn signer_for(&self, input: &InputTransaction) -> Option<&KeyPair>;

    /// Drop any per-input state when the transaction is cleared.
    fn clear(&mut self) {}
}

/// One key signs every input.
#[derive(Debug, Clone)]
pub struct SingleKey(pub KeyPair);

impl SignerSource for SingleKey {
    fn signer_for(&self, _input: &InputTransaction) -> Option<&KeyPair> {
        Some(&self.0)
    }
}

/// Keys looked up per outpoint (`txid:vout`).
#[derive(Debug, Clone, Default)]
pub struct InputKeyMap {
    keys: HashMap<String, KeyPair>,
}

impl InputKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: &InputTransaction, key: KeyPair) -> Option<KeyPair> {
        self.keys.insert(input.outpoint_key(), key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl SignerSource for InputKeyMap {
    fn signer_for(&self, input: &InputTransaction) -> Option<&KeyPair> {
        self.keys.get(&input.outpoint_key())
    }

    fn clear(&mut self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::BtcNetwork;

    fn input(txid: &str, vout: u32) -> InputTransaction {
        InputTransaction::new(txid, vout, "0014".to_string() + &"11".repeat(20), 1_000)
    }

    #[test]
    fn single_key_signs_everything() {
        let key = KeyPair::random(BtcNetwork::Testnet);
        let pubkey = key.public_key();
        let single = SingleKey(key);
        for vout in 0..3 {
            let signer = single.signer_for(&input(&"ab".repeat(32), vout)).unwrap();
            assert_eq!(signer.public_key(), pubkey);
        }
    }

    #[test]
    fn key_map_is_keyed_by_outpoint() {
        let mut map = InputKeyMap::new();
        let a = input(&"AB".repeat(32), 0);
        let key = KeyPair::random(BtcNetwork::Mainnet);
        let pubkey = key.public_key();
        assert!(map.insert(&a, key).is_none());

        // Lookup ignores txid case.
        let lower = input(&"ab".repeat(32), 0);
        assert_eq!(map.signer_for(&lower).unwrap().public_key(), pubkey);
        assert!(map.signer_for(&input(&"ab".repeat(32), 1)).is_none());

        map.clear();
        assert!(map.is_empty());
        assert!(map.signer_for(&lower).is_none());
    }
}
