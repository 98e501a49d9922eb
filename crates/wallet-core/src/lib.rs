//! HD wallet layer over `chain-btc`: BIP-39 mnemonics, BIP-32/44/84 key
//! derivation and transactions whose inputs are signed by derived keys.

pub mod error;
pub mod hd_derivation;
pub mod mnemonic;

use chain_btc::{
    BtcNetwork, FeePolicy, HdTransaction, InputTransaction, KeyPair, OutputTransaction,
    SingleKeyTransaction,
};
use tracing::debug;

pub use error::WalletError;
pub use hd_derivation::{AccountPath, HdKeyManager, Purpose, MAX_CHILD_INDEX};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic};

/// An HD account that hands out addresses and signs the inputs it owns.
#[derive(Debug, Clone)]
pub struct HdWallet {
    keys: HdKeyManager,
}

impl HdWallet {
    pub fn new(keys: HdKeyManager) -> Self {
        Self { keys }
    }

    pub fn from_mnemonic(
        phrase: &str,
        passphrase: &str,
        path: AccountPath,
    ) -> Result<Self, WalletError> {
        Ok(Self::new(HdKeyManager::from_mnemonic(phrase, passphrase, path)?))
    }

    pub fn keys(&self) -> &HdKeyManager {
        &self.keys
    }

    pub fn network(&self) -> BtcNetwork {
        self.keys.network()
    }

    pub fn address(&self, index: u32) -> Result<String, WalletError> {
        self.keys.derive_address(index)
    }

    /// An empty transaction on this wallet's network.
    pub fn new_transaction(&self) -> HdTransaction {
        HdTransaction::new(self.network())
    }

    /// Add `input` to `tx`, signed by the key at `index`.
    pub fn add_input_at_index(
        &self,
        tx: &mut HdTransaction,
        input: InputTransaction,
        index: u32,
    ) -> Result<(), WalletError> {
        let key = self.keys.derive_key_pair(index, self.network())?;
        debug!(path = %self.keys.path(index), outpoint = %input.outpoint_key(), "input key");
        tx.add_input_with_key(input, key)?;
        Ok(())
    }
}

/// Sign a transaction whose inputs all belong to the key in `wif`, returning
/// the broadcast hex.
pub fn sign_single_key_transaction(
    wif: &str,
    inputs: &[InputTransaction],
    outputs: &[OutputTransaction],
    fee_policy: Option<FeePolicy>,
) -> Result<String, WalletError> {
    let key = KeyPair::from_wif(wif)?;
    let mut tx = SingleKeyTransaction::new(key);
    for input in inputs {
        tx.add_input(input.clone())?;
    }
    for output in outputs {
        tx.add_output(output.clone())?;
    }
    if let Some(policy) = fee_policy {
        tx.set_fee_policy(policy);
    }
    Ok(tx.raw_hex()?)
}
