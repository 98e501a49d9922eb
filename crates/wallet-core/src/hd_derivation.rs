use std::fmt;
use std::str::FromStr;

use bip32::{ChildNumber, Prefix, XPrv, XPub};
use chain_btc::{AddressType, BtcNetwork, KeyPair};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::mnemonic::mnemonic_to_seed;

/// Largest non-hardened child index.
pub const MAX_CHILD_INDEX: u32 = (1 << 31) - 1;

/// BIP-44 purpose level, which also fixes the address format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// m/44' legacy P2PKH
    Bip44,
    /// m/84' native segwit P2WPKH
    Bip84,
}

impl Purpose {
    pub fn value(self) -> u32 {
        match self {
            Purpose::Bip44 => 44,
            Purpose::Bip84 => 84,
        }
    }

    pub fn address_type(self) -> AddressType {
        match self {
            Purpose::Bip44 => AddressType::P2pkh,
            Purpose::Bip84 => AddressType::P2wpkh,
        }
    }
}

/// `m/purpose'/coin_type'/account'/change`, everything above the index.
///
/// The coin type comes from the network: 0 on mainnet, 1 on testnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPath {
    pub purpose: Purpose,
    pub network: BtcNetwork,
    #[serde(default)]
    pub account: u32,
    #[serde(default)]
    pub change: u32,
}

impl AccountPath {
    pub fn new(purpose: Purpose, network: BtcNetwork) -> Self {
        Self {
            purpose,
            network,
            account: 0,
            change: 0,
        }
    }

    pub fn bip44(network: BtcNetwork) -> Self {
        Self::new(Purpose::Bip44, network)
    }

    pub fn bip84(network: BtcNetwork) -> Self {
        Self::new(Purpose::Bip84, network)
    }

    pub fn with_account(mut self, account: u32) -> Self {
        self.account = account;
        self
    }

    /// 0 for receiving addresses, 1 for change.
    pub fn with_change(mut self, change: u32) -> Self {
        self.change = change;
        self
    }

    pub fn coin_type(&self) -> u32 {
        self.network.params().coin_type
    }

    fn hardened_levels(&self) -> [u32; 3] {
        [self.purpose.value(), self.coin_type(), self.account]
    }
}

impl fmt::Display for AccountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{}'/{}'/{}'/{}",
            self.purpose.value(),
            self.coin_type(),
            self.account,
            self.change
        )
    }
}

#[derive(Clone)]
enum ExtendedKey {
    Private(XPrv),
    Public(XPub),
}

impl ExtendedKey {
    fn derive(&self, index: u32) -> Result<Self, WalletError> {
        let child = ChildNumber::new(index, false)?;
        Ok(match self {
            ExtendedKey::Private(xprv) => ExtendedKey::Private(xprv.derive_child(child)?),
            ExtendedKey::Public(xpub) => ExtendedKey::Public(xpub.derive_child(child)?),
        })
    }

    fn public_key(&self) -> [u8; 33] {
        match self {
            ExtendedKey::Private(xprv) => xprv.public_key().to_bytes(),
            ExtendedKey::Public(xpub) => xpub.to_bytes(),
        }
    }
}

/// An HD node at the account level of a BIP-44 style path.
///
/// Holds the account key (private, or public only for watch-only nodes) and
/// the external/internal chain key below it. Deriving index `i` is a single
/// non-hardened step from the chain key.
#[derive(Clone)]
pub struct HdKeyManager {
    path: AccountPath,
    account: ExtendedKey,
    chain: ExtendedKey,
}

impl fmt::Debug for HdKeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKeyManager")
            .field("path", &self.path.to_string())
            .field("watch_only", &self.is_watch_only())
            .finish()
    }
}

impl HdKeyManager {
    /// Master key from a BIP-39 seed (16 to 64 bytes), then the full path.
    pub fn from_seed(seed: &[u8], path: AccountPath) -> Result<Self, WalletError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(WalletError::InvalidSeed(format!(
                "expected 16..=64 bytes, got {}",
                seed.len()
            )));
        }
        let master = XPrv::new(seed).map_err(|e| WalletError::InvalidSeed(e.to_string()))?;
        Self::from_master(master, path)
    }

    pub fn from_mnemonic(
        phrase: &str,
        passphrase: &str,
        path: AccountPath,
    ) -> Result<Self, WalletError> {
        let seed = mnemonic_to_seed(phrase, passphrase)?;
        Self::from_seed(&*seed, path)
    }

    /// A depth-0 key is a master and gets the full path; anything deeper is
    /// taken as the account key itself.
    pub fn from_xprv(xprv: &str, path: AccountPath) -> Result<Self, WalletError> {
        let key =
            XPrv::from_str(xprv).map_err(|e| WalletError::InvalidExtendedKey(e.to_string()))?;
        if key.attrs().depth == 0 {
            Self::from_master(key, path)
        } else {
            Self::from_account(ExtendedKey::Private(key), path)
        }
    }

    /// Watch-only node from an account-level xpub. A master xpub cannot
    /// reach the hardened account level and is rejected.
    pub fn from_xpub(xpub: &str, path: AccountPath) -> Result<Self, WalletError> {
        let key =
            XPub::from_str(xpub).map_err(|e| WalletError::InvalidExtendedKey(e.to_string()))?;
        if key.attrs().depth == 0 {
            return Err(WalletError::InvalidExtendedKey(
                "master xpub cannot derive hardened account levels".into(),
            ));
        }
        Self::from_account(ExtendedKey::Public(key), path)
    }

    fn from_master(master: XPrv, path: AccountPath) -> Result<Self, WalletError> {
        let mut key = master;
        for level in path.hardened_levels() {
            key = key.derive_child(ChildNumber::new(level, true)?)?;
        }
        Self::from_account(ExtendedKey::Private(key), path)
    }

    fn from_account(account: ExtendedKey, path: AccountPath) -> Result<Self, WalletError> {
        let chain = account.derive(path.change)?;
        let node = Self {
            path,
            account,
            chain,
        };
        debug!(path = %node.path, watch_only = node.is_watch_only(), "hd node ready");
        Ok(node)
    }

    pub fn account_path(&self) -> &AccountPath {
        &self.path
    }

    pub fn network(&self) -> BtcNetwork {
        self.path.network
    }

    pub fn is_watch_only(&self) -> bool {
        matches!(self.account, ExtendedKey::Public(_))
    }

    /// Full derivation path of `index`, e.g. `m/84'/0'/0'/0/5`.
    pub fn path(&self, index: u32) -> String {
        format!("{}/{}", self.path, index)
    }

    /// Account-level extended public key (`xpub`/`tpub`).
    pub fn account_xpub(&self) -> String {
        let prefix = match self.path.network {
            BtcNetwork::Mainnet => Prefix::XPUB,
            BtcNetwork::Testnet => Prefix::TPUB,
        };
        let xpub = match &self.account {
            ExtendedKey::Private(xprv) => xprv.public_key(),
            ExtendedKey::Public(xpub) => xpub.clone(),
        };
        xpub.to_string(prefix)
    }

    fn derive(&self, index: u32) -> Result<ExtendedKey, WalletError> {
        if index > MAX_CHILD_INDEX {
            return Err(WalletError::DerivationFailed(format!(
                "index {index} is outside 0..={MAX_CHILD_INDEX}"
            )));
        }
        self.chain.derive(index)
    }

    pub fn derive_private_key(&self, index: u32) -> Result<Zeroizing<[u8; 32]>, WalletError> {
        match self.derive(index)? {
            ExtendedKey::Private(xprv) => Ok(Zeroizing::new(xprv.to_bytes())),
            ExtendedKey::Public(_) => Err(WalletError::WatchOnly("derive private keys".into())),
        }
    }

    /// Compressed public key at `index`; works on watch-only nodes.
    pub fn derive_public_key(&self, index: u32) -> Result<[u8; 33], WalletError> {
        Ok(self.derive(index)?.public_key())
    }

    pub fn derive_key_pair(&self, index: u32, network: BtcNetwork) -> Result<KeyPair, WalletError> {
        let private_key = self.derive_private_key(index)?;
        Ok(KeyPair::from_private_key(&*private_key, network)?)
    }

    /// Private keys for indices `0..count`, all or nothing.
    pub fn derive_multiple_private_keys(
        &self,
        count: u32,
    ) -> Result<Vec<Zeroizing<[u8; 32]>>, WalletError> {
        (0..count).map(|i| self.derive_private_key(i)).collect()
    }

    /// Address at `index` in the format the purpose implies.
    pub fn derive_address(&self, index: u32) -> Result<String, WalletError> {
        let pubkey = self.derive_public_key(index)?;
        Ok(chain_btc::address::pubkey_to_address(
            &pubkey,
            self.path.purpose.address_type(),
            self.path.network,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn bip84() -> HdKeyManager {
        HdKeyManager::from_mnemonic(ABANDON, "", AccountPath::bip84(BtcNetwork::Mainnet)).unwrap()
    }

    #[test]
    fn bip84_vectors() {
        let node = bip84();
        assert_eq!(
            node.derive_address(0).unwrap(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
        assert_eq!(
            node.derive_address(1).unwrap(),
            "bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g"
        );
        assert_eq!(
            hex::encode(node.derive_public_key(0).unwrap()),
            "0330d54fd0dd420a6e5f8d3624f5f3482cae350f79d5f0753bf5beef9c2d91af3c"
        );
        let kp = node.derive_key_pair(0, BtcNetwork::Mainnet).unwrap();
        assert_eq!(
            kp.wif_compressed().as_str(),
            "KyZpNDKnfs94vbrwhJneDi77V6jF64PWPF8x5cdJb8ifgg2DUc9d"
        );
    }

    #[test]
    fn bip84_change_chain() {
        let path = AccountPath::bip84(BtcNetwork::Mainnet).with_change(1);
        let node = HdKeyManager::from_mnemonic(ABANDON, "", path).unwrap();
        assert_eq!(
            node.derive_address(0).unwrap(),
            "bc1q8c6fshw2dlwun7ekn9qwf37cu2rn755upcp6el"
        );
        assert_eq!(node.path(0), "m/84'/0'/0'/1/0");
    }

    #[test]
    fn bip44_vector() {
        let node =
            HdKeyManager::from_mnemonic(ABANDON, "", AccountPath::bip44(BtcNetwork::Mainnet))
                .unwrap();
        assert_eq!(
            node.derive_address(0).unwrap(),
            "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA"
        );
        assert_eq!(node.path(7), "m/44'/0'/0'/0/7");
    }

    #[test]
    fn testnet_uses_coin_type_one() {
        let node =
            HdKeyManager::from_mnemonic(ABANDON, "", AccountPath::bip84(BtcNetwork::Testnet))
                .unwrap();
        assert_eq!(node.path(0), "m/84'/1'/0'/0/0");
        assert!(node.derive_address(0).unwrap().starts_with("tb1q"));
        assert!(node.account_xpub().starts_with("tpub"));
    }

    #[test]
    fn derivation_is_deterministic_and_distinct() {
        let a = bip84();
        let b = bip84();
        assert_eq!(*a.derive_private_key(3).unwrap(), *b.derive_private_key(3).unwrap());
        assert_ne!(*a.derive_private_key(0).unwrap(), *a.derive_private_key(1).unwrap());

        let other_account = HdKeyManager::from_mnemonic(
            ABANDON,
            "",
            AccountPath::bip84(BtcNetwork::Mainnet).with_account(1),
        )
        .unwrap();
        assert_ne!(
            *a.derive_private_key(0).unwrap(),
            *other_account.derive_private_key(0).unwrap()
        );
    }

    #[test]
    fn index_range_is_enforced() {
        let node = bip84();
        assert!(node.derive_private_key(MAX_CHILD_INDEX).is_ok());
        assert!(matches!(
            node.derive_private_key(MAX_CHILD_INDEX + 1),
            Err(WalletError::DerivationFailed(_))
        ));
        assert!(node.derive_public_key(u32::MAX).is_err());
    }

    #[test]
    fn multiple_keys_match_single_derivation() {
        let node = bip84();
        let keys = node.derive_multiple_private_keys(4).unwrap();
        assert_eq!(keys.len(), 4);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(**key, *node.derive_private_key(i as u32).unwrap());
        }
        assert!(node.derive_multiple_private_keys(0).unwrap().is_empty());
    }

    #[test]
    fn watch_only_from_account_xpub() {
        let full = bip84();
        let xpub = full.account_xpub();
        assert!(xpub.starts_with("xpub"));

        let watch = HdKeyManager::from_xpub(&xpub, AccountPath::bip84(BtcNetwork::Mainnet)).unwrap();
        assert!(watch.is_watch_only());
        assert!(!full.is_watch_only());
        for i in 0..3 {
            assert_eq!(watch.derive_address(i).unwrap(), full.derive_address(i).unwrap());
        }
        assert!(matches!(
            watch.derive_private_key(0),
            Err(WalletError::WatchOnly(_))
        ));
        assert!(watch.derive_multiple_private_keys(2).is_err());
        assert!(watch.derive_key_pair(0, BtcNetwork::Mainnet).is_err());
    }

    #[test]
    fn master_xpub_is_rejected() {
        let seed = mnemonic_to_seed(ABANDON, "").unwrap();
        let master = XPrv::new(&*seed).unwrap();
        let master_xpub = master.public_key().to_string(Prefix::XPUB);
        assert!(matches!(
            HdKeyManager::from_xpub(&master_xpub, AccountPath::bip84(BtcNetwork::Mainnet)),
            Err(WalletError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn xprv_master_and_account_levels() {
        let seed = mnemonic_to_seed(ABANDON, "").unwrap();
        let master = XPrv::new(&*seed).unwrap();
        let path = AccountPath::bip84(BtcNetwork::Mainnet);

        let from_master = HdKeyManager::from_xprv(&master.to_string(Prefix::XPRV), path).unwrap();
        assert_eq!(
            from_master.derive_address(0).unwrap(),
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );

        let mut account = master;
        for level in [84, 0, 0] {
            account = account.derive_child(ChildNumber::new(level, true).unwrap()).unwrap();
        }
        let from_account =
            HdKeyManager::from_xprv(&account.to_string(Prefix::XPRV), path).unwrap();
        assert_eq!(
            from_account.derive_address(0).unwrap(),
            from_master.derive_address(0).unwrap()
        );
        assert_eq!(from_account.account_xpub(), from_master.account_xpub());

        assert!(matches!(
            HdKeyManager::from_xprv("xprvnotakey", path),
            Err(WalletError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn seed_length_is_checked() {
        let path = AccountPath::bip84(BtcNetwork::Mainnet);
        assert!(matches!(
            HdKeyManager::from_seed(&[7u8; 8], path),
            Err(WalletError::InvalidSeed(_))
        ));
        assert!(HdKeyManager::from_seed(&[7u8; 32], path).is_ok());
    }

    #[test]
    fn account_path_from_json() {
        let path: AccountPath =
            serde_json::from_str(r#"{"purpose":"bip44","network":"testnet","account":2}"#)
                .unwrap();
        assert_eq!(path.to_string(), "m/44'/1'/2'/0");
    }

    #[test]
    fn debug_hides_key_material() {
        let debug = format!("{:?}", bip84());
        assert!(debug.contains("m/84'/0'/0'/0"));
        assert!(!debug.contains("xprv"));
    }
}
