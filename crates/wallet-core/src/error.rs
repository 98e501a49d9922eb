use chain_btc::BtcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Key derivation failed: watch-only node cannot {0}")]
    WatchOnly(String),

    #[error("Bitcoin: {0}")]
    Btc(BtcError),
}

impl From<BtcError> for WalletError {
    fn from(e: BtcError) -> Self {
        WalletError::Btc(e)
    }
}

impl From<bip32::Error> for WalletError {
    fn from(e: bip32::Error) -> Self {
        WalletError::DerivationFailed(e.to_string())
    }
}
