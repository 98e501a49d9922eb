use thiserror::Error;

/// Bitcoin codec, key and transaction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BtcError {
    #[error("format error: {0}")]
    Format(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate input: {0}")]
    DuplicateInput(String),

    #[error("duplicate output: {0}")]
    DuplicateOutput(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),

    #[error("missing signing key for input {0}")]
    MissingSigningKey(String),

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("fee payer {0} is not among the outputs")]
    FeePayerNotFound(String),
}
