//! Bitcoin transaction construction and signing.
//!
//! Encodes and decodes Base58Check and bech32/bech32m addresses, maps them to
//! scriptPubKeys, signs P2PKH inputs with the legacy sighash and P2WPKH inputs
//! with BIP143, and serializes the result in the network wire format.

pub mod address;
pub mod base58;
pub mod bech32;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod fee;
pub mod keypair;
pub mod network;
pub mod script;
pub mod serialize;
pub mod sighash;
pub mod signer;
pub mod transaction;

pub use address::{normalize_address, AddressType};
pub use error::BtcError;
pub use fee::{FeePayer, FeePolicy, FeeResolution};
pub use keypair::KeyPair;
pub use network::{BtcNetwork, NetworkParams};
pub use serialize::SignedTransaction;
pub use signer::{InputKeyMap, SignerSource, SingleKey};
pub use transaction::{
    HdTransaction, InputTransaction, OutputTransaction, SingleKeyTransaction, Transaction,
    MAX_MONEY,
};
