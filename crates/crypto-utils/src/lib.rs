//! # crypto-utils
//!
//! Hashing and secure random generation primitives shared by the Bitcoin
//! codec, key and transaction crates.

pub mod hash;
pub mod random;

pub use hash::{checksum, hash160, hash256, ripemd160, sha256};
