use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Bitcoin's double SHA-256: `SHA256(SHA256(data))`.
///
/// Used for txids, sighash digests and Base58Check checksums.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// RIPEMD-160, optionally over the SHA-256 of the input.
///
/// With `is_address_hash` set this is the Hash160 used for P2PKH and P2WPKH
/// public key hashes; without it the data is hashed directly.
pub fn ripemd160(data: &[u8], is_address_hash: bool) -> [u8; 20] {
    if is_address_hash {
        Ripemd160::digest(Sha256::digest(data)).into()
    } else {
        Ripemd160::digest(data).into()
    }
}

/// Hash160 (RIPEMD-160(SHA-256(data))).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(data, true)
}

/// First 4 bytes of `hash256(data)`.
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = hash256(data);
    [hash[0], hash[1], hash[2], hash[3]]
}
