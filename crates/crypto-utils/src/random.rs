use rand::RngCore;
use rand_core::OsRng;

/// Generates a fixed-size array of cryptographically secure random bytes.
///
/// Used for fresh private keys.
pub fn random_bytes_fixed<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}
