//! Signature hash preimages: the legacy algorithm and BIP143 for segwit v0.

use crypto_utils::hash256;

use crate::buffer::ByteBuffer;
use crate::error::BtcError;
use crate::script::script_pubkey_to_script_code;
use crate::serialize::{UnsignedTx, SIGHASH_ALL};

fn check_index(tx: &UnsignedTx, input_index: usize) -> Result<(), BtcError> {
    if input_index >= tx.inputs.len() {
        return Err(BtcError::SigningError(format!(
            "input index {input_index} out of bounds ({} inputs)",
            tx.inputs.len()
        )));
    }
    Ok(())
}

/// Legacy SIGHASH_ALL preimage for `input_index`.
///
/// Every input is serialized, but only the one being signed carries its
/// scriptPubKey; the others get an empty script.
pub fn legacy_preimage(tx: &UnsignedTx, input_index: usize) -> Result<Vec<u8>, BtcError> {
    check_index(tx, input_index)?;

    let mut buf = ByteBuffer::with_capacity(128 + tx.inputs.len() * 41);
    buf.append_u32_le(tx.version)
        .append_varint(tx.inputs.len() as u64);
    for (i, inp) in tx.inputs.iter().enumerate() {
        buf.append(&inp.outpoint());
        if i == input_index {
            buf.append_var_bytes(&inp.script_pubkey);
        } else {
            buf.append_u8(0x00);
        }
        buf.append_u32_le(inp.sequence);
    }
    buf.append_varint(tx.outputs.len() as u64)
        .append(&tx.serialized_outputs())
        .append_u32_le(tx.lock_time)
        .append_u32_le(SIGHASH_ALL as u32);
    Ok(buf.into_raw())
}

pub fn legacy_sighash(tx: &UnsignedTx, input_index: usize) -> Result<[u8; 32], BtcError> {
    Ok(hash256(&legacy_preimage(tx, input_index)?))
}

/// BIP143 hashPrevouts.
pub fn hash_prevouts(tx: &UnsignedTx) -> [u8; 32] {
    let mut buf = ByteBuffer::with_capacity(tx.inputs.len() * 36);
    for inp in &tx.inputs {
        buf.append(&inp.outpoint());
    }
    hash256(&buf.into_raw())
}

/// BIP143 hashSequence.
pub fn hash_sequence(tx: &UnsignedTx) -> [u8; 32] {
    let mut buf = ByteBuffer::with_capacity(tx.inputs.len() * 4);
    for inp in &tx.inputs {
        buf.append_u32_le(inp.sequence);
    }
    hash256(&buf.into_raw())
}

/// BIP143 hashOutputs.
pub fn hash_outputs(tx: &UnsignedTx) -> [u8; 32] {
    hash256(&tx.serialized_outputs())
}

/// BIP143 SIGHASH_ALL preimage for a P2WPKH input.
pub fn bip143_preimage(tx: &UnsignedTx, input_index: usize) -> Result<Vec<u8>, BtcError> {
    check_index(tx, input_index)?;
    let inp = &tx.inputs[input_index];
    let script_code = script_pubkey_to_script_code(&inp.script_pubkey)?;

    let mut buf = ByteBuffer::with_capacity(156 + script_code.len());
    buf.append_u32_le(tx.version)
        .append(&hash_prevouts(tx))
        .append(&hash_sequence(tx))
        .append(&inp.outpoint())
        .append(&script_code)
        .append_u64_le(inp.value)
        .append_u32_le(inp.sequence)
        .append(&hash_outputs(tx))
        .append_u32_le(tx.lock_time)
        .append_u32_le(SIGHASH_ALL as u32);
    Ok(buf.into_raw())
}

pub fn bip143_sighash(tx: &UnsignedTx, input_index: usize) -> Result<[u8; 32], BtcError> {
    Ok(hash256(&bip143_preimage(tx, input_index)?))
}
