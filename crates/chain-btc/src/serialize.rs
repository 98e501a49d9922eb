//! Raw transaction layout: the broadcast form (with segwit marker, flag and
//! witness stacks) and the txid form (without them).

use crypto_utils::hash256;

use crate::buffer::ByteBuffer;
use crate::script::ScriptType;

/// SIGHASH_ALL, the only hash type this crate signs with.
pub const SIGHASH_ALL: u8 = 0x01;

pub const DEFAULT_VERSION: u32 = 2;
pub const DEFAULT_LOCKTIME: u32 = 0;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// An input as it is committed to by sighashes and serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Previous txid in internal (little-endian) byte order.
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    /// scriptPubKey of the output being spent.
    pub script_pubkey: Vec<u8>,
    /// Value of the output being spent, in satoshis.
    pub value: u64,
    pub sequence: u32,
}

impl TxIn {
    pub fn is_segwit(&self) -> bool {
        ScriptType::classify(&self.script_pubkey).is_segwit()
    }

    /// 36-byte outpoint: txid (internal order) ++ vout (LE).
    pub fn outpoint(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.prev_txid);
        out[32..].copy_from_slice(&self.prev_vout.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

/// Everything a signature commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl UnsignedTx {
    pub fn has_segwit_inputs(&self) -> bool {
        self.inputs.iter().any(TxIn::is_segwit)
    }

    /// All outputs serialized back to back (amount LE ++ var-length script).
    pub fn serialized_outputs(&self) -> Vec<u8> {
        let mut buf = ByteBuffer::with_capacity(self.outputs.len() * 34);
        for out in &self.outputs {
            buf.append_u64_le(out.amount)
                .append_var_bytes(&out.script_pubkey);
        }
        buf.into_raw()
    }
}

/// Unlocking data for one input: a scriptSig for legacy inputs, a serialized
/// witness stack for segwit inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMaterial {
    ScriptSig(Vec<u8>),
    Witness(Vec<u8>),
}

/// The two byte streams of a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    raw: Vec<u8>,
    txid_form: Vec<u8>,
    witness_bytes: usize,
    fee_sats: u64,
}

impl SignedTransaction {
    pub(crate) fn new(tx: &UnsignedTx, material: &[InputMaterial], fee_sats: u64) -> Self {
        let full = serialize(tx, material, true);
        let txid_form = serialize(tx, material, false);
        Self {
            raw: full.bytes,
            txid_form: txid_form.bytes,
            witness_bytes: full.witness_bytes,
            fee_sats,
        }
    }

    /// Broadcast serialization.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.raw)
    }

    /// Serialization without marker, flag and witnesses.
    pub fn txid_form(&self) -> &[u8] {
        &self.txid_form
    }

    /// Transaction id in display (big-endian) order.
    pub fn txid(&self) -> String {
        display_hash(&self.txid_form)
    }

    /// Witness transaction id in display order; equals the txid when there
    /// is no witness data.
    pub fn wtxid(&self) -> String {
        display_hash(&self.raw)
    }

    pub fn is_segwit(&self) -> bool {
        self.witness_bytes > 0
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Bytes belonging to marker, flag and witness stacks.
    pub fn witness_bytes(&self) -> usize {
        self.witness_bytes
    }

    /// BIP141 weight: non-witness bytes count four times.
    pub fn weight(&self) -> u64 {
        weight(self.raw.len(), self.witness_bytes)
    }

    /// Virtual size, `ceil(weight / 4)`.
    pub fn vbytes(&self) -> u64 {
        self.weight().div_ceil(4)
    }

    /// Fee resolved for this transaction, zero when no fee policy was set.
    pub fn fee_sats(&self) -> u64 {
        self.fee_sats
    }
}

pub(crate) struct Serialized {
    pub bytes: Vec<u8>,
    pub witness_bytes: usize,
}

impl Serialized {
    pub fn vbytes(&self) -> u64 {
        weight(self.bytes.len(), self.witness_bytes).div_ceil(4)
    }
}

fn weight(total: usize, witness: usize) -> u64 {
    ((total - witness) * 4 + witness) as u64
}

/// Serialize `tx` with its unlocking `material` (one entry per input).
///
/// With `with_witness` unset, or with no segwit input, the marker, flag and
/// witness section are left out entirely.
pub(crate) fn serialize(tx: &UnsignedTx, material: &[InputMaterial], with_witness: bool) -> Serialized {
    let segwit = with_witness && tx.has_segwit_inputs();
    let mut buf = ByteBuffer::with_capacity(256);
    let mut witness_bytes = 0usize;

    buf.append_u32_le(tx.version);
    if segwit {
        buf.append_u8(SEGWIT_MARKER).append_u8(SEGWIT_FLAG);
        witness_bytes += 2;
    }

    buf.append_varint(tx.inputs.len() as u64);
    for (inp, mat) in tx.inputs.iter().zip(material) {
        buf.append(&inp.prev_txid).append_u32_le(inp.prev_vout);
        match mat {
            InputMaterial::ScriptSig(script_sig) => buf.append_var_bytes(script_sig),
            InputMaterial::Witness(_) => buf.append_u8(0x00),
        };
        buf.append_u32_le(inp.sequence);
    }

    buf.append_varint(tx.outputs.len() as u64);
    buf.append(&tx.serialized_outputs());

    if segwit {
        for mat in material {
            match mat {
                InputMaterial::Witness(stack) => {
                    buf.append(stack);
                    witness_bytes += stack.len();
                }
                InputMaterial::ScriptSig(_) => {
                    buf.append_u8(0x00);
                    witness_bytes += 1;
                }
            }
        }
    }

    buf.append_u32_le(tx.lock_time);
    Serialized {
        bytes: buf.into_raw(),
        witness_bytes,
    }
}

fn display_hash(data: &[u8]) -> String {
    let mut hash = hash256(data);
    hash.reverse();
    hex::encode(hash)
}
