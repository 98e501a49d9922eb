//! Transaction builder: collects inputs and outputs, resolves the fee, signs
//! every input (legacy or BIP143) and caches the serialized result.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{address_network, is_valid_address, normalize_address};
use crate::buffer::ByteBuffer;
use crate::codec::hex_to_bytes;
use crate::error::BtcError;
use crate::fee::{resolve_fee, FeePolicy, FeeResolution};
use crate::keypair::{KeyPair, SIGNATURE_DER_LEN};
use crate::network::BtcNetwork;
use crate::script::{address_to_script_pubkey, ScriptType};
use crate::serialize::{
    serialize, InputMaterial, SignedTransaction, TxIn, TxOut, UnsignedTx, DEFAULT_LOCKTIME,
    DEFAULT_VERSION, SIGHASH_ALL,
};
use crate::sighash::{bip143_sighash, legacy_sighash};
use crate::signer::{InputKeyMap, SignerSource, SingleKey};

/// nSequence that signals BIP125 replace-by-fee without enabling a locktime.
pub const DEFAULT_SEQUENCE: u32 = 0xffff_fffd;

/// Upper bound on any single amount: 21 million BTC in satoshis.
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

const COMPRESSED_PUBKEY_LEN: usize = 33;

fn default_sequence() -> u32 {
    DEFAULT_SEQUENCE
}

/// A previous output to spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTransaction {
    /// Previous txid in display (big-endian) hex.
    pub txid: String,
    pub vout: u32,
    /// Hex scriptPubKey of the output being spent.
    pub script_pub_key: String,
    /// Satoshis held by the output being spent.
    pub value: u64,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
}

impl InputTransaction {
    pub fn new(
        txid: impl Into<String>,
        vout: u32,
        script_pub_key: impl Into<String>,
        value: u64,
    ) -> Self {
        Self {
            txid: txid.into(),
            vout,
            script_pub_key: script_pub_key.into(),
            value,
            sequence: DEFAULT_SEQUENCE,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// `txid:vout`, txid lowercased.
    pub fn outpoint_key(&self) -> String {
        format!("{}:{}", self.txid.to_ascii_lowercase(), self.vout)
    }

    fn to_tx_in(&self) -> Result<TxIn, BtcError> {
        let txid_bytes = hex_to_bytes(&self.txid)
            .map_err(|e| BtcError::InvalidInput(format!("txid {:?}: {e}", self.txid)))?;
        let mut prev_txid: [u8; 32] = txid_bytes.try_into().map_err(|b: Vec<u8>| {
            BtcError::InvalidInput(format!("txid must be 32 bytes, got {}", b.len()))
        })?;
        prev_txid.reverse();

        if self.value > MAX_MONEY {
            return Err(BtcError::InvalidInput(format!(
                "{} holds {} sats, more than {MAX_MONEY}",
                self.outpoint_key(),
                self.value
            )));
        }
        if self.script_pub_key.is_empty() {
            return Err(BtcError::InvalidInput(format!(
                "missing scriptPubKey for {}",
                self.outpoint_key()
            )));
        }
        let script_pubkey = hex_to_bytes(&self.script_pub_key)
            .map_err(|e| BtcError::InvalidInput(format!("scriptPubKey: {e}")))?;
        match ScriptType::classify(&script_pubkey) {
            ScriptType::P2pkh | ScriptType::P2wpkh => {}
            other => {
                return Err(BtcError::InvalidInput(format!(
                    "cannot spend {other:?} scriptPubKey {}",
                    self.script_pub_key
                )))
            }
        }

        Ok(TxIn {
            prev_txid,
            prev_vout: self.vout,
            script_pubkey,
            value: self.value,
            sequence: self.sequence,
        })
    }
}

/// A payment to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTransaction {
    pub address: String,
    /// Satoshis, before any fee deduction.
    pub amount: u64,
}

impl OutputTransaction {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// An in-progress transaction whose inputs are signed by keys from `S`.
#[derive(Debug)]
pub struct Transaction<S> {
    network: BtcNetwork,
    version: u32,
    lock_time: u32,
    inputs: Vec<InputTransaction>,
    tx_inputs: Vec<TxIn>,
    outputs: Vec<OutputTransaction>,
    output_scripts: Vec<Vec<u8>>,
    fee_policy: Option<FeePolicy>,
    signer: S,
    signed: Option<SignedTransaction>,
}

/// Every input signed by the same key.
pub type SingleKeyTransaction = Transaction<SingleKey>;

/// Each input signed by its own key, usually derived from an HD wallet.
pub type HdTransaction = Transaction<InputKeyMap>;

impl Transaction<SingleKey> {
    /// A transaction on the key's network, signed entirely by `key`.
    pub fn new(key: KeyPair) -> Self {
        let network = key.network();
        Self::with_signer(SingleKey(key), network)
    }
}

impl Transaction<InputKeyMap> {
    pub fn new(network: BtcNetwork) -> Self {
        Self::with_signer(InputKeyMap::new(), network)
    }

    /// Add an input together with the key that signs it.
    pub fn add_input_with_key(
        &mut self,
        input: InputTransaction,
        key: KeyPair,
    ) -> Result<(), BtcError> {
        let outpoint = input.clone();
        self.add_input(input)?;
        self.signer.insert(&outpoint, key);
        Ok(())
    }
}

impl<S: SignerSource> Transaction<S> {
    pub fn with_signer(signer: S, network: BtcNetwork) -> Self {
        Self {
            network,
            version: DEFAULT_VERSION,
            lock_time: DEFAULT_LOCKTIME,
            inputs: Vec::new(),
            tx_inputs: Vec::new(),
            outputs: Vec::new(),
            output_scripts: Vec::new(),
            fee_policy: None,
            signer,
            signed: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self.signed = None;
        self
    }

    pub fn with_locktime(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self.signed = None;
        self
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn inputs(&self) -> &[InputTransaction] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputTransaction] {
        &self.outputs
    }

    pub fn fee_policy(&self) -> Option<&FeePolicy> {
        self.fee_policy.as_ref()
    }

    /// Append an input. Inputs are serialized in insertion order.
    pub fn add_input(&mut self, input: InputTransaction) -> Result<(), BtcError> {
        let tx_in = input.to_tx_in()?;
        if self
            .inputs
            .iter()
            .any(|i| i.txid.eq_ignore_ascii_case(&input.txid))
        {
            return Err(BtcError::DuplicateInput(input.txid));
        }

        debug!(
            outpoint = %input.outpoint_key(),
            segwit = tx_in.is_segwit(),
            value = input.value,
            "added input"
        );
        self.inputs.push(input);
        self.tx_inputs.push(tx_in);
        self.signed = None;
        Ok(())
    }

    /// Append an output paying `output.amount` to `output.address`.
    pub fn add_output(&mut self, output: OutputTransaction) -> Result<(), BtcError> {
        if output.amount == 0 {
            return Err(BtcError::InvalidAmount(format!(
                "output to {} must be positive",
                output.address
            )));
        }
        if output.amount > MAX_MONEY {
            return Err(BtcError::InvalidAmount(format!(
                "output to {} of {} sats exceeds {MAX_MONEY}",
                output.address, output.amount
            )));
        }
        if !is_valid_address(&output.address) {
            return Err(BtcError::InvalidAddress(output.address));
        }
        let network = address_network(&output.address)?;
        if network != self.network {
            return Err(BtcError::InvalidAddress(format!(
                "{} is a {network} address, transaction is on {}",
                output.address, self.network
            )));
        }
        let script = address_to_script_pubkey(&output.address)?;
        if self.output_scripts.contains(&script) {
            return Err(BtcError::DuplicateOutput(normalize_address(&output.address)));
        }

        debug!(address = %output.address, amount = output.amount, "added output");
        self.outputs.push(output);
        self.output_scripts.push(script);
        self.signed = None;
        Ok(())
    }

    pub fn set_fee_policy(&mut self, policy: FeePolicy) {
        self.fee_policy = Some(policy);
        self.signed = None;
    }

    /// Whether any input takes the segwit path.
    pub fn is_segwit(&self) -> bool {
        self.tx_inputs.iter().any(TxIn::is_segwit)
    }

    pub fn total_input_sats(&self) -> Result<u64, BtcError> {
        checked_total(self.inputs.iter().map(|i| i.value), "input")
    }

    /// Sum of the requested output amounts, before fee deductions.
    pub fn total_output_sats(&self) -> Result<u64, BtcError> {
        checked_total(self.outputs.iter().map(|o| o.amount), "output")
    }

    /// Work out the fee and per-output deductions without signing.
    ///
    /// The size is measured on a serialization with placeholder signatures
    /// of the final length, so the signed transaction has exactly this size.
    pub fn resolve_fee(&self) -> Result<FeeResolution, BtcError> {
        self.check_not_empty()?;
        let Some(policy) = &self.fee_policy else {
            return Ok(FeeResolution::none(self.outputs.len()));
        };

        let placeholders: Vec<InputMaterial> =
            self.tx_inputs.iter().map(placeholder_material).collect();
        let unsigned = self.unsigned_tx(&[]);
        let vbytes = serialize(&unsigned, &placeholders, true).vbytes();
        let resolution = resolve_fee(vbytes, policy, &self.outputs)?;

        debug!(
            vbytes,
            fee_rate = policy.fee_rate,
            fee_sats = resolution.fee_sats,
            deductions = ?resolution.deductions,
            "resolved fee"
        );
        Ok(resolution)
    }

    /// Sign every input and serialize. The result is cached until the
    /// transaction changes.
    pub fn sign(&mut self) -> Result<&SignedTransaction, BtcError> {
        let signed = match self.signed.take() {
            Some(signed) => signed,
            None => self.build_signed()?,
        };
        Ok(self.signed.insert(signed))
    }

    /// Broadcast hex of the signed transaction.
    pub fn raw_hex(&mut self) -> Result<String, BtcError> {
        Ok(self.sign()?.hex())
    }

    pub fn txid(&mut self) -> Result<String, BtcError> {
        Ok(self.sign()?.txid())
    }

    pub fn weight(&mut self) -> Result<u64, BtcError> {
        Ok(self.sign()?.weight())
    }

    pub fn vbytes(&mut self) -> Result<u64, BtcError> {
        Ok(self.sign()?.vbytes())
    }

    pub fn fee_sats(&mut self) -> Result<u64, BtcError> {
        Ok(self.sign()?.fee_sats())
    }

    /// Drop inputs, outputs, fee policy, per-input keys and the cached
    /// signed transaction. Version and locktime are kept.
    pub fn clear(&mut self) {
        debug!(
            inputs = self.inputs.len(),
            outputs = self.outputs.len(),
            "clearing transaction"
        );
        self.inputs.clear();
        self.tx_inputs.clear();
        self.outputs.clear();
        self.output_scripts.clear();
        self.fee_policy = None;
        self.signer.clear();
        self.signed = None;
    }

    fn check_not_empty(&self) -> Result<(), BtcError> {
        if self.inputs.is_empty() {
            return Err(BtcError::InvalidInput("transaction has no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(BtcError::InvalidInput("transaction has no outputs".into()));
        }
        Ok(())
    }

    /// Outputs with `deductions` applied; an empty slice deducts nothing.
    fn unsigned_tx(&self, deductions: &[u64]) -> UnsignedTx {
        let outputs = self
            .outputs
            .iter()
            .zip(&self.output_scripts)
            .enumerate()
            .map(|(i, (output, script))| TxOut {
                amount: output.amount - deductions.get(i).copied().unwrap_or(0),
                script_pubkey: script.clone(),
            })
            .collect();
        UnsignedTx {
            version: self.version,
            lock_time: self.lock_time,
            inputs: self.tx_inputs.clone(),
            outputs,
        }
    }

    fn build_signed(&self) -> Result<SignedTransaction, BtcError> {
        self.check_not_empty()?;
        let keys = self
            .inputs
            .iter()
            .map(|input| {
                self.signer
                    .signer_for(input)
                    .ok_or_else(|| BtcError::MissingSigningKey(input.outpoint_key()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fee = self.resolve_fee()?;
        let unsigned = self.unsigned_tx(&fee.deductions);

        let mut material = Vec::with_capacity(unsigned.inputs.len());
        for (index, (tx_in, key)) in unsigned.inputs.iter().zip(keys).enumerate() {
            let segwit = tx_in.is_segwit();
            let sighash = if segwit {
                bip143_sighash(&unsigned, index)?
            } else {
                legacy_sighash(&unsigned, index)?
            };
            let mut signature = key.sign(&sighash)?;
            signature.push(SIGHASH_ALL);
            let pubkey = key.public_key();

            debug!(index, segwit, "signed input");
            material.push(if segwit {
                InputMaterial::Witness(witness_stack(&signature, &pubkey))
            } else {
                InputMaterial::ScriptSig(script_sig(&signature, &pubkey))
            });
        }

        let signed = SignedTransaction::new(&unsigned, &material, fee.fee_sats);
        debug!(
            txid = %signed.txid(),
            vbytes = signed.vbytes(),
            fee_sats = fee.fee_sats,
            "transaction signed"
        );
        Ok(signed)
    }
}

/// `<len> <sig||hashtype> <len> <pubkey>`
fn script_sig(signature: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(signature.len() + pubkey.len() + 2);
    buf.append(signature)
        .prepend(&[signature.len() as u8])
        .append_u8(pubkey.len() as u8)
        .append(pubkey);
    buf.into_raw()
}

/// Two-item witness stack: signature with hashtype, then pubkey.
fn witness_stack(signature: &[u8], pubkey: &[u8]) -> Vec<u8> {
    let mut buf = ByteBuffer::with_capacity(signature.len() + pubkey.len() + 3);
    buf.append_u8(0x02)
        .append_var_bytes(signature)
        .append_var_bytes(pubkey);
    buf.into_raw()
}

/// Unlocking data of the exact signed length, used for size measurement.
fn placeholder_material(tx_in: &TxIn) -> InputMaterial {
    let signature = [0u8; SIGNATURE_DER_LEN + 1];
    let pubkey = [0u8; COMPRESSED_PUBKEY_LEN];
    if tx_in.is_segwit() {
        InputMaterial::Witness(witness_stack(&signature, &pubkey))
    } else {
        InputMaterial::ScriptSig(script_sig(&signature, &pubkey))
    }
}

fn checked_total(mut amounts: impl Iterator<Item = u64>, what: &str) -> Result<u64, BtcError> {
    amounts.try_fold(0u64, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| BtcError::InvalidAmount(format!("{what} total overflows")))
    })
}
