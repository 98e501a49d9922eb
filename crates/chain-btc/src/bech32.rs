//! Bech32 (BIP173) and Bech32m (BIP350) segwit address encoding.
//!
//! Witness version 0 uses the bech32 checksum constant, versions 1..=16 use
//! bech32m.

use crate::error::BtcError;
use crate::network::BtcNetwork;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

const MAX_LENGTH: usize = 90;
const CHECKSUM_LENGTH: usize = 6;

/// Checksum flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Bech32,
    Bech32m,
}

impl Variant {
    fn constant(self) -> u32 {
        match self {
            Variant::Bech32 => 1,
            Variant::Bech32m => 0x2bc830a3,
        }
    }

    /// Checksum variant mandated for a witness version.
    pub fn for_witness_version(version: u8) -> Self {
        if version == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }
}

/// A decoded segwit address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessProgram {
    pub hrp: String,
    pub version: u8,
    pub program: Vec<u8>,
}

/// BCH checksum over 5-bit groups.
pub fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ v as u32;
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

/// High 3 bits of every HRP character, a zero separator, then the low 5 bits.
pub fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

/// Six 5-bit checksum groups for `hrp` and `data`.
pub fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LENGTH] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LENGTH]);
    let pm = polymod(&values) ^ variant.constant();

    let mut checksum = [0u8; CHECKSUM_LENGTH];
    for (i, c) in checksum.iter_mut().enumerate() {
        *c = ((pm >> (5 * (5 - i))) & 0x1f) as u8;
    }
    checksum
}

/// Which variant, if any, `data` (including its checksum) verifies under.
pub fn verify_checksum(hrp: &str, data: &[u8]) -> Option<Variant> {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    match polymod(&values) {
        c if c == Variant::Bech32.constant() => Some(Variant::Bech32),
        c if c == Variant::Bech32m.constant() => Some(Variant::Bech32m),
        _ => None,
    }
}

/// Regroup bits, e.g. 8-bit bytes into 5-bit groups.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, BtcError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max_value: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let v = value as u32;
        if v >> from != 0 {
            return Err(BtcError::Format(format!("value {v} exceeds {from} bits")));
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & max_value) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & max_value) != 0 {
        return Err(BtcError::Format("invalid padding in bit conversion".into()));
    }
    Ok(out)
}

/// Witness version followed by the program regrouped into 5-bit values.
pub fn convert(program: &[u8], version: u8) -> Result<Vec<u8>, BtcError> {
    let mut data = Vec::with_capacity(1 + (program.len() * 8 + 4) / 5);
    data.push(version);
    data.extend(convert_bits(program, 8, 5, true)?);
    Ok(data)
}

/// Encode a witness program as a segwit address.
pub fn encode(hrp: &str, version: u8, program: &[u8]) -> Result<String, BtcError> {
    if version > 16 {
        return Err(BtcError::Format(format!("witness version {version} out of range")));
    }
    let data = convert(program, version)?;
    let checksum = create_checksum(hrp, &data, Variant::for_witness_version(version));

    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
    out.push_str(hrp);
    out.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[d as usize] as char);
    }
    Ok(out)
}

/// Version-0 address for a 20-byte key hash (P2WPKH) or 32-byte script hash (P2WSH).
pub fn get_address(hash: &[u8], network: BtcNetwork) -> Result<String, BtcError> {
    encode(network.params().bech32_hrp, 0, hash)
}

/// Split and checksum-verify a bech32 string.
///
/// Returns the lower-cased HRP, the 5-bit data groups without the checksum
/// (version group first), and the checksum variant.
pub fn decode(text: &str) -> Result<(String, Vec<u8>, Variant), BtcError> {
    if text.len() > MAX_LENGTH {
        return Err(BtcError::Format(format!(
            "bech32 string longer than {MAX_LENGTH} characters"
        )));
    }
    let has_lower = text.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = text.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(BtcError::Format("mixed-case bech32 string".into()));
    }

    let lower = text.to_ascii_lowercase();
    let pos = lower
        .rfind('1')
        .ok_or_else(|| BtcError::Format("bech32 separator not found".into()))?;
    if pos < 1 || pos + CHECKSUM_LENGTH + 1 > lower.len() {
        return Err(BtcError::Format(format!("bech32 separator at invalid position {pos}")));
    }

    let hrp = &lower[..pos];
    if hrp.bytes().any(|b| !(33..=126).contains(&b)) {
        return Err(BtcError::Format("invalid character in bech32 hrp".into()));
    }

    let mut data = lower[pos + 1..]
        .bytes()
        .map(|c| {
            CHARSET
                .iter()
                .position(|&x| x == c)
                .map(|p| p as u8)
                .ok_or_else(|| BtcError::Format(format!("invalid bech32 character {:?}", c as char)))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let variant = verify_checksum(hrp, &data)
        .ok_or_else(|| BtcError::Format("invalid bech32 checksum".into()))?;
    data.truncate(data.len() - CHECKSUM_LENGTH);
    Ok((hrp.to_string(), data, variant))
}

/// Decode and validate a segwit address.
pub fn decode_address(address: &str) -> Result<WitnessProgram, BtcError> {
    let (hrp, data, variant) = decode(address)?;
    let (&version, program5) = data
        .split_first()
        .ok_or_else(|| BtcError::Format("bech32 data has no witness version".into()))?;
    if version > 16 {
        return Err(BtcError::Format(format!("witness version {version} out of range")));
    }
    if variant != Variant::for_witness_version(version) {
        return Err(BtcError::Format(format!(
            "witness version {version} requires {:?} checksum",
            Variant::for_witness_version(version)
        )));
    }

    let program = convert_bits(program5, 5, 8, false)?;
    if !(2..=40).contains(&program.len()) {
        return Err(BtcError::Format(format!(
            "witness program length {} out of range",
            program.len()
        )));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(BtcError::Format(format!(
            "version 0 witness program must be 20 or 32 bytes, got {}",
            program.len()
        )));
    }
    Ok(WitnessProgram {
        hrp,
        version,
        program,
    })
}

impl WitnessProgram {
    /// `OP_n <len> <program>`
    pub fn script_pubkey(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(2 + self.program.len());
        script.push(if self.version == 0 { 0x00 } else { 0x50 + self.version });
        script.push(self.program.len() as u8);
        script.extend_from_slice(&self.program);
        script
    }
}

/// scriptPubKey of a segwit address.
pub fn get_script_pubkey(address: &str) -> Result<Vec<u8>, BtcError> {
    Ok(decode_address(address)?.script_pubkey())
}
