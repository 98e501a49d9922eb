//! Fee policy and its resolution into per-output deductions.

use serde::{Deserialize, Serialize};

use crate::address::normalize_address;
use crate::error::BtcError;
use crate::transaction::OutputTransaction;

/// Who the fee is taken from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePayer {
    /// Split evenly across all outputs, rounding each share up.
    #[default]
    Everyone,
    /// The first output paying to this address covers the whole fee.
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Satoshis per virtual byte.
    pub fee_rate: u64,
    #[serde(default)]
    pub payer: FeePayer,
}

impl FeePolicy {
    pub fn everyone(fee_rate: u64) -> Self {
        Self {
            fee_rate,
            payer: FeePayer::Everyone,
        }
    }

    pub fn paid_by(fee_rate: u64, address: impl Into<String>) -> Self {
        Self {
            fee_rate,
            payer: FeePayer::Address(address.into()),
        }
    }
}

/// The fee and how much each output gives up for it, indexed like the outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeResolution {
    pub fee_sats: u64,
    pub deductions: Vec<u64>,
}

impl FeeResolution {
    pub fn none(outputs: usize) -> Self {
        Self {
            fee_sats: 0,
            deductions: vec![0; outputs],
        }
    }

    /// Sum of all deductions; at least `fee_sats` since even splits round up.
    pub fn total_deducted(&self) -> u64 {
        self.deductions.iter().sum()
    }
}

/// Resolve `policy` for a transaction of `vbytes` virtual bytes.
///
/// A lone output always pays the whole fee. Otherwise the payer decides:
/// `Everyone` takes `ceil(fee / n)` from each output, an address takes the
/// whole fee from its first matching output. Fails when the payer address is
/// not among the outputs or when a deduction would leave an output with
/// nothing.
pub fn resolve_fee(
    vbytes: u64,
    policy: &FeePolicy,
    outputs: &[OutputTransaction],
) -> Result<FeeResolution, BtcError> {
    if outputs.is_empty() {
        return Err(BtcError::InvalidInput("no outputs to pay the fee from".into()));
    }
    let fee_sats = vbytes.checked_mul(policy.fee_rate).ok_or_else(|| {
        BtcError::InvalidAmount(format!("fee overflows: {vbytes} vB at {} sat/vB", policy.fee_rate))
    })?;

    let mut deductions = vec![0u64; outputs.len()];
    if outputs.len() == 1 {
        deductions[0] = fee_sats;
    } else {
        match &policy.payer {
            FeePayer::Everyone => {
                let share = fee_sats.div_ceil(outputs.len() as u64);
                deductions.iter_mut().for_each(|d| *d = share);
            }
            FeePayer::Address(address) => {
                let payer = normalize_address(address);
                let index = outputs
                    .iter()
                    .position(|o| normalize_address(&o.address) == payer)
                    .ok_or_else(|| BtcError::FeePayerNotFound(address.clone()))?;
                deductions[index] = fee_sats;
            }
        }
    }

    for (output, deduction) in outputs.iter().zip(&deductions) {
        if *deduction >= output.amount {
            return Err(BtcError::InvalidAmount(format!(
                "fee share {deduction} leaves nothing of {} sats to {}",
                output.amount, output.address
            )));
        }
    }

    Ok(FeeResolution {
        fee_sats,
        deductions,
    })
}
