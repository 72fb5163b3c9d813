//! Deterministic UTXO selection for funding a deposit.

use std::collections::BTreeSet;

use bitcoin::{Amount, FeeRate, OutPoint};
use tbv_primitives::WalletUtxo;
use tracing::debug;

/// Estimated virtual size of a Taproot key-spend input.
const INPUT_VBYTES: u64 = 58;

/// Estimated virtual size of a Taproot output.
const OUTPUT_VBYTES: u64 = 43;

/// Fixed transaction overhead (version, locktime, counts, segwit marker).
const TX_OVERHEAD_VBYTES: u64 = 11;

/// The funding transaction pays the vault output and a change output.
const FUNDING_TX_OUTPUTS: usize = 2;

/// Errors from UTXO selection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectionError {
    /// The unreserved UTXO set cannot cover the amount plus estimated fees.
    #[error("insufficient funds: need {required} plus fees, {spendable} spendable")]
    InsufficientFunds {
        /// The deposit amount that was requested.
        required: Amount,

        /// Total value of unreserved UTXOs that were considered.
        spendable: Amount,
    },
}

/// Estimates the fee for a funding transaction with the given shape.
pub fn estimate_fee(fee_rate: FeeRate, inputs: usize, outputs: usize) -> Amount {
    let vbytes =
        TX_OVERHEAD_VBYTES + inputs as u64 * INPUT_VBYTES + outputs as u64 * OUTPUT_VBYTES;
    // An overflowing fee can never be covered, so saturate and let the
    // selection fail on funds.
    fee_rate.fee_vb(vbytes).unwrap_or(Amount::MAX)
}

/// Picks UTXOs to fund a deposit of `required` satoshis at `fee_rate`.
///
/// Outpoints present in `reserved` are excluded up front so that two
/// concurrent deposit flows can never fund from the same coin. Selection is
/// largest-first (ties broken by outpoint ordering) which keeps the input
/// count, and therefore the fee, minimal and makes the result reproducible
/// for a given wallet snapshot. The fee target is re-estimated as inputs are
/// added.
///
/// The caller must add the returned outpoints to the reservation set in the
/// same scheduling turn; this function itself never mutates shared state.
pub fn select_utxos(
    available: &[WalletUtxo],
    reserved: &BTreeSet<OutPoint>,
    required: Amount,
    fee_rate: FeeRate,
) -> Result<Vec<WalletUtxo>, SelectionError> {
    let mut candidates: Vec<WalletUtxo> = available
        .iter()
        .filter(|utxo| !reserved.contains(&utxo.outpoint))
        .copied()
        .collect();
    candidates.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| a.outpoint.cmp(&b.outpoint))
    });

    let mut selected = Vec::new();
    let mut total = Amount::ZERO;
    for utxo in &candidates {
        selected.push(*utxo);
        // A saturated sum exceeds any representable target, which is the
        // right outcome for an absurd wallet total.
        total = total.checked_add(utxo.value).unwrap_or(Amount::MAX);

        let fee = estimate_fee(fee_rate, selected.len(), FUNDING_TX_OUTPUTS);
        if let Some(target) = required.checked_add(fee) {
            if total >= target {
                debug!(inputs = selected.len(), %total, %fee, "selected funding utxos");
                return Ok(selected);
            }
        }
    }

    Err(SelectionError::InsufficientFunds {
        required,
        spendable: total,
    })
}
