//! Spendable range - minimum and maximum send value for a destination.
//!
//! Both bounds are pure functions of the UTXO snapshot and fee rate.
//! They are recomputed on every input or balance change; nothing here
//! caches.

use bitcoin::{Amount, FeeRate};

use crate::backend::{ScriptKind, UtxoSnapshot};
use crate::send::fee::{dust_threshold, economic_inputs, fee_for_weight, tx_weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendableRange {
    pub min: Amount,
    pub max: Amount,
}

impl SpendableRange {
    pub fn contains(&self, amount: Amount) -> bool {
        self.min <= amount && amount <= self.max
    }
}

/// Smallest amount the destination will accept: its dust floor.
pub fn min_spendable(destination: ScriptKind) -> Amount {
    dust_threshold(destination)
}

/// Largest amount spendable to `destination`: a sweep of every input
/// worth including, minus the fee of the sweep transaction.
///
/// Inputs that cannot pay for their own inclusion are excluded before
/// the sweep fee is taken, so adding a dusty UTXO never lowers the
/// maximum. `None` when nothing remains to sweep.
pub fn max_spendable(
    snapshot: &UtxoSnapshot,
    destination: ScriptKind,
    rate: FeeRate,
) -> Option<Amount> {
    let inputs = economic_inputs(snapshot, rate);
    if inputs.is_empty() {
        return None;
    }
    let kinds: Vec<ScriptKind> = inputs.iter().map(|u| u.kind).collect();
    let total: Amount = inputs.iter().map(|u| u.value).sum();
    let fee = fee_for_weight(rate, tx_weight(&kinds, &[destination]));
    let max = total.checked_sub(fee)?;
    (max > Amount::ZERO).then_some(max)
}

/// Both bounds, or `None` when the wallet cannot fund even the dust
/// floor (callers treat that the same as an unsynced wallet: pending).
pub fn spendable_range(
    snapshot: &UtxoSnapshot,
    destination: ScriptKind,
    rate: FeeRate,
) -> Option<SpendableRange> {
    let max = max_spendable(snapshot, destination, rate)?;
    let min = min_spendable(destination);
    (min <= max).then_some(SpendableRange { min, max })
}
