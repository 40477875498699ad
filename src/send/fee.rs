//! Fee estimation over estimated transaction weight.
//!
//! All arithmetic is integer satoshis over weight units. Sizes are
//! single-sig estimates per script kind; the dust floor follows Core's
//! standardness rule (dust relay rate over output size plus the cost of
//! spending the output later).

use bitcoin::{Amount, FeeRate, Weight};

use crate::backend::{ScriptKind, SpendableUtxo, UtxoSnapshot};
use crate::error::{WalletError, WalletResult};
use crate::send::range::max_spendable;

/// Dust relay rate baked into standardness policy, sat/vB.
const DUST_RELAY_RATE_SAT_VB: u64 = 3;

/// Outpoint (32+4) + nSequence (4) + 1 byte scriptSig length, in wu.
const TXIN_BASE_WEIGHT: u64 = (32 + 4 + 4 + 1) * 4;

/// Serialized output size in vbytes: value (8) + length prefix (1) + script.
fn output_vbytes(kind: ScriptKind) -> u64 {
    match kind {
        ScriptKind::P2pkh => 8 + 1 + 25,
        ScriptKind::P2sh => 8 + 1 + 23,
        ScriptKind::P2wpkh => 8 + 1 + 22,
        ScriptKind::P2wsh => 8 + 1 + 34,
        ScriptKind::P2tr => 8 + 1 + 34,
    }
}

/// Cost of spending an output of this kind later, in vbytes (Core's
/// dust accounting: 148 for non-witness, 67 for witness).
fn spend_cost_vbytes(kind: ScriptKind) -> u64 {
    if kind.is_witness() {
        32 + 4 + 1 + 107 / 4 + 4
    } else {
        32 + 4 + 1 + 107 + 4
    }
}

/// Smallest output value not rejected as dust for this script kind.
///
/// 546 sat for p2pkh, 294 for p2wpkh, 330 for p2wsh/p2tr.
pub fn dust_threshold(kind: ScriptKind) -> Amount {
    Amount::from_sat(DUST_RELAY_RATE_SAT_VB * (output_vbytes(kind) + spend_cost_vbytes(kind)))
}

/// Estimated weight of one input, including its satisfaction.
pub fn input_weight(kind: ScriptKind) -> Weight {
    let wu = match kind {
        // 107-byte scriptSig: sig + pubkey.
        ScriptKind::P2pkh => TXIN_BASE_WEIGHT + 4 * 107,
        // Wrapped segwit keyhash: 23-byte redeem script + witness.
        ScriptKind::P2sh => TXIN_BASE_WEIGHT + 4 * 23 + 108,
        ScriptKind::P2wpkh => TXIN_BASE_WEIGHT + 108,
        ScriptKind::P2wsh => TXIN_BASE_WEIGHT + 172,
        // Keyspend with default sighash.
        ScriptKind::P2tr => TXIN_BASE_WEIGHT + 66,
    };
    Weight::from_wu(wu)
}

pub fn output_weight(kind: ScriptKind) -> Weight {
    Weight::from_wu(4 * output_vbytes(kind))
}

fn varint_size(n: usize) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        _ => 5,
    }
}

/// Estimated weight of a full transaction with these inputs and outputs.
pub fn tx_weight(inputs: &[ScriptKind], outputs: &[ScriptKind]) -> Weight {
    // Version + locktime + io counts; marker/flag when any witness input.
    let mut wu = 4 * (4 + 4 + varint_size(inputs.len()) + varint_size(outputs.len()));
    if inputs.iter().any(|k| k.is_witness()) {
        wu += 2;
    }
    for kind in inputs {
        wu += input_weight(*kind).to_wu();
    }
    for kind in outputs {
        wu += output_weight(*kind).to_wu();
    }
    Weight::from_wu(wu)
}

/// Fee for a transaction of this weight, rounded up to a whole satoshi.
pub fn fee_for_weight(rate: FeeRate, weight: Weight) -> Amount {
    Amount::from_sat((rate.to_sat_per_kwu() * weight.to_wu()).div_ceil(1000))
}

/// Inputs worth including: each must be worth more than the fee it adds.
/// Sorted by effective value (value minus marginal fee), largest first.
pub(crate) fn economic_inputs(snapshot: &UtxoSnapshot, rate: FeeRate) -> Vec<&SpendableUtxo> {
    let mut inputs: Vec<(&SpendableUtxo, Amount)> = snapshot
        .utxos
        .iter()
        .filter_map(|utxo| {
            let marginal = fee_for_weight(rate, input_weight(utxo.kind));
            utxo.value.checked_sub(marginal).and_then(|effective| {
                (effective > Amount::ZERO).then_some((utxo, effective))
            })
        })
        .collect();
    inputs.sort_by(|a, b| b.1.cmp(&a.1));
    inputs.into_iter().map(|(utxo, _)| utxo).collect()
}

/// Compute the fee for sending `amount` to a `destination` output.
///
/// Selection walks economic inputs by descending effective value. A
/// change output is added when the remainder clears the change dust
/// floor; otherwise the remainder folds into the fee. Succeeds exactly
/// when `amount` lies within the spendable range for the same snapshot
/// and rate.
pub fn estimate_fee(
    snapshot: &UtxoSnapshot,
    amount: Amount,
    destination: ScriptKind,
    rate: FeeRate,
) -> WalletResult<Amount> {
    if snapshot.utxos.is_empty() {
        return Err(WalletError::Unavailable);
    }
    let minimum = dust_threshold(destination);
    if amount < minimum {
        return Err(WalletError::Dust { minimum });
    }

    let change_floor = dust_threshold(snapshot.change_kind);
    let mut kinds: Vec<ScriptKind> = Vec::new();
    let mut selected = Amount::ZERO;

    for utxo in economic_inputs(snapshot, rate) {
        kinds.push(utxo.kind);
        selected += utxo.value;

        let fee_with_change =
            fee_for_weight(rate, tx_weight(&kinds, &[destination, snapshot.change_kind]));
        if selected >= amount + fee_with_change + change_floor {
            return Ok(fee_with_change);
        }

        let fee_changeless = fee_for_weight(rate, tx_weight(&kinds, &[destination]));
        if selected >= amount + fee_changeless {
            // No room for change; the remainder goes to the miner.
            return Ok(selected - amount);
        }
    }

    Err(WalletError::InsufficientFunds {
        maximum: max_spendable(snapshot, destination, rate).unwrap_or(Amount::ZERO),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::OutPoint;

    fn rate(sat_per_vb: u64) -> FeeRate {
        FeeRate::from_sat_per_vb(sat_per_vb).unwrap()
    }

    fn snapshot(values: &[u64]) -> UtxoSnapshot {
        UtxoSnapshot {
            utxos: values
                .iter()
                .map(|v| SpendableUtxo {
                    outpoint: OutPoint::null(),
                    value: Amount::from_sat(*v),
                    kind: ScriptKind::P2wpkh,
                })
                .collect(),
            change_kind: ScriptKind::P2wpkh,
        }
    }

    #[test]
    fn test_dust_thresholds_match_core() {
        assert_eq!(dust_threshold(ScriptKind::P2pkh), Amount::from_sat(546));
        assert_eq!(dust_threshold(ScriptKind::P2wpkh), Amount::from_sat(294));
        assert_eq!(dust_threshold(ScriptKind::P2wsh), Amount::from_sat(330));
        assert_eq!(dust_threshold(ScriptKind::P2tr), Amount::from_sat(330));
    }

    #[test]
    fn test_input_weights() {
        assert_eq!(input_weight(ScriptKind::P2wpkh).to_wu(), 272);
        assert_eq!(input_weight(ScriptKind::P2pkh).to_wu(), 592);
        assert_eq!(input_weight(ScriptKind::P2tr).to_wu(), 230);
    }

    #[test]
    fn test_tx_weight_single_p2wpkh_spend() {
        // 1 input, recipient + change outputs, all segwit keyhash:
        // 40 base + 2 marker + 272 + 124 + 124.
        let w = tx_weight(&[ScriptKind::P2wpkh], &[ScriptKind::P2wpkh, ScriptKind::P2wpkh]);
        assert_eq!(w.to_wu(), 562);
    }

    #[test]
    fn test_fee_rounds_up() {
        // 750 sat/kwu * 562 wu = 421.5 -> 422.
        assert_eq!(
            fee_for_weight(rate(3), Weight::from_wu(562)),
            Amount::from_sat(422)
        );
        assert_eq!(fee_for_weight(rate(3), Weight::from_wu(0)), Amount::ZERO);
    }

    #[test]
    fn test_economic_inputs_drop_dusty_utxos() {
        // Marginal fee for a p2wpkh input at 3 sat/vB is 204 sats.
        let snap = snapshot(&[40_000, 204, 205, 10]);
        let kept: Vec<u64> = economic_inputs(&snap, rate(3))
            .iter()
            .map(|u| u.value.to_sat())
            .collect();
        assert_eq!(kept, vec![40_000, 205]);
    }

    #[test]
    fn test_fee_below_dust_is_rejected() {
        let snap = snapshot(&[50_000]);
        let err = estimate_fee(&snap, Amount::from_sat(293), ScriptKind::P2wpkh, rate(3));
        assert_eq!(
            err,
            Err(WalletError::Dust { minimum: Amount::from_sat(294) })
        );
        // Exactly at the floor is accepted.
        assert!(estimate_fee(&snap, Amount::from_sat(294), ScriptKind::P2wpkh, rate(3)).is_ok());
    }

    #[test]
    fn test_fee_with_change_output() {
        // Plenty of room: one input covers amount + fee + change.
        let snap = snapshot(&[100_000]);
        let fee = estimate_fee(&snap, Amount::from_sat(10_000), ScriptKind::P2wpkh, rate(3))
            .unwrap();
        // 1-in 2-out p2wpkh tx is 562 wu -> 422 sats at 3 sat/vB.
        assert_eq!(fee, Amount::from_sat(422));
    }

    #[test]
    fn test_fee_changeless_when_remainder_below_dust() {
        // 1-in 1-out tx is 438 wu -> 329 sats. Remainder after amount and
        // fee is under the change floor, so it folds into the fee.
        let snap = snapshot(&[10_500]);
        let fee = estimate_fee(&snap, Amount::from_sat(10_100), ScriptKind::P2wpkh, rate(3))
            .unwrap();
        assert_eq!(fee, Amount::from_sat(400));
    }

    #[test]
    fn test_fee_insufficient_funds_reports_maximum() {
        let snap = snapshot(&[40_000, 20_000]);
        // Sweep of both inputs to one p2wpkh output: 710 wu -> 533 sats.
        let maximum = Amount::from_sat(60_000 - 533);
        let err = estimate_fee(&snap, Amount::from_sat(70_000), ScriptKind::P2wpkh, rate(3));
        assert_eq!(err, Err(WalletError::InsufficientFunds { maximum }));
    }

    #[test]
    fn test_fee_unavailable_without_utxos() {
        let snap = snapshot(&[]);
        let err = estimate_fee(&snap, Amount::from_sat(10_000), ScriptKind::P2wpkh, rate(3));
        assert_eq!(err, Err(WalletError::Unavailable));
    }

    #[test]
    fn test_fee_succeeds_exactly_within_range() {
        use crate::send::range::spendable_range;

        let snap = snapshot(&[40_000, 20_000, 150]);
        let r = rate(3);
        let range = spendable_range(&snap, ScriptKind::P2wpkh, r).unwrap();
        for amount in [
            range.min,
            range.min + Amount::from_sat(1),
            Amount::from_sat(30_000),
            range.max - Amount::from_sat(1),
            range.max,
        ] {
            assert!(
                estimate_fee(&snap, amount, ScriptKind::P2wpkh, r).is_ok(),
                "{amount} should be spendable"
            );
        }
        assert!(matches!(
            estimate_fee(&snap, range.min - Amount::from_sat(1), ScriptKind::P2wpkh, r),
            Err(WalletError::Dust { .. })
        ));
        assert!(matches!(
            estimate_fee(&snap, range.max + Amount::from_sat(1), ScriptKind::P2wpkh, r),
            Err(WalletError::InsufficientFunds { .. })
        ));
    }
}
