//! Send validation state machine.
//!
//! Holds the staged destination/amount text and derives a fresh
//! [`Validation`] pair on every change: address edits, amount edits,
//! and external balance/sync updates all re-run the same checks.
//! Nothing is cached across changes.
//!
//! Per change the order is: address syntax and network, then the
//! spendable range, then the amount against the range, then the fee
//! for display. A fee lookup that fails transiently degrades to
//! `Pending` so the field never flaps to an error while the chain
//! state moves.

use bitcoin::FeeRate;

use crate::amount::{format_btc, parse_btc};
use crate::backend::{ScriptKind, WalletBackend};
use crate::send::fee::estimate_fee;
use crate::send::range::spendable_range;

/// Outcome of validating one input field. `Pending` covers both
/// incomplete input and chain data that is not ready yet; only a
/// definite rejection is `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Validation {
    #[default]
    Pending,
    Valid(Option<String>),
    Invalid(Option<String>),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Validation::Invalid(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Validation::Pending)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Validation::Pending => None,
            Validation::Valid(m) | Validation::Invalid(m) => m.as_deref(),
        }
    }
}

/// What validation reads: the current backend (if a session is active)
/// and the configured fee rate.
pub struct SpendContext<'a> {
    pub backend: Option<&'a dyn WalletBackend>,
    pub fee_rate: FeeRate,
}

#[derive(Debug, Default)]
pub struct SendValidator {
    address_text: Option<String>,
    amount_text: Option<String>,
}

impl SendValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_text(&self) -> Option<&str> {
        self.address_text.as_deref()
    }

    pub fn amount_text(&self) -> Option<&str> {
        self.amount_text.as_deref()
    }

    /// Stage a new destination. Re-validates the stored amount too,
    /// since its range depends on the destination.
    pub fn set_address(
        &mut self,
        text: Option<&str>,
        ctx: &SpendContext<'_>,
    ) -> (Validation, Validation) {
        self.address_text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self.revalidate(ctx)
    }

    /// Stage a new amount. Comma decimal separators normalize to `.`.
    pub fn set_amount(&mut self, text: Option<&str>, ctx: &SpendContext<'_>) -> Validation {
        self.amount_text = text
            .map(|t| t.trim().replace(',', "."))
            .filter(|t| !t.is_empty());
        self.validate_amount(ctx)
    }

    /// Re-run both validations against the current chain state. Called
    /// on balance or sync-state change without any user edit.
    pub fn revalidate(&self, ctx: &SpendContext<'_>) -> (Validation, Validation) {
        (self.validate_address(ctx), self.validate_amount(ctx))
    }

    /// Drop staged input; both fields go back to `Pending`.
    pub fn clear(&mut self) {
        self.address_text = None;
        self.amount_text = None;
    }

    fn validate_address(&self, ctx: &SpendContext<'_>) -> Validation {
        let Some(text) = self.address_text.as_deref() else {
            return Validation::Pending;
        };
        let Some(backend) = ctx.backend else {
            return Validation::Pending;
        };
        match backend.validate_address(text) {
            Ok(_) => Validation::Valid(None),
            Err(_) => Validation::Invalid(None),
        }
    }

    fn validate_amount(&self, ctx: &SpendContext<'_>) -> Validation {
        let Some(backend) = ctx.backend else {
            return Validation::Pending;
        };
        let Some(text) = self.amount_text.as_deref() else {
            return Validation::Pending;
        };
        // Unparseable text is incomplete typing, not a rejection.
        let Ok(amount) = parse_btc(text) else {
            return Validation::Pending;
        };
        let Some(address_text) = self.address_text.as_deref() else {
            return Validation::Pending;
        };
        let Ok(destination) = backend.validate_address(address_text) else {
            return Validation::Pending;
        };
        let Some(kind) = ScriptKind::of(&destination) else {
            return Validation::Pending;
        };
        let Some(snapshot) = backend.utxo_snapshot() else {
            // Sync in progress; never rendered as an error.
            return Validation::Pending;
        };
        let Some(range) = spendable_range(&snapshot, kind, ctx.fee_rate) else {
            return Validation::Pending;
        };

        if amount < range.min {
            return Validation::Invalid(Some(format!("MIN: {} BTC", format_btc(range.min))));
        }
        if amount > range.max {
            return Validation::Invalid(Some(format!("MAX: {} BTC", format_btc(range.max))));
        }
        match estimate_fee(&snapshot, amount, kind, ctx.fee_rate) {
            Ok(fee) => Validation::Valid(Some(format!("Fee: {} BTC", format_btc(fee)))),
            Err(_) => Validation::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        SpendableUtxo, SyncSink, SyncState, UtxoSnapshot, WalletBalance,
    };
    use crate::error::{WalletError, WalletResult};
    use bitcoin::{Address, Amount, OutPoint, Txid};
    use std::str::FromStr;

    const VALID_ADDR: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";

    struct StubBackend {
        snapshot: Option<UtxoSnapshot>,
    }

    impl StubBackend {
        fn synced(values: &[u64]) -> Self {
            Self {
                snapshot: Some(UtxoSnapshot {
                    utxos: values
                        .iter()
                        .map(|v| SpendableUtxo {
                            outpoint: OutPoint::null(),
                            value: Amount::from_sat(*v),
                            kind: ScriptKind::P2wpkh,
                        })
                        .collect(),
                    change_kind: ScriptKind::P2wpkh,
                }),
            }
        }

        fn unsynced() -> Self {
            Self { snapshot: None }
        }
    }

    impl WalletBackend for StubBackend {
        fn network(&self) -> bitcoin::Network {
            bitcoin::Network::Signet
        }
        fn balance(&self) -> WalletResult<WalletBalance> {
            Ok(WalletBalance::default())
        }
        fn sync_state(&self) -> SyncState {
            if self.snapshot.is_some() { SyncState::Synced } else { SyncState::NotSynced }
        }
        fn receive_address(&self) -> WalletResult<String> {
            Ok(VALID_ADDR.into())
        }
        fn validate_address(&self, address: &str) -> WalletResult<Address> {
            Address::from_str(address)
                .map_err(|e| WalletError::InvalidAddress(e.to_string()))?
                .require_network(self.network())
                .map_err(|e| WalletError::InvalidAddress(e.to_string()))
        }
        fn utxo_snapshot(&self) -> Option<UtxoSnapshot> {
            self.snapshot.clone()
        }
        fn sync(&self, _sink: SyncSink) -> WalletResult<()> {
            Ok(())
        }
        fn send(&self, _: &Address, _: Amount, _: bitcoin::FeeRate) -> WalletResult<Txid> {
            Err(WalletError::Build("stub".into()))
        }
        fn stop(&self) {}
    }

    fn ctx(backend: &StubBackend) -> SpendContext<'_> {
        SpendContext {
            backend: Some(backend),
            fee_rate: bitcoin::FeeRate::from_sat_per_vb(3).unwrap(),
        }
    }

    #[test]
    fn test_empty_fields_are_pending() {
        let backend = StubBackend::synced(&[100_000]);
        let validator = SendValidator::new();
        let (address, amount) = validator.revalidate(&ctx(&backend));
        assert!(address.is_pending());
        assert!(amount.is_pending());
    }

    #[test]
    fn test_address_validity() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();

        let (address, _) = validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        assert!(address.is_valid());

        let (address, _) = validator.set_address(Some("not-an-address"), &ctx(&backend));
        assert!(address.is_invalid());

        // Mainnet address on a signet session.
        let (address, _) = validator.set_address(
            Some("bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"),
            &ctx(&backend),
        );
        assert!(address.is_invalid());
    }

    #[test]
    fn test_amount_pending_while_address_invalid() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some("junk"), &ctx(&backend));
        let amount = validator.set_amount(Some("0.0001"), &ctx(&backend));
        assert!(amount.is_pending());
    }

    #[test]
    fn test_amount_within_range_shows_fee() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        let amount = validator.set_amount(Some("0.0001"), &ctx(&backend));
        assert_eq!(
            amount,
            Validation::Valid(Some("Fee: 0.00000422 BTC".into()))
        );
    }

    #[test]
    fn test_comma_separator_accepted() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        let amount = validator.set_amount(Some("0,0001"), &ctx(&backend));
        assert!(amount.is_valid());
        assert_eq!(validator.amount_text(), Some("0.0001"));
    }

    #[test]
    fn test_amount_below_minimum() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        let amount = validator.set_amount(Some("0.00000100"), &ctx(&backend));
        assert_eq!(
            amount,
            Validation::Invalid(Some("MIN: 0.00000294 BTC".into()))
        );
    }

    #[test]
    fn test_amount_above_maximum() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        let amount = validator.set_amount(Some("0.002"), &ctx(&backend));
        // Sweep of the single input: 100_000 - 329.
        assert_eq!(
            amount,
            Validation::Invalid(Some("MAX: 0.00099671 BTC".into()))
        );
    }

    #[test]
    fn test_unsynced_wallet_reports_pending_not_invalid() {
        let backend = StubBackend::unsynced();
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        let amount = validator.set_amount(Some("0.0001"), &ctx(&backend));
        assert!(amount.is_pending());
    }

    #[test]
    fn test_no_session_reports_pending() {
        let mut validator = SendValidator::new();
        let ctx = SpendContext {
            backend: None,
            fee_rate: bitcoin::FeeRate::from_sat_per_vb(3).unwrap(),
        };
        let (address, amount) = validator.set_address(Some(VALID_ADDR), &ctx);
        assert!(address.is_pending());
        assert!(amount.is_pending());
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let backend = StubBackend::synced(&[40_000, 20_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        validator.set_amount(Some("0.0003"), &ctx(&backend));
        let first = validator.revalidate(&ctx(&backend));
        let second = validator.revalidate(&ctx(&backend));
        assert_eq!(first, second);
    }

    #[test]
    fn test_balance_change_retriggers_without_user_edit() {
        let mut validator = SendValidator::new();
        let empty = StubBackend::synced(&[]);
        validator.set_address(Some(VALID_ADDR), &ctx(&empty));
        let amount = validator.set_amount(Some("0.0001"), &ctx(&empty));
        assert!(amount.is_pending());

        // Funds arrive; same staged input now validates.
        let funded = StubBackend::synced(&[100_000]);
        let (_, amount) = validator.revalidate(&ctx(&funded));
        assert!(amount.is_valid());
    }

    #[test]
    fn test_clear_resets_to_pending() {
        let backend = StubBackend::synced(&[100_000]);
        let mut validator = SendValidator::new();
        validator.set_address(Some(VALID_ADDR), &ctx(&backend));
        validator.set_amount(Some("0.0001"), &ctx(&backend));
        validator.clear();
        assert_eq!(validator.address_text(), None);
        assert_eq!(validator.amount_text(), None);
        let (address, amount) = validator.revalidate(&ctx(&backend));
        assert!(address.is_pending());
        assert!(amount.is_pending());
    }
}
