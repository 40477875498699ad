//! Chain backend - the opaque chain-sync/UTXO collaborator.
//!
//! The send engine never talks to the network itself. Everything it
//! needs from the chain (balance, sync state, the spendable UTXO set,
//! address validation, signing and broadcast) comes through the
//! [`WalletBackend`] trait. The production implementation is
//! [`BdkBackend`] (feature `bdk`); tests substitute a deterministic
//! in-memory backend.
//!
//! A [`UtxoSnapshot`] is immutable once handed out: readers treat it as
//! a consistent point-in-time view and recompute ranges/fees from a
//! fresh snapshot on every change notification.

#[cfg(feature = "bdk")]
mod bdk;
#[cfg(feature = "bdk")]
pub use bdk::BdkBackend;

use std::sync::Arc;

use bitcoin::{Address, Amount, FeeRate, OutPoint, Txid};

use crate::error::WalletResult;

/// Script type of an output, as the fee engine needs to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Legacy pay-to-pubkey-hash.
    P2pkh,
    /// Pay-to-script-hash (estimated as wrapped segwit keyhash).
    P2sh,
    /// Segwit v0 keyhash.
    P2wpkh,
    /// Segwit v0 scripthash.
    P2wsh,
    /// Taproot.
    P2tr,
}

impl ScriptKind {
    pub fn of(address: &Address) -> Option<Self> {
        use bitcoin::AddressType;
        match address.address_type()? {
            AddressType::P2pkh => Some(ScriptKind::P2pkh),
            AddressType::P2sh => Some(ScriptKind::P2sh),
            AddressType::P2wpkh => Some(ScriptKind::P2wpkh),
            AddressType::P2wsh => Some(ScriptKind::P2wsh),
            AddressType::P2tr => Some(ScriptKind::P2tr),
            _ => None,
        }
    }

    pub fn of_script(script: &bitcoin::Script) -> Option<Self> {
        if script.is_p2pkh() {
            Some(ScriptKind::P2pkh)
        } else if script.is_p2sh() {
            Some(ScriptKind::P2sh)
        } else if script.is_p2wpkh() {
            Some(ScriptKind::P2wpkh)
        } else if script.is_p2wsh() {
            Some(ScriptKind::P2wsh)
        } else if script.is_p2tr() {
            Some(ScriptKind::P2tr)
        } else {
            None
        }
    }

    pub fn is_witness(&self) -> bool {
        matches!(self, ScriptKind::P2wpkh | ScriptKind::P2wsh | ScriptKind::P2tr)
    }
}

/// One spendable output owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableUtxo {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub kind: ScriptKind,
}

/// Point-in-time view of the spendable UTXO set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSnapshot {
    pub utxos: Vec<SpendableUtxo>,
    /// Script kind of change outputs the wallet would create.
    pub change_kind: ScriptKind,
}

impl UtxoSnapshot {
    pub fn total(&self) -> Amount {
        self.utxos.iter().map(|u| u.value).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletBalance {
    pub confirmed: Amount,
    pub trusted_pending: Amount,
    pub untrusted_pending: Amount,
    pub immature: Amount,
}

impl WalletBalance {
    /// Value available for new transactions. Unconfirmed and immature
    /// outputs are excluded by policy.
    pub fn spendable(&self) -> Amount {
        self.confirmed
    }

    pub fn total(&self) -> Amount {
        self.confirmed + self.trusted_pending + self.untrusted_pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SyncState {
    #[default]
    NotSynced,
    Syncing {
        /// 0..1
        progress: f32,
    },
    Synced,
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced)
    }
}

/// Receives sync-state transitions while a sync runs. Must not call
/// back into the backend: it may fire while internal locks are held.
pub type SyncSink = Arc<dyn Fn(SyncState) + Send + Sync>;

/// The chain-sync/UTXO collaborator.
///
/// All read operations return immediately from the current snapshot;
/// none of them blocks on network progress. After [`stop`], reads keep
/// answering (with empty/`NotSynced` data or `Unavailable`) rather than
/// panicking.
///
/// [`stop`]: WalletBackend::stop
pub trait WalletBackend: Send + Sync {
    fn network(&self) -> bitcoin::Network;

    fn balance(&self) -> WalletResult<WalletBalance>;

    fn sync_state(&self) -> SyncState;

    /// Next unused receive address.
    fn receive_address(&self) -> WalletResult<String>;

    /// Parse and check an address against this backend's network.
    fn validate_address(&self, address: &str) -> WalletResult<Address>;

    /// Spendable UTXO set, or `None` until the first sync completes.
    fn utxo_snapshot(&self) -> Option<UtxoSnapshot>;

    /// Run one sync to the chain tip, reporting progress through `sink`.
    fn sync(&self, sink: SyncSink) -> WalletResult<()>;

    /// Build, sign and broadcast a payment. Re-selects inputs from the
    /// live UTXO set; the returned txid is the network identifier.
    fn send(&self, destination: &Address, amount: Amount, fee_rate: FeeRate) -> WalletResult<Txid>;

    /// Idempotent. In-flight reads after stop resolve as `Unavailable`.
    fn stop(&self);
}
