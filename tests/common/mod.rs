//! Deterministic in-memory backend for engine and session tests.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bitcoin::{Address, Amount, FeeRate, OutPoint, Txid};

use btcwallet::backend::{SpendableUtxo, SyncSink, SyncState, WalletBackend};
use btcwallet::error::{WalletError, WalletResult};
use btcwallet::{ScriptKind, UtxoSnapshot, WalletBalance};

/// BIP84 test vector, signet, index 0 ("abandon ... about").
pub const VALID_ADDR: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";
/// Same vector on mainnet - wrong network for a signet session.
pub const MAINNET_ADDR: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// The first bitcoin transaction ever, as a placeholder txid.
const FAKE_TXID: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

pub struct FakeBackend {
    snapshot: Mutex<Option<UtxoSnapshot>>,
    pub send_calls: AtomicUsize,
    pub snapshot_reads: AtomicUsize,
    pub stopped: AtomicBool,
}

impl FakeBackend {
    pub fn synced(values: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(Some(Self::make_snapshot(values))),
            send_calls: AtomicUsize::new(0),
            snapshot_reads: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn unsynced() -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(None),
            send_calls: AtomicUsize::new(0),
            snapshot_reads: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        })
    }

    /// Simulate a balance update from the chain.
    pub fn set_snapshot(&self, values: &[u64]) {
        *self.snapshot.lock().unwrap() = Some(Self::make_snapshot(values));
    }

    pub fn expected_txid() -> String {
        FAKE_TXID.to_string()
    }

    fn make_snapshot(values: &[u64]) -> UtxoSnapshot {
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
}

impl WalletBackend for FakeBackend {
    fn network(&self) -> bitcoin::Network {
        bitcoin::Network::Signet
    }

    fn balance(&self) -> WalletResult<WalletBalance> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }
        let confirmed = self
            .snapshot
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.total())
            .unwrap_or(Amount::ZERO);
        Ok(WalletBalance { confirmed, ..Default::default() })
    }

    fn sync_state(&self) -> SyncState {
        if self.stopped.load(Ordering::SeqCst) {
            return SyncState::NotSynced;
        }
        if self.snapshot.lock().unwrap().is_some() {
            SyncState::Synced
        } else {
            SyncState::NotSynced
        }
    }

    fn receive_address(&self) -> WalletResult<String> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }
        Ok(VALID_ADDR.to_string())
    }

    fn validate_address(&self, address: &str) -> WalletResult<Address> {
        Address::from_str(address)
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))?
            .require_network(self.network())
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))
    }

    fn utxo_snapshot(&self) -> Option<UtxoSnapshot> {
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        self.snapshot.lock().unwrap().clone()
    }

    fn sync(&self, sink: SyncSink) -> WalletResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }
        sink(SyncState::Syncing { progress: 0.5 });
        {
            let mut snapshot = self.snapshot.lock().unwrap();
            if snapshot.is_none() {
                *snapshot = Some(Self::make_snapshot(&[]));
            }
        }
        sink(SyncState::Synced);
        Ok(())
    }

    fn send(&self, _destination: &Address, _amount: Amount, _fee_rate: FeeRate) -> WalletResult<Txid> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Txid::from_str(FAKE_TXID).expect("static txid"))
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
