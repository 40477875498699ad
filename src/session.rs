//! Wallet session - single active backend, lifecycle and fan-out.
//!
//! One wallet session at a time: `login` fully stops and discards the
//! previous backend before the next one initializes, so two sync
//! engines never touch the same on-disk state. Initialization runs on
//! a background blocking task; readiness is signaled once through the
//! event channel. All reads answer immediately from the current
//! snapshot; a missing or stopped session reads as `Unavailable`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bitcoin::Amount;
use tokio::sync::broadcast;
use tracing::info;

use crate::amount::parse_btc;
use crate::backend::{
    ScriptKind, SyncSink, SyncState, UtxoSnapshot, WalletBackend, WalletBalance,
};
use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::send::{
    build, spendable_range, SendRequest, SendValidator, SpendContext, SpendableRange,
    TransactionRecord, Validation,
};

/// Everything the UI renders, captured in one read.
#[derive(Debug, Clone, Default)]
pub struct WalletState {
    pub balance: Option<WalletBalance>,
    pub address: Option<String>,
    pub sync_state: SyncState,
}

/// Change notifications. A single broadcast source fans out to every
/// interested reader; receivers re-poll state on each event.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    SessionStarted,
    SessionStopped,
    SyncProgress(SyncState),
    StateChanged(WalletState),
}

/// Builds a backend from a seed. Injected so tests can substitute a
/// deterministic backend for the BDK one.
pub type BackendFactory =
    Arc<dyn Fn(&[u8; 64], &WalletConfig) -> WalletResult<Arc<dyn WalletBackend>> + Send + Sync>;

pub struct WalletManager {
    config: WalletConfig,
    factory: BackendFactory,
    backend: RwLock<Option<Arc<dyn WalletBackend>>>,
    validator: Mutex<SendValidator>,
    events: broadcast::Sender<WalletEvent>,
}

impl WalletManager {
    /// Production manager backed by BDK.
    #[cfg(feature = "bdk")]
    pub fn new(config: WalletConfig) -> Self {
        Self::with_factory(
            config,
            Arc::new(|seed, config| {
                let backend = crate::backend::BdkBackend::open(seed, config)?;
                Ok(Arc::new(backend) as Arc<dyn WalletBackend>)
            }),
        )
    }

    pub fn with_factory(config: WalletConfig, factory: BackendFactory) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            config,
            factory,
            backend: RwLock::new(None),
            validator: Mutex::new(SendValidator::new()),
            events,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.backend.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Start a session from a mnemonic phrase. Any previous session is
    /// stopped and discarded first.
    pub async fn login(&self, phrase: &str) -> WalletResult<()> {
        self.logout();

        let seed = crate::mnemonic::seed(phrase)?;
        let config = self.config.clone();
        let factory = self.factory.clone();
        let backend = tokio::task::spawn_blocking(move || factory(&seed, &config))
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))??;

        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = Some(backend);
        info!(network = self.config.network.as_str(), "wallet session started");
        let _ = self.events.send(WalletEvent::SessionStarted);
        self.notify_state();
        Ok(())
    }

    /// Stop and discard the current session. Idempotent; staged send
    /// input is dropped with it.
    pub fn logout(&self) {
        let previous = self
            .backend
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(backend) = previous {
            backend.stop();
            self.validator
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            info!("wallet session stopped");
            let _ = self.events.send(WalletEvent::SessionStopped);
        }
    }

    /// Run one sync on a background blocking task, forwarding progress
    /// into the event stream.
    pub async fn sync(&self) -> WalletResult<()> {
        let backend = self.current()?;
        let events = self.events.clone();
        let sink: SyncSink = Arc::new(move |state| {
            let _ = events.send(WalletEvent::SyncProgress(state));
        });
        let task = backend.clone();
        tokio::task::spawn_blocking(move || task.sync(sink))
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))??;
        self.notify_state();
        Ok(())
    }

    pub fn state(&self) -> WalletState {
        let guard = self.backend.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            None => WalletState::default(),
            Some(backend) => WalletState {
                balance: backend.balance().ok(),
                address: backend.receive_address().ok(),
                sync_state: backend.sync_state(),
            },
        }
    }

    pub fn balance(&self) -> WalletResult<WalletBalance> {
        self.current()?.balance()
    }

    pub fn sync_state(&self) -> SyncState {
        match self.current() {
            Ok(backend) => backend.sync_state(),
            Err(_) => SyncState::NotSynced,
        }
    }

    pub fn receive_address(&self) -> WalletResult<String> {
        self.current()?.receive_address()
    }

    pub fn utxo_snapshot(&self) -> Option<UtxoSnapshot> {
        self.current().ok()?.utxo_snapshot()
    }

    /// Min/max spendable to `address` under the configured fee rate.
    pub fn spendable_range_for(&self, address: &str) -> WalletResult<SpendableRange> {
        let backend = self.current()?;
        let destination = backend.validate_address(address)?;
        let kind = ScriptKind::of(&destination)
            .ok_or_else(|| WalletError::InvalidAddress("unsupported script type".into()))?;
        let snapshot = backend.utxo_snapshot().ok_or(WalletError::Unavailable)?;
        spendable_range(&snapshot, kind, self.config.fee_rate()).ok_or(WalletError::Unavailable)
    }

    // ---- staged send input -------------------------------------------------

    pub fn set_address(&self, text: Option<&str>) -> (Validation, Validation) {
        let guard = self.backend.read().unwrap_or_else(PoisonError::into_inner);
        let ctx = SpendContext {
            backend: guard.as_deref(),
            fee_rate: self.config.fee_rate(),
        };
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_address(text, &ctx)
    }

    pub fn set_amount(&self, text: Option<&str>) -> Validation {
        let guard = self.backend.read().unwrap_or_else(PoisonError::into_inner);
        let ctx = SpendContext {
            backend: guard.as_deref(),
            fee_rate: self.config.fee_rate(),
        };
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_amount(text, &ctx)
    }

    /// Re-validate the staged pair against current chain state (called
    /// on every balance/sync event).
    pub fn revalidate(&self) -> (Validation, Validation) {
        let guard = self.backend.read().unwrap_or_else(PoisonError::into_inner);
        let ctx = SpendContext {
            backend: guard.as_deref(),
            fee_rate: self.config.fee_rate(),
        };
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .revalidate(&ctx)
    }

    pub fn staged(&self) -> (Option<String>, Option<String>) {
        let validator = self.validator.lock().unwrap_or_else(PoisonError::into_inner);
        (
            validator.address_text().map(str::to_string),
            validator.amount_text().map(str::to_string),
        )
    }

    pub fn clear_staged(&self) {
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Send the staged amount to the staged destination. On success the
    /// staged input resets and the record is returned for persistence.
    pub async fn send(&self) -> WalletResult<TransactionRecord> {
        let backend = self.current()?;
        let (address_text, amount_text) = self.staged();

        let address_text =
            address_text.ok_or_else(|| WalletError::InvalidAddress("no destination".into()))?;
        let destination = backend.validate_address(&address_text)?;
        let amount: Amount = parse_btc(&amount_text.ok_or(WalletError::InvalidAmount)?)?;

        let request = SendRequest {
            destination,
            amount,
            fee_rate: self.config.fee_rate(),
        };
        let task = backend.clone();
        let record = tokio::task::spawn_blocking(move || build(task.as_ref(), request))
            .await
            .map_err(|e| WalletError::Backend(e.to_string()))??;

        self.clear_staged();
        info!(hash = %record.hash, amount = %record.amount, "transaction sent");
        self.notify_state();
        Ok(record)
    }

    fn current(&self) -> WalletResult<Arc<dyn WalletBackend>> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(WalletError::Unavailable)
    }

    fn notify_state(&self) {
        let _ = self.events.send(WalletEvent::StateChanged(self.state()));
    }
}
