//! BDK backend - Bitcoin wallet with file-based persistence.
//!
//! Thin wrapper over bdk_wallet 2.x with bdk_file_store and an Electrum
//! sync backend. Receives a 64-byte seed from the session layer; the
//! mnemonic never crosses this boundary. The Electrum connection is
//! opened lazily on first sync or broadcast, so wallet creation and
//! address derivation work offline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::str::FromStr;

use bdk_electrum::{electrum_client::Client, BdkElectrumClient};
use bdk_wallet::{
    chain::ChainPosition,
    error::CreateTxError,
    file_store::Store as FileStore,
    template::Bip84,
    ChangeSet, KeychainKind, PersistedWallet, SignOptions, Wallet,
};
use bitcoin::bip32::Xpriv;
use bitcoin::{Address, Amount, FeeRate, Network, Txid};
use tracing::{debug, info};

use crate::backend::{
    ScriptKind, SpendableUtxo, SyncSink, SyncState, UtxoSnapshot, WalletBackend, WalletBalance,
};
use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::send::{dust_threshold, max_spendable};

const MAGIC: &[u8] = b"btcwlt01";
const STOP_GAP: usize = 10;
const BATCH_SIZE: usize = 10;

type PW = PersistedWallet<FileStore<ChangeSet>>;

pub struct BdkBackend {
    wallet: Mutex<PW>,
    db: Mutex<FileStore<ChangeSet>>,
    electrum: Mutex<Option<Arc<BdkElectrumClient<Client>>>>,
    electrum_url: String,
    network: Network,
    sync_state: Arc<RwLock<SyncState>>,
    stopped: AtomicBool,
}

impl BdkBackend {
    /// Create or load the wallet file for this seed and network.
    pub fn open(seed: &[u8; 64], config: &WalletConfig) -> WalletResult<Self> {
        let network = config.network.to_bitcoin();
        let db_path = Self::db_path(config)?;
        let (wallet, db) = Self::create_wallet(seed, network, &db_path)?;

        let electrum_url = config
            .electrum_url
            .clone()
            .unwrap_or_else(|| Self::default_url(network).to_string());

        info!(network = %network, db = %db_path.display(), "wallet opened");
        Ok(Self {
            wallet: Mutex::new(wallet),
            db: Mutex::new(db),
            electrum: Mutex::new(None),
            electrum_url,
            network,
            sync_state: Arc::new(RwLock::new(SyncState::NotSynced)),
            stopped: AtomicBool::new(false),
        })
    }

    fn db_path(config: &WalletConfig) -> WalletResult<PathBuf> {
        let dir = config.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("btcwallet")
        });
        std::fs::create_dir_all(&dir).map_err(|e| WalletError::Backend(format!("data dir: {e}")))?;
        Ok(dir.join(format!("wallet-{}.db", config.network.as_str())))
    }

    fn create_wallet(
        seed: &[u8; 64],
        network: Network,
        db_path: &Path,
    ) -> WalletResult<(PW, FileStore<ChangeSet>)> {
        let xprv = Xpriv::new_master(network, seed)
            .map_err(|e| WalletError::Backend(format!("key derivation: {e}")))?;

        let ext = Bip84(xprv, KeychainKind::External);
        let int = Bip84(xprv, KeychainKind::Internal);

        let mut db: FileStore<ChangeSet> = FileStore::load_or_create(MAGIC, db_path)
            .map_err(|e| WalletError::Backend(format!("file store: {e}")))?
            .0;

        // Check that stored descriptors match the current seed; extract
        // keys for signing.
        let wallet_opt = Wallet::load()
            .descriptor(KeychainKind::External, Some(ext.clone()))
            .descriptor(KeychainKind::Internal, Some(int.clone()))
            .extract_keys()
            .load_wallet(&mut db)
            .map_err(|e| WalletError::Backend(format!("load wallet: {e}")))?;

        let wallet = match wallet_opt {
            Some(w) => w,
            None => {
                // Descriptors don't match or no wallet exists, start fresh.
                drop(db);
                let _ = std::fs::remove_file(db_path);
                let mut db = FileStore::load_or_create(MAGIC, db_path)
                    .map_err(|e| WalletError::Backend(format!("file store: {e}")))?
                    .0;
                let w = Wallet::create(ext, int)
                    .network(network)
                    .create_wallet(&mut db)
                    .map_err(|e| WalletError::Backend(format!("create wallet: {e}")))?;
                return Ok((w, db));
            }
        };

        Ok((wallet, db))
    }

    fn default_url(network: Network) -> &'static str {
        match network {
            Network::Bitcoin => "ssl://electrum.blockstream.info:50002",
            Network::Testnet => "ssl://electrum.blockstream.info:60002",
            Network::Signet => "ssl://mempool.space:60602",
            _ => "ssl://electrum.blockstream.info:50002",
        }
    }

    fn client(&self) -> WalletResult<Arc<BdkElectrumClient<Client>>> {
        let mut guard = self.electrum.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let raw = Client::new(&self.electrum_url)
            .map_err(|e| WalletError::Backend(format!("electrum: {e}")))?;
        let client = Arc::new(BdkElectrumClient::new(raw));
        *guard = Some(client.clone());
        Ok(client)
    }

    fn persist(&self) -> WalletResult<()> {
        let mut wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
        let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        wallet
            .persist(&mut *db)
            .map_err(|e| WalletError::Backend(format!("persist: {e}")))?;
        Ok(())
    }

    fn ensure_running(&self) -> WalletResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }
        Ok(())
    }

    fn classify_create_tx(
        &self,
        err: CreateTxError,
        destination_kind: ScriptKind,
        fee_rate: FeeRate,
        snapshot: Option<&UtxoSnapshot>,
    ) -> WalletError {
        match err {
            CreateTxError::CoinSelection(_) => WalletError::InsufficientFunds {
                maximum: snapshot
                    .and_then(|s| max_spendable(s, destination_kind, fee_rate))
                    .unwrap_or(Amount::ZERO),
            },
            CreateTxError::OutputBelowDustLimit(_) => WalletError::Dust {
                minimum: dust_threshold(destination_kind),
            },
            other => WalletError::Build(other.to_string()),
        }
    }
}

impl WalletBackend for BdkBackend {
    fn network(&self) -> Network {
        self.network
    }

    fn balance(&self) -> WalletResult<WalletBalance> {
        self.ensure_running()?;
        let wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
        let b = wallet.balance();
        Ok(WalletBalance {
            confirmed: b.confirmed,
            trusted_pending: b.trusted_pending,
            untrusted_pending: b.untrusted_pending,
            immature: b.immature,
        })
    }

    fn sync_state(&self) -> SyncState {
        if self.stopped.load(Ordering::SeqCst) {
            return SyncState::NotSynced;
        }
        *self.sync_state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn receive_address(&self) -> WalletResult<String> {
        self.ensure_running()?;
        let addr = {
            let mut wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
            wallet
                .next_unused_address(KeychainKind::External)
                .address
                .to_string()
        };
        self.persist()?;
        Ok(addr)
    }

    fn validate_address(&self, address: &str) -> WalletResult<Address> {
        Address::from_str(address)
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| WalletError::InvalidAddress(e.to_string()))
    }

    fn utxo_snapshot(&self) -> Option<UtxoSnapshot> {
        if self.stopped.load(Ordering::SeqCst) || !self.sync_state().is_synced() {
            return None;
        }
        let wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
        let utxos = wallet
            .list_unspent()
            .filter(|utxo| {
                !utxo.is_spent
                    && matches!(utxo.chain_position, ChainPosition::Confirmed { .. })
            })
            .filter_map(|utxo| {
                let kind = ScriptKind::of_script(&utxo.txout.script_pubkey)?;
                Some(SpendableUtxo {
                    outpoint: utxo.outpoint,
                    value: utxo.txout.value,
                    kind,
                })
            })
            .collect();
        // BIP84 internal keychain: change is always segwit keyhash.
        Some(UtxoSnapshot { utxos, change_kind: ScriptKind::P2wpkh })
    }

    fn sync(&self, sink: SyncSink) -> WalletResult<()> {
        self.ensure_running()?;
        let client = self.client()?;

        *self.sync_state.write().unwrap_or_else(PoisonError::into_inner) =
            SyncState::Syncing { progress: 0.0 };
        sink(SyncState::Syncing { progress: 0.0 });

        {
            let mut wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
            let scanned = Arc::new(AtomicUsize::new(0));
            let sync_state = self.sync_state.clone();
            let progress_sink = sink.clone();
            let request = wallet.start_full_scan().inspect(move |_keychain, _index, _script| {
                let n = scanned.fetch_add(1, Ordering::Relaxed) + 1;
                if n % BATCH_SIZE == 0 {
                    // Total script count is unknown ahead of time; this
                    // converges toward 1 as the scan outruns the gap limit.
                    let progress = n as f32 / (n + STOP_GAP) as f32;
                    let state = SyncState::Syncing { progress };
                    *sync_state.write().unwrap_or_else(PoisonError::into_inner) = state;
                    progress_sink(state);
                }
            });
            let update = client
                .full_scan(request, STOP_GAP, BATCH_SIZE, false)
                .map_err(|e| WalletError::Backend(format!("sync: {e}")))?;
            wallet
                .apply_update(update)
                .map_err(|e| WalletError::Backend(format!("apply: {e}")))?;
        }
        self.persist()?;
        self.ensure_running()?;

        *self.sync_state.write().unwrap_or_else(PoisonError::into_inner) = SyncState::Synced;
        sink(SyncState::Synced);
        debug!("sync complete");
        Ok(())
    }

    fn send(&self, destination: &Address, amount: Amount, fee_rate: FeeRate) -> WalletResult<Txid> {
        self.ensure_running()?;
        let destination_kind = ScriptKind::of(destination)
            .ok_or_else(|| WalletError::InvalidAddress("unsupported script type".into()))?;
        // Captured before the wallet lock: used only to classify errors.
        let snapshot = self.utxo_snapshot();

        let tx = {
            let mut wallet = self.wallet.lock().unwrap_or_else(PoisonError::into_inner);
            let mut builder = wallet.build_tx();
            builder.add_recipient(destination.script_pubkey(), amount);
            builder.fee_rate(fee_rate);

            let mut psbt = builder
                .finish()
                .map_err(|e| self.classify_create_tx(e, destination_kind, fee_rate, snapshot.as_ref()))?;
            #[allow(deprecated)]
            wallet
                .sign(&mut psbt, SignOptions::default())
                .map_err(|e| WalletError::Build(format!("sign: {e}")))?;

            psbt.extract_tx()
                .map_err(|e| WalletError::Build(format!("extract: {e}")))?
        };

        let txid = tx.compute_txid();
        {
            use bdk_electrum::electrum_client::ElectrumApi;
            self.client()?
                .inner
                .transaction_broadcast(&tx)
                .map_err(|e| WalletError::Build(format!("broadcast: {e}")))?;
        }
        self.persist()?;
        info!(%txid, "transaction broadcast");
        Ok(txid)
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("backend stopped");
        }
    }
}
