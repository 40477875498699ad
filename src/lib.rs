//! btcwallet: Bitcoin wallet core for a thin UI shell.
//!
//! # Architecture
//!
//! ```text
//! WalletManager (session lifecycle, one active backend)
//!   │
//!   ├── events: broadcast<WalletEvent> ── fan-out to UI readers
//!   │
//!   ├── SendValidator (staged address/amount → Validation pair)
//!   │     │
//!   │     └── send engine:
//!   │           spendable_range ── min/max over UtxoSnapshot
//!   │           estimate_fee ──── selection + dust/fee classification
//!   │           build ─────────── final re-check + execution
//!   │
//!   └── WalletBackend (opaque chain collaborator)
//!         └── BdkBackend (feature `bdk`): BIP84 descriptors,
//!             bdk_file_store persistence, Electrum sync
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use btcwallet::{Network, WalletConfig, WalletManager};
//!
//! let manager = WalletManager::new(
//!     WalletConfig::default()
//!         .with_network(Network::Signet)
//!         .with_fee_rate(3),
//! );
//! manager.login("abandon abandon ... about").await?;
//! manager.sync().await?;
//!
//! manager.set_address(Some("tb1q..."));
//! let validation = manager.set_amount(Some("0.0001"));
//! if validation.is_valid() {
//!     let record = manager.send().await?;
//!     println!("sent: {}", record.hash);
//! }
//! ```
//!
//! Every failure is a [`WalletError`]; `Unavailable` means "sync not
//! ready" and surfaces as a pending state, never as an error.

pub mod amount;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod mnemonic;
pub mod send;
pub mod session;
pub mod store;

pub use amount::{format_btc, parse_btc};
pub use backend::{
    ScriptKind, SpendableUtxo, SyncState, UtxoSnapshot, WalletBackend, WalletBalance,
};
#[cfg(feature = "bdk")]
pub use backend::BdkBackend;
pub use config::{Network, WalletConfig, DEFAULT_FEE_RATE_SAT_VB};
pub use error::{WalletError, WalletResult};
pub use mnemonic::{PickerState, WordPicker};
pub use send::{
    SendRequest, SendValidator, SpendableRange, TransactionRecord, Validation,
};
pub use session::{BackendFactory, WalletEvent, WalletManager, WalletState};
pub use store::Settings;
