//! Send engine - spendable bounds, fees, validation, execution.
//!
//! The hard part of the wallet: fixed-point arithmetic over satoshis,
//! dust and fee-rate reasoning, and a consistent error taxonomy.
//!
//! ```text
//! UI events (address / amount / send)
//!     │
//!     ▼
//! SendValidator ──► spendable_range ──► estimate_fee
//!     │                    │
//!     │              UtxoSnapshot (from WalletBackend)
//!     ▼
//! build(SendRequest) ──► WalletBackend::send ──► TransactionRecord
//! ```
//!
//! Every computation is a pure function of the current snapshot and
//! fee rate; nothing is cached between input changes.

mod build;
pub mod fee;
pub mod range;
mod validate;

pub use build::{build, SendRequest, TransactionRecord};
pub use fee::{dust_threshold, estimate_fee, fee_for_weight};
pub use range::{max_spendable, min_spendable, spendable_range, SpendableRange};
pub use validate::{SendValidator, SpendContext, Validation};
