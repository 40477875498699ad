//! Error taxonomy for the wallet core.
//!
//! Every failure is recoverable: validation errors feed the UI as
//! `Validation` values, build-time errors surface once as a terminal
//! message. `Unavailable` means "sync not ready" and is mapped to a
//! pending state by callers, never shown as a hard error.

use bitcoin::Amount;

pub type WalletResult<T> = Result<T, WalletError>;

fn fmt_btc(amount: &Amount) -> String {
    crate::amount::format_btc(*amount)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// Malformed, negative or out-of-range decimal input.
    #[error("invalid amount")]
    InvalidAmount,

    /// Address fails network/script validation.
    #[error("invalid bitcoin address: {0}")]
    InvalidAddress(String),

    /// Amount below the minimum spendable value for the destination.
    #[error("insufficient amount, minimum is {} BTC", fmt_btc(.minimum))]
    Dust { minimum: Amount },

    /// Amount plus required fee exceeds the maximum spendable value.
    #[error("insufficient funds, maximum spendable is {} BTC", fmt_btc(.maximum))]
    InsufficientFunds { maximum: Amount },

    /// UTXO data not ready (no session, or sync in progress).
    #[error("wallet not ready")]
    Unavailable,

    /// Signing or broadcast failure from the chain backend.
    #[error("transaction failed: {0}")]
    Build(String),

    /// Backend lifecycle failure (open, sync, lock).
    #[error("backend error: {0}")]
    Backend(String),

    /// Mnemonic parse or generation failure.
    #[error("mnemonic error: {0}")]
    Mnemonic(String),

    /// Preferences store read/write failure.
    #[error("store error: {0}")]
    Store(String),
}
