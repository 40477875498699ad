//! Transaction building - the final validation pass plus execution.

use bitcoin::{Address, Amount, FeeRate};
use serde::{Deserialize, Serialize};

use crate::amount::format_btc;
use crate::backend::{ScriptKind, WalletBackend};
use crate::error::{WalletError, WalletResult};
use crate::send::range::{max_spendable, min_spendable};

/// A fully validated send, consumed exactly once.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub destination: Address,
    pub amount: Amount,
    pub fee_rate: FeeRate,
}

/// Outcome of a successful send. `hash` is the display-order txid hex
/// (the network's big-endian convention); `amount` is the formatted
/// send value, fee not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub amount: String,
}

/// Execute a send against the backend.
///
/// The range is re-checked here against a fresh snapshot: the UTXO set
/// may have moved since the UI validated, so earlier results are not
/// trusted. Backend signing/broadcast failures come back as `Build`.
pub fn build(backend: &dyn WalletBackend, request: SendRequest) -> WalletResult<TransactionRecord> {
    let kind = ScriptKind::of(&request.destination)
        .ok_or_else(|| WalletError::InvalidAddress("unsupported script type".into()))?;
    let snapshot = backend.utxo_snapshot().ok_or(WalletError::Unavailable)?;

    let minimum = min_spendable(kind);
    if request.amount < minimum {
        return Err(WalletError::Dust { minimum });
    }
    let maximum = max_spendable(&snapshot, kind, request.fee_rate)
        .ok_or(WalletError::InsufficientFunds { maximum: Amount::ZERO })?;
    if request.amount > maximum {
        return Err(WalletError::InsufficientFunds { maximum });
    }

    let txid = backend.send(&request.destination, request.amount, request.fee_rate)?;
    Ok(TransactionRecord {
        hash: txid.to_string(),
        amount: format_btc(request.amount),
    })
}
