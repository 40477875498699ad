//! Decimal BTC ⇄ satoshi conversion. Pure, no I/O.
//!
//! Parsing accepts both `.` and `,` as the decimal separator (amount
//! fields are fed from locale-dependent keyboards). Digits past the
//! eighth fractional place are rounded half-up. Formatting always emits
//! exactly eight fractional digits, so `parse_btc(format_btc(a)) == a`
//! for every valid amount.

use bitcoin::Amount;

use crate::error::{WalletError, WalletResult};

/// Satoshis per bitcoin.
pub const COIN: u64 = 100_000_000;

const FRACTION_DIGITS: u32 = 8;

/// Parse a decimal BTC string into satoshis.
///
/// Fails with `InvalidAmount` on anything malformed, negative, or above
/// the supply cap. An empty fractional or integer part is allowed
/// (`"5."`, `".5"`), an empty string is not.
pub fn parse_btc(text: &str) -> WalletResult<Amount> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(WalletError::InvalidAmount);
    }

    let (int_part, frac_part) = match normalized.split_once('.') {
        Some((i, f)) => (i, f),
        None => (normalized.as_str(), ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WalletError::InvalidAmount);
    }
    // Rejects signs, exponents, grouping and a second separator.
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(WalletError::InvalidAmount);
    }

    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| WalletError::InvalidAmount)?
    };

    let mut frac_sats: u64 = 0;
    let mut digits = frac_part.bytes();
    for _ in 0..FRACTION_DIGITS {
        let d = digits.next().map(|b| (b - b'0') as u64).unwrap_or(0);
        frac_sats = frac_sats * 10 + d;
    }
    // Half-up on the first dropped digit.
    if let Some(b) = digits.next() {
        if b >= b'5' {
            frac_sats += 1;
        }
    }

    let sats = whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac_sats))
        .ok_or(WalletError::InvalidAmount)?;
    if sats > Amount::MAX_MONEY.to_sat() {
        return Err(WalletError::InvalidAmount);
    }
    Ok(Amount::from_sat(sats))
}

/// Format satoshis as a decimal BTC string with eight fractional digits.
pub fn format_btc(amount: Amount) -> String {
    let sats = amount.to_sat();
    format!("{}.{:08}", sats / COIN, sats % COIN)
}
