//! Conversion between numeric amounts and their display strings.
//!
//! The display form groups whole units in threes with a space and carries a
//! fixed currency suffix: `12500` renders as `"12 500 ₸"`. Balances are stored
//! numerically; these strings exist only at the presentation boundary.

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use std::str::FromStr;

/// Currency suffix appended to every rendered amount.
pub const CURRENCY_SUFFIX: &str = "₸";

/// Parses a display string back into an amount.
///
/// Every character other than ASCII digits, `-` and `.` is discarded first,
/// so group separators (including non-breaking spaces) and the currency
/// suffix are ignored.
///
/// # Errors
///
/// Returns [`LedgerError::Format`] when no digits remain or the remainder is
/// not a number (e.g. `"1.2.3"`).
pub fn parse(display: &str) -> Result<Amount> {
    let cleaned: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(LedgerError::Format {
            input: display.to_string(),
        });
    }

    Amount::from_str(&cleaned).map_err(|_| LedgerError::Format {
        input: display.to_string(),
    })
}

/// Renders the magnitude of `amount` in whole units.
///
/// The sign is dropped and any fraction truncated; callers round before
/// formatting and add a sign themselves where it matters (see [`format_signed`]).
pub fn format(amount: Amount) -> String {
    let whole = amount.abs().trunc().trimmed();
    format!("{} {}", group_thousands(&whole), CURRENCY_SUFFIX)
}

/// Renders a balance, prefixing `-` for negative values.
pub fn format_signed(amount: Amount) -> String {
    let body = format(amount);
    if amount.trunc().is_negative() {
        format!("-{body}")
    } else {
        body
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}
