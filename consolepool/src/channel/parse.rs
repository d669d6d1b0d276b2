//! Structured values recovered from sanitized console text.
//!
//! Parsers never fail: text that doesn't match yields a default value and
//! a warning in the log.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use log::warn;
use regex::Regex;

static BALANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Current Balance: \$([0-9]+\.?[0-9]*)").unwrap());

static ANY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([0-9]+\.?[0-9]*)").unwrap());

static TIMESTAMPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})\] ([^:\n]+): \$([0-9]+\.?[0-9]*)")
        .unwrap()
});

static UNTIMESTAMPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Deposit|Withdrawal) of \$([0-9]+\.?[0-9]*)").unwrap());

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of a transaction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Other(String),
}

impl TransactionKind {
    fn from_label(label: &str) -> Self {
        match label.trim() {
            "Deposit" => TransactionKind::Deposit,
            "Withdrawal" => TransactionKind::Withdrawal,
            other => TransactionKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "Deposit"),
            TransactionKind::Withdrawal => write!(f, "Withdrawal"),
            TransactionKind::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One transaction record recovered from a history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub amount: f64,

    /// Console-local time, when the listing carried one.
    pub timestamp: Option<NaiveDateTime>,
}

/// Extract the balance from `Current Balance: $<amount>`, falling back to
/// the first `$<amount>` in the text, then to 0.0.
pub fn parse_balance(text: &str) -> f64 {
    let captured = BALANCE
        .captures(text)
        .or_else(|| ANY_AMOUNT.captures(text))
        .and_then(|caps| caps.get(1));

    match captured {
        Some(m) => m.as_str().parse().unwrap_or_else(|_| {
            warn!("unparsable balance amount '{}'", m.as_str());
            0.0
        }),
        None => {
            warn!("no balance found in output ({} bytes)", text.len());
            0.0
        }
    }
}

/// Extract transaction records, one per matching line.
///
/// Lines in the `[yyyy-MM-dd HH:mm:ss] <Type>: $<amount>` form carry a
/// timestamp; lines in the `<Type> of $<amount>` form do not.
pub fn parse_transactions(text: &str) -> Vec<Transaction> {
    let mut transactions = Vec::new();

    for line in text.lines() {
        if let Some(caps) = TIMESTAMPED.captures(line) {
            let Ok(amount) = caps[3].parse::<f64>() else {
                warn!("skipping transaction with bad amount: {}", line);
                continue;
            };
            let timestamp = NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT)
                .map_err(|e| warn!("bad transaction timestamp '{}': {}", &caps[1], e))
                .ok();
            transactions.push(Transaction {
                kind: TransactionKind::from_label(&caps[2]),
                amount,
                timestamp,
            });
        } else if let Some(caps) = UNTIMESTAMPED.captures(line) {
            let Ok(amount) = caps[2].parse::<f64>() else {
                warn!("skipping transaction with bad amount: {}", line);
                continue;
            };
            transactions.push(Transaction {
                kind: TransactionKind::from_label(&caps[1]),
                amount,
                timestamp: None,
            });
        }
    }

    transactions
}
