//! Channel layer: line I/O, output reading, sanitizing and parsing.
//!
//! The console program gives no end-of-message marker, so reads are
//! bounded by a deadline and ended early by a prompt pattern or a quiet
//! period after a burst of output.

mod buffer;
mod console;
mod parse;
mod sanitize;

pub use buffer::OutputBuffer;
pub use console::{ConsoleChannel, ReadBudget, ReadOutput};
pub use parse::{Transaction, TransactionKind, parse_balance, parse_transactions};
pub use sanitize::{Sanitizer, normalize, sanitize};
