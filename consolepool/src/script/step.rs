//! Script steps and the builder used to assemble them.
//!
//! A script is plain data: a list of [`Step`]s interpreted by
//! [`run`](super::run). Adding an operation means writing a new list, not
//! new control flow.

use std::fmt;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use crate::channel::ReadBudget;

use super::transcript::HIDDEN_INPUT;

/// One step of a script.
///
/// `Debug` output masks hidden lines the same way the transcript does.
#[derive(Clone)]
pub enum Step {
    /// Write a line to the console. Hidden lines are masked in records and logs.
    Send { line: String, hidden: bool },

    /// Read output until `until` matches, the output goes quiet, or the
    /// budget runs out. Labelled reads are kept in the transcript.
    Read {
        label: Option<String>,
        budget: ReadBudget,
        until: Option<BytesRegex>,
    },

    /// Discard output left over from an earlier script.
    Drain { budget: ReadBudget },

    /// Check a labelled output. On failure the rest of the script is
    /// replaced by `otherwise` and the transcript is marked aborted.
    Expect {
        label: String,
        check: Check,
        otherwise: Vec<Step>,
    },

    /// Extract a structured value from a labelled output.
    Parse { label: String, field: Field },
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Send { line, hidden } => {
                let shown = if *hidden { HIDDEN_INPUT } else { line.as_str() };
                f.debug_struct("Send")
                    .field("line", &shown)
                    .field("hidden", hidden)
                    .finish()
            }
            Step::Read {
                label,
                budget,
                until,
            } => f
                .debug_struct("Read")
                .field("label", label)
                .field("budget", budget)
                .field("until", until)
                .finish(),
            Step::Drain { budget } => f.debug_struct("Drain").field("budget", budget).finish(),
            Step::Expect {
                label,
                check,
                otherwise,
            } => f
                .debug_struct("Expect")
                .field("label", label)
                .field("check", check)
                .field("otherwise", otherwise)
                .finish(),
            Step::Parse { label, field } => f
                .debug_struct("Parse")
                .field("label", label)
                .field("field", field)
                .finish(),
        }
    }
}

/// Condition evaluated by [`Step::Expect`].
#[derive(Debug, Clone)]
pub enum Check {
    /// The output matches a pattern.
    Pattern(Regex),

    /// The output contains any of these phrases (case-insensitive).
    ContainsAny(Vec<String>),

    /// The output classifies as a successful login for `username`.
    Authenticated { username: String },
}

/// Value extracted by [`Step::Parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Balance,
    Transactions,
}

/// Builder for scripts.
///
/// # Example
///
/// ```rust
/// use consolepool::profile::ConsoleProfile;
/// use consolepool::script::{Field, ScriptBuilder};
///
/// let profile = ConsoleProfile::banking();
/// let steps = ScriptBuilder::new()
///     .send(&profile.menu.list_transactions)
///     .read_until("history", profile.budgets.result(), &profile.prompts.account_menu)
///     .parse("history", Field::Balance)
///     .build();
///
/// assert_eq!(steps.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    steps: Vec<Step>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a line.
    pub fn send(mut self, line: impl Into<String>) -> Self {
        self.steps.push(Step::Send {
            line: line.into(),
            hidden: false,
        });
        self
    }

    /// Send a line that must not appear in logs (like a password).
    pub fn send_hidden(mut self, line: impl Into<String>) -> Self {
        self.steps.push(Step::Send {
            line: line.into(),
            hidden: true,
        });
        self
    }

    /// Read and keep the output under `label`.
    pub fn read(mut self, label: impl Into<String>, budget: ReadBudget) -> Self {
        self.steps.push(Step::Read {
            label: Some(label.into()),
            budget,
            until: None,
        });
        self
    }

    /// Read until a prompt and keep the output under `label`.
    pub fn read_until(
        mut self,
        label: impl Into<String>,
        budget: ReadBudget,
        until: &BytesRegex,
    ) -> Self {
        self.steps.push(Step::Read {
            label: Some(label.into()),
            budget,
            until: Some(until.clone()),
        });
        self
    }

    /// Read until a prompt and discard the output.
    pub fn skip_until(mut self, budget: ReadBudget, until: &BytesRegex) -> Self {
        self.steps.push(Step::Read {
            label: None,
            budget,
            until: Some(until.clone()),
        });
        self
    }

    /// Read and discard whatever arrives within the budget.
    pub fn skip(mut self, budget: ReadBudget) -> Self {
        self.steps.push(Step::Read {
            label: None,
            budget,
            until: None,
        });
        self
    }

    /// Discard stale output.
    pub fn drain(mut self, budget: ReadBudget) -> Self {
        self.steps.push(Step::Drain { budget });
        self
    }

    /// Check a labelled output; on failure run `otherwise` instead of the rest.
    pub fn expect(mut self, label: impl Into<String>, check: Check, otherwise: Vec<Step>) -> Self {
        self.steps.push(Step::Expect {
            label: label.into(),
            check,
            otherwise,
        });
        self
    }

    /// Parse a labelled output into a field of the same name.
    pub fn parse(mut self, label: impl Into<String>, field: Field) -> Self {
        self.steps.push(Step::Parse {
            label: label.into(),
            field,
        });
        self
    }

    /// Append pre-built steps.
    pub fn extend(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn build(self) -> Vec<Step> {
        self.steps
    }
}
