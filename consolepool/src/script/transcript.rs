//! Record of one script run.

use std::time::Duration;

use indexmap::IndexMap;

use crate::channel::Transaction;
use crate::profile::Verdict;

/// Mask recorded in place of hidden input.
pub const HIDDEN_INPUT: &str = "********";

/// Structured value produced by a parse step.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Balance(f64),
    Transactions(Vec<Transaction>),
}

/// What happened at one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRecord {
    /// A line was sent (masked if hidden).
    Sent { input: String },

    /// Output was read.
    Received {
        label: Option<String>,
        chars: usize,
        matched: bool,
        timed_out: bool,
        eof: bool,
        elapsed: Duration,
    },

    /// Stale output was discarded.
    Drained { bytes: usize },

    /// A check was evaluated.
    Checked { label: String, passed: bool },

    /// A field was parsed.
    Parsed { label: String },
}

/// Outputs and parsed values of one script run.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Labelled outputs in the order they were read.
    pub outputs: IndexMap<String, String>,

    /// Parsed values, keyed by the label they were parsed from.
    pub fields: IndexMap<String, FieldValue>,

    /// Login verdicts from authentication checks, keyed by label.
    pub verdicts: IndexMap<String, Verdict>,

    /// Every read's output, labelled or not, concatenated.
    pub full_output: String,

    pub steps: Vec<StepRecord>,

    /// Label of the check that failed, if the script took a fallback path.
    pub aborted: Option<String>,

    pub elapsed: Duration,
}

impl Transcript {
    /// Output stored under `label`, or an empty string.
    pub fn output(&self, label: &str) -> &str {
        self.outputs.get(label).map(String::as_str).unwrap_or("")
    }

    /// Parsed balance stored under `label`.
    pub fn balance(&self, label: &str) -> Option<f64> {
        match self.fields.get(label) {
            Some(FieldValue::Balance(amount)) => Some(*amount),
            _ => None,
        }
    }

    /// Parsed transactions stored under `label`.
    pub fn transactions(&self, label: &str) -> Option<&[Transaction]> {
        match self.fields.get(label) {
            Some(FieldValue::Transactions(list)) => Some(list),
            _ => None,
        }
    }

    /// Verdict of the authentication check on `label`; a failure if none ran.
    pub fn verdict(&self, label: &str) -> Verdict {
        self.verdicts.get(label).cloned().unwrap_or_default()
    }

    /// Whether a check failed and the fallback path was taken.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Whether any read hit its hard timeout.
    pub fn any_timed_out(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, StepRecord::Received { timed_out: true, .. }))
    }

    /// Lines sent during the run, hidden ones masked.
    pub fn inputs(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                StepRecord::Sent { input } => Some(input.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_label_is_empty() {
        let transcript = Transcript::default();
        assert_eq!(transcript.output("auth"), "");
        assert_eq!(transcript.balance("history"), None);
        assert!(!transcript.is_aborted());
    }

    #[test]
    fn test_field_accessors() {
        let mut transcript = Transcript::default();
        transcript
            .fields
            .insert("history".into(), FieldValue::Balance(30.0));
        assert_eq!(transcript.balance("history"), Some(30.0));
        assert!(transcript.transactions("history").is_none());
    }

    #[test]
    fn test_inputs_and_timeouts() {
        let transcript = Transcript {
            steps: vec![
                StepRecord::Sent { input: "1".into() },
                StepRecord::Sent {
                    input: HIDDEN_INPUT.into(),
                },
                StepRecord::Received {
                    label: None,
                    chars: 0,
                    matched: false,
                    timed_out: true,
                    eof: false,
                    elapsed: Duration::from_millis(100),
                },
            ],
            ..Default::default()
        };
        assert_eq!(transcript.inputs(), vec!["1", "********"]);
        assert!(transcript.any_timed_out());
    }
}
