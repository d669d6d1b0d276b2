//! The script interpreter.

use std::collections::VecDeque;

use log::{debug, info, trace};
use tokio::time::Instant;

use super::step::{Check, Field, Step};
use super::transcript::{FieldValue, HIDDEN_INPUT, StepRecord, Transcript};
use crate::channel::{ConsoleChannel, parse_balance, parse_transactions};
use crate::error::ChannelError;
use crate::profile::{ConsoleProfile, Verdict, classify_authentication, contains_any};

/// Run a script against a channel.
///
/// Steps run strictly in order. A failed [`Step::Expect`] replaces the
/// remaining steps with its fallback; channel errors end the run. Timed-out
/// reads are not errors, their partial output is kept.
pub async fn run(
    channel: &mut ConsoleChannel,
    profile: &ConsoleProfile,
    steps: Vec<Step>,
) -> Result<Transcript, ChannelError> {
    let start = Instant::now();
    let mut transcript = Transcript::default();
    let mut queue: VecDeque<Step> = steps.into();

    while let Some(step) = queue.pop_front() {
        match step {
            Step::Send { line, hidden } => {
                let shown = if hidden { HIDDEN_INPUT } else { line.as_str() };
                debug!("script: send {:?}", shown);
                channel.send_line(&line).await?;
                transcript.steps.push(StepRecord::Sent {
                    input: shown.to_string(),
                });
            }

            Step::Read {
                label,
                budget,
                until,
            } => {
                let output = channel.read(budget, until.as_ref()).await?;
                debug!(
                    "script: read {} chars (matched={}, timed_out={}, eof={}) in {:?}",
                    output.text.len(),
                    output.matched,
                    output.timed_out,
                    output.eof,
                    output.elapsed
                );
                trace!("script: output {:?}", output.text);

                transcript.full_output.push_str(&output.text);
                transcript.steps.push(StepRecord::Received {
                    label: label.clone(),
                    chars: output.text.len(),
                    matched: output.matched,
                    timed_out: output.timed_out,
                    eof: output.eof,
                    elapsed: output.elapsed,
                });
                if let Some(label) = label {
                    transcript
                        .outputs
                        .entry(label)
                        .or_default()
                        .push_str(&output.text);
                }
            }

            Step::Drain { budget } => {
                let bytes = channel.drain(budget).await?;
                transcript.steps.push(StepRecord::Drained { bytes });
            }

            Step::Expect {
                label,
                check,
                otherwise,
            } => {
                let passed = evaluate(&check, &label, profile, &mut transcript);
                transcript.steps.push(StepRecord::Checked {
                    label: label.clone(),
                    passed,
                });
                if !passed {
                    info!(
                        "script: check on '{}' failed, running {} fallback steps",
                        label,
                        otherwise.len()
                    );
                    if transcript.aborted.is_none() {
                        transcript.aborted = Some(label);
                    }
                    queue = otherwise.into();
                }
            }

            Step::Parse { label, field } => {
                let text = transcript.output(&label);
                let value = match field {
                    Field::Balance => FieldValue::Balance(parse_balance(text)),
                    Field::Transactions => FieldValue::Transactions(parse_transactions(text)),
                };
                transcript.fields.insert(label.clone(), value);
                transcript.steps.push(StepRecord::Parsed { label });
            }
        }
    }

    transcript.elapsed = start.elapsed();
    Ok(transcript)
}

fn evaluate(
    check: &Check,
    label: &str,
    profile: &ConsoleProfile,
    transcript: &mut Transcript,
) -> bool {
    let text = transcript.output(label);
    match check {
        Check::Pattern(pattern) => pattern.is_match(text),
        Check::ContainsAny(phrases) => contains_any(text, phrases),
        Check::Authenticated { username } => {
            let verdict: Verdict = classify_authentication(text, username, &profile.phrases);
            let success = verdict.success;
            transcript.verdicts.insert(label.to_string(), verdict);
            success
        }
    }
}
