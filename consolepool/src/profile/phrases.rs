//! Phrase sets and result classifiers.
//!
//! Classification is substring matching against human-readable console
//! text, so the phrase lists are configuration rather than code. When both
//! a success and a failure phrase match, the result is a failure and the
//! verdict is flagged `ambiguous` so callers and logs can see it.

use log::{debug, warn};
use serde::Deserialize;

/// Phrases the classifiers look for. Matching is case-insensitive except
/// for `registration_success`, which is a literal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Phrases {
    /// Markers expected in the start-up menu before logging in.
    pub start_menu: Vec<String>,

    /// Markers expected in the start-up menu before registering.
    pub registration_menu: Vec<String>,

    /// Literal confirmation printed after a successful registration.
    pub registration_success: Vec<String>,

    /// Any of these forces an authentication failure.
    pub auth_failure: Vec<String>,

    /// Any of these indicates a successful login.
    pub auth_success: Vec<String>,

    /// Greeting that counts as success when followed by the username.
    pub auth_welcome: String,

    /// Items only shown in the post-login menu.
    pub post_login_menu: Vec<String>,

    pub deposit_success: Vec<String>,

    pub withdraw_success: Vec<String>,

    /// Any of these forces a withdrawal failure.
    pub withdraw_veto: Vec<String>,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            start_menu: strings(&["login", "choose"]),
            registration_menu: strings(&["register", "choose"]),
            registration_success: strings(&["Registration successful!"]),
            auth_failure: strings(&["invalid", "incorrect", "wrong", "failed", "access denied"]),
            auth_success: strings(&["successful", "logged in"]),
            auth_welcome: "welcome".to_string(),
            post_login_menu: strings(&["deposit", "withdraw", "balance"]),
            deposit_success: strings(&["successfully deposited", "deposit successful"]),
            withdraw_success: strings(&["successfully withdrew", "withdrawal successful"]),
            withdraw_veto: strings(&["insufficient"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub success: bool,

    /// Both success and failure phrases matched.
    pub ambiguous: bool,

    /// The phrase that decided the verdict, if any.
    pub matched: Option<String>,
}

impl Verdict {
    pub fn succeeded(phrase: impl Into<String>) -> Self {
        Self {
            success: true,
            ambiguous: false,
            matched: Some(phrase.into()),
        }
    }

    pub fn failed(phrase: Option<String>) -> Self {
        Self {
            success: false,
            ambiguous: false,
            matched: phrase,
        }
    }

    fn conflicting(failure: String, success: String, what: &str) -> Self {
        warn!(
            "ambiguous {} response: failure phrase '{}' and success phrase '{}' both matched",
            what, failure, success
        );
        Self {
            success: false,
            ambiguous: true,
            matched: Some(failure),
        }
    }
}

/// First phrase contained in `lower` (already lowercased).
fn find_phrase<'a>(lower: &str, phrases: &'a [String]) -> Option<&'a String> {
    phrases.iter().find(|p| lower.contains(&p.to_lowercase()))
}

/// Case-insensitive check that any marker is present.
pub fn contains_any(text: &str, phrases: &[String]) -> bool {
    find_phrase(&text.to_lowercase(), phrases).is_some()
}

/// Case-sensitive check for a literal phrase.
pub fn contains_literal<'a>(text: &str, phrases: &'a [String]) -> Option<&'a String> {
    phrases.iter().find(|p| text.contains(p.as_str()))
}

/// Classify a login response.
///
/// Failure phrases take precedence over success phrases; with neither
/// present the login is treated as failed.
pub fn classify_authentication(text: &str, username: &str, phrases: &Phrases) -> Verdict {
    let lower = text.to_lowercase();
    if lower.trim().is_empty() {
        debug!("empty authentication response");
        return Verdict::failed(None);
    }

    let failure = find_phrase(&lower, &phrases.auth_failure).cloned();

    let welcome = phrases.auth_welcome.to_lowercase();
    let greeted = !welcome.is_empty()
        && !username.is_empty()
        && lower.contains(&welcome)
        && lower.contains(&username.to_lowercase());

    let success = if greeted {
        Some(format!("{} {}", phrases.auth_welcome, username))
    } else {
        find_phrase(&lower, &phrases.auth_success)
            .or_else(|| find_phrase(&lower, &phrases.post_login_menu))
            .cloned()
    };

    match (failure, success) {
        (Some(f), Some(s)) => Verdict::conflicting(f, s, "authentication"),
        (Some(f), None) => Verdict::failed(Some(f)),
        (None, Some(s)) => Verdict::succeeded(s),
        (None, None) => Verdict::failed(None),
    }
}

/// Classify a transaction response: success phrases win unless a veto
/// phrase is present.
pub fn classify_contains(text: &str, success: &[String], veto: &[String], what: &str) -> Verdict {
    let lower = text.to_lowercase();
    let vetoed = find_phrase(&lower, veto).cloned();
    let succeeded = find_phrase(&lower, success).cloned();

    match (vetoed, succeeded) {
        (Some(v), Some(s)) => Verdict::conflicting(v, s, what),
        (Some(v), None) => Verdict::failed(Some(v)),
        (None, Some(s)) => Verdict::succeeded(s),
        (None, None) => Verdict::failed(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_keyword_beats_greeting() {
        let phrases = Phrases::default();
        let verdict = classify_authentication(
            "Welcome back alice... invalid credentials",
            "alice",
            &phrases,
        );
        assert!(!verdict.success);
        assert!(verdict.ambiguous);
        assert_eq!(verdict.matched.as_deref(), Some("invalid"));
    }

    #[test]
    fn test_successful_login_phrase() {
        let phrases = Phrases::default();
        let verdict =
            classify_authentication("Successfully logged in, welcome bob", "bob", &phrases);
        assert!(verdict.success);
        assert!(!verdict.ambiguous);
    }

    #[test]
    fn test_post_login_menu_counts_as_success() {
        let phrases = Phrases::default();
        let text = "\nWelcome to Simple Banking App - Logged in as: carol\n1. Deposit\n2. Withdraw\n";
        assert!(classify_authentication(text, "carol", &phrases).success);
    }

    #[test]
    fn test_console_rejection() {
        let phrases = Phrases::default();
        let text = "Authentication failed. Invalid username or password.\n\n\
                    ===== Banking System =====\n1. Login\n2. Register\n3. Exit\nChoose an option: ";
        let verdict = classify_authentication(text, "mallory", &phrases);
        assert!(!verdict.success);
        assert!(!verdict.ambiguous);
    }

    #[test]
    fn test_no_indicators_defaults_to_failure() {
        let phrases = Phrases::default();
        assert!(!classify_authentication("Username: Password: ", "dave", &phrases).success);
        assert!(!classify_authentication("   ", "dave", &phrases).success);
    }

    #[test]
    fn test_insufficient_funds_always_fails() {
        let phrases = Phrases::default();
        let text = "Insufficient funds. Current balance: $30.0 (withdrawal successful earlier)";
        let verdict = classify_contains(
            text,
            &phrases.withdraw_success,
            &phrases.withdraw_veto,
            "withdrawal",
        );
        assert!(!verdict.success);
        assert!(verdict.ambiguous);
    }

    #[test]
    fn test_withdrawal_success() {
        let phrases = Phrases::default();
        let verdict = classify_contains(
            "Successfully withdrew $20.0\nCurrent Balance: $30.0",
            &phrases.withdraw_success,
            &phrases.withdraw_veto,
            "withdrawal",
        );
        assert_eq!(verdict, Verdict::succeeded("successfully withdrew"));
    }

    #[test]
    fn test_registration_literal_is_case_sensitive() {
        let phrases = Phrases::default();
        assert!(contains_literal("Registration successful! You can now login.", &phrases.registration_success).is_some());
        assert!(contains_literal("registration successful!", &phrases.registration_success).is_none());
    }

    #[test]
    fn test_phrases_override_from_json() {
        let phrases: Phrases =
            serde_json::from_str(r#"{"withdraw_veto": ["insufficient", "limit exceeded"]}"#).unwrap();
        assert_eq!(phrases.withdraw_veto.len(), 2);
        assert_eq!(phrases.auth_welcome, "welcome");
    }
}
