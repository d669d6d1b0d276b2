//! Operation scripts for the banking console.
//!
//! Credentialed operations run against a fresh process: they validate the
//! start-up menu, log in, do their work, then log out and exit so the
//! process ends on its own. Session operations assume the process is
//! parked at the account menu by an earlier [`Login`] and leave it there.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::step::{Check, Field, ScriptBuilder, Step};
use super::transcript::Transcript;
use crate::channel::Transaction;
use crate::profile::{ConsoleProfile, Verdict, classify_contains, contains_literal};

/// Output label of the start-up menu read.
pub const MENU: &str = "menu";

/// Output label of the login result read.
pub const AUTH: &str = "auth";

/// Output label of a deposit, withdrawal or registration result.
pub const RESULT: &str = "result";

/// Output label of the transaction listing.
pub const HISTORY: &str = "history";

/// A script plus the classifier that turns its transcript into a result.
pub trait Operation: Send + Sync {
    type Output: Send;

    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// The steps to run.
    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step>;

    /// Interpret the transcript. Negative business outcomes are values, not errors.
    fn classify(&self, transcript: &Transcript, profile: &ConsoleProfile) -> Self::Output;

    /// Whether the script starts at the account menu of a logged-in process.
    fn needs_login(&self) -> bool {
        false
    }
}

/// Username and password for the console's login prompt.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// How an account operation reaches the account menu.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Log in on a fresh process, then log out and exit afterwards.
    Credentialed(Credentials),

    /// The process is already logged in and stays that way.
    Session,
}

/// Exit from the start-up menu.
fn exit_from_start_menu(profile: &ConsoleProfile) -> Vec<Step> {
    ScriptBuilder::new()
        .send(&profile.menu.exit)
        .skip(profile.budgets.result())
        .build()
}

/// Read the start-up menu and bail out unless it looks like one.
pub fn start_menu(profile: &ConsoleProfile, markers: &[String]) -> Vec<Step> {
    ScriptBuilder::new()
        .read_until(MENU, profile.budgets.startup(), &profile.prompts.start_menu)
        .expect(
            MENU,
            Check::ContainsAny(markers.to_vec()),
            exit_from_start_menu(profile),
        )
        .build()
}

/// Log in from the start-up menu. A rejected login exits the program.
pub fn login(profile: &ConsoleProfile, credentials: &Credentials) -> Vec<Step> {
    ScriptBuilder::new()
        .send(&profile.menu.login)
        .skip_until(profile.budgets.prompt(), &profile.prompts.username)
        .send(&credentials.username)
        .skip_until(profile.budgets.prompt(), &profile.prompts.password)
        .send_hidden(credentials.password())
        .read_until(AUTH, profile.budgets.result(), &profile.prompts.any_menu)
        .expect(
            AUTH,
            Check::Authenticated {
                username: credentials.username.clone(),
            },
            exit_from_start_menu(profile),
        )
        .build()
}

/// Validate the start-up menu, then log in.
pub fn authenticate(profile: &ConsoleProfile, credentials: &Credentials) -> Vec<Step> {
    ScriptBuilder::new()
        .extend(start_menu(profile, &profile.phrases.start_menu))
        .extend(login(profile, credentials))
        .build()
}

/// Log out from the account menu, then exit from the start-up menu.
pub fn logout_and_exit(profile: &ConsoleProfile) -> Vec<Step> {
    ScriptBuilder::new()
        .send(&profile.menu.logout)
        .skip_until(profile.budgets.prompt(), &profile.prompts.start_menu)
        .send(&profile.menu.exit)
        .skip(profile.budgets.result())
        .build()
}

fn with_mode(mode: &Mode, profile: &ConsoleProfile, body: Vec<Step>) -> Vec<Step> {
    match mode {
        Mode::Credentialed(credentials) => ScriptBuilder::new()
            .extend(authenticate(profile, credentials))
            .extend(body)
            .extend(logout_and_exit(profile))
            .build(),
        Mode::Session => ScriptBuilder::new()
            .drain(profile.budgets.drain())
            .extend(body)
            .build(),
    }
}

/// Create a new console user.
#[derive(Debug, Clone)]
pub struct Register {
    pub credentials: Credentials,
}

impl Register {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Operation for Register {
    type Output = Verdict;

    fn name(&self) -> &'static str {
        "register"
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        ScriptBuilder::new()
            .extend(start_menu(profile, &profile.phrases.registration_menu))
            .send(&profile.menu.register)
            .skip_until(profile.budgets.prompt(), &profile.prompts.username)
            .send(&self.credentials.username)
            .skip_until(profile.budgets.prompt(), &profile.prompts.password)
            .send_hidden(self.credentials.password())
            .read_until(RESULT, profile.budgets.result(), &profile.prompts.start_menu)
            .send(&profile.menu.exit)
            .skip(profile.budgets.result())
            .build()
    }

    fn classify(&self, transcript: &Transcript, profile: &ConsoleProfile) -> Verdict {
        if transcript.is_aborted() {
            return Verdict::failed(None);
        }
        match contains_literal(&transcript.full_output, &profile.phrases.registration_success) {
            Some(phrase) => Verdict::succeeded(phrase.clone()),
            None => Verdict::failed(None),
        }
    }
}

/// Check credentials on a fresh process, then log out and exit.
#[derive(Debug, Clone)]
pub struct Authenticate {
    pub credentials: Credentials,
}

impl Authenticate {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Operation for Authenticate {
    type Output = Verdict;

    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        ScriptBuilder::new()
            .extend(authenticate(profile, &self.credentials))
            .extend(logout_and_exit(profile))
            .build()
    }

    fn classify(&self, transcript: &Transcript, _profile: &ConsoleProfile) -> Verdict {
        transcript.verdict(AUTH)
    }
}

/// Log in and leave the process at the account menu for later session
/// operations.
#[derive(Debug, Clone)]
pub struct Login {
    pub credentials: Credentials,
}

impl Login {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Operation for Login {
    type Output = Verdict;

    fn name(&self) -> &'static str {
        "login"
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        authenticate(profile, &self.credentials)
    }

    fn classify(&self, transcript: &Transcript, _profile: &ConsoleProfile) -> Verdict {
        transcript.verdict(AUTH)
    }
}

/// Deposit an amount.
#[derive(Debug, Clone)]
pub struct Deposit {
    pub amount: f64,
    pub mode: Mode,
}

impl Deposit {
    pub fn in_session(amount: f64) -> Self {
        Self {
            amount,
            mode: Mode::Session,
        }
    }

    pub fn credentialed(credentials: Credentials, amount: f64) -> Self {
        Self {
            amount,
            mode: Mode::Credentialed(credentials),
        }
    }
}

impl Operation for Deposit {
    type Output = Verdict;

    fn name(&self) -> &'static str {
        "deposit"
    }

    fn needs_login(&self) -> bool {
        matches!(self.mode, Mode::Session)
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        let body = ScriptBuilder::new()
            .send(&profile.menu.deposit)
            .skip_until(profile.budgets.prompt(), &profile.prompts.amount)
            .send(profile.format_amount(self.amount))
            .read_until(RESULT, profile.budgets.result(), &profile.prompts.account_menu)
            .build();
        with_mode(&self.mode, profile, body)
    }

    fn classify(&self, transcript: &Transcript, profile: &ConsoleProfile) -> Verdict {
        if transcript.is_aborted() {
            return Verdict::failed(None);
        }
        classify_contains(
            transcript.output(RESULT),
            &profile.phrases.deposit_success,
            &[],
            "deposit",
        )
    }
}

/// Withdraw an amount. Refused withdrawals are failed verdicts.
#[derive(Debug, Clone)]
pub struct Withdraw {
    pub amount: f64,
    pub mode: Mode,
}

impl Withdraw {
    pub fn in_session(amount: f64) -> Self {
        Self {
            amount,
            mode: Mode::Session,
        }
    }

    pub fn credentialed(credentials: Credentials, amount: f64) -> Self {
        Self {
            amount,
            mode: Mode::Credentialed(credentials),
        }
    }
}

impl Operation for Withdraw {
    type Output = Verdict;

    fn name(&self) -> &'static str {
        "withdraw"
    }

    fn needs_login(&self) -> bool {
        matches!(self.mode, Mode::Session)
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        let body = ScriptBuilder::new()
            .send(&profile.menu.withdraw)
            .skip_until(profile.budgets.prompt(), &profile.prompts.amount)
            .send(profile.format_amount(self.amount))
            .read_until(RESULT, profile.budgets.result(), &profile.prompts.account_menu)
            .build();
        with_mode(&self.mode, profile, body)
    }

    fn classify(&self, transcript: &Transcript, profile: &ConsoleProfile) -> Verdict {
        if transcript.is_aborted() {
            return Verdict::failed(None);
        }
        classify_contains(
            transcript.output(RESULT),
            &profile.phrases.withdraw_success,
            &profile.phrases.withdraw_veto,
            "withdrawal",
        )
    }
}

fn list_transactions(profile: &ConsoleProfile, field: Field) -> Vec<Step> {
    ScriptBuilder::new()
        .send(&profile.menu.list_transactions)
        .read_until(HISTORY, profile.budgets.result(), &profile.prompts.account_menu)
        .parse(HISTORY, field)
        .build()
}

/// Read the current balance from the transaction listing.
///
/// `None` means the account menu was never reached (rejected login or an
/// unexpected start-up screen). An unparsable listing gives `Some(0.0)`.
#[derive(Debug, Clone)]
pub struct Balance {
    pub mode: Mode,
}

impl Balance {
    pub fn in_session() -> Self {
        Self {
            mode: Mode::Session,
        }
    }

    pub fn credentialed(credentials: Credentials) -> Self {
        Self {
            mode: Mode::Credentialed(credentials),
        }
    }
}

impl Operation for Balance {
    type Output = Option<f64>;

    fn name(&self) -> &'static str {
        "balance"
    }

    fn needs_login(&self) -> bool {
        matches!(self.mode, Mode::Session)
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        with_mode(&self.mode, profile, list_transactions(profile, Field::Balance))
    }

    fn classify(&self, transcript: &Transcript, _profile: &ConsoleProfile) -> Option<f64> {
        if transcript.is_aborted() {
            return None;
        }
        transcript.balance(HISTORY)
    }
}

/// Read the transaction history.
#[derive(Debug, Clone)]
pub struct History {
    pub mode: Mode,
}

impl History {
    pub fn in_session() -> Self {
        Self {
            mode: Mode::Session,
        }
    }

    pub fn credentialed(credentials: Credentials) -> Self {
        Self {
            mode: Mode::Credentialed(credentials),
        }
    }
}

impl Operation for History {
    type Output = Option<Vec<Transaction>>;

    fn name(&self) -> &'static str {
        "history"
    }

    fn needs_login(&self) -> bool {
        matches!(self.mode, Mode::Session)
    }

    fn steps(&self, profile: &ConsoleProfile) -> Vec<Step> {
        with_mode(
            &self.mode,
            profile,
            list_transactions(profile, Field::Transactions),
        )
    }

    fn classify(
        &self,
        transcript: &Transcript,
        _profile: &ConsoleProfile,
    ) -> Option<Vec<Transaction>> {
        if transcript.is_aborted() {
            return None;
        }
        transcript.transactions(HISTORY).map(<[Transaction]>::to_vec)
    }
}
