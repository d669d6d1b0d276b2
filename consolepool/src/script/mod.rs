//! Operation scripts.
//!
//! Each operation is a list of [`Step`]s plus a classifier. One generic
//! runner interprets every script, so the console's menu grammar lives in
//! data built from the [`ConsoleProfile`](crate::profile::ConsoleProfile).

mod operations;
mod runner;
mod step;
mod transcript;

pub use operations::{
    AUTH, Authenticate, Balance, Credentials, Deposit, HISTORY, History, Login, MENU, Mode,
    Operation, RESULT, Register, Withdraw, authenticate, login, logout_and_exit, start_menu,
};
pub use runner::run;
pub use step::{Check, Field, ScriptBuilder, Step};
pub use transcript::{FieldValue, HIDDEN_INPUT, StepRecord, Transcript};
