//! Console profiles.
//!
//! A profile is the data side of scripting a console program: menu option
//! numbers, prompt patterns, the phrases that decide success or failure,
//! and read budgets. The banking profile is built in; any part of it can be
//! overridden from configuration.

mod banking;
mod definition;
mod phrases;

pub use definition::{
    Budgets, ConsoleProfile, MenuChoices, ProfileOverrides, PromptPatterns, Prompts,
};
pub use phrases::{
    Phrases, Verdict, classify_authentication, classify_contains, contains_any, contains_literal,
};
