//! Banking console profile.
//!
//! The console shows a start-up menu:
//!
//! ```text
//! ===== Banking System =====
//! 1. Login
//! 2. Register
//! 3. Exit
//! Choose an option:
//! ```
//!
//! and, once logged in, an account menu:
//!
//! ```text
//! Welcome to Simple Banking App - Logged in as: alice
//! 1. Deposit
//! 2. Withdraw
//! 3. List Transactions
//! 4. Logout
//! 5. Exit Application
//! Please choose an option:
//! ```

use std::sync::LazyLock;

use super::definition::{Budgets, ConsoleProfile, MenuChoices, PromptPatterns, Prompts};
use super::phrases::Phrases;

static PROMPTS: LazyLock<Prompts> =
    LazyLock::new(|| Prompts::compile(&PromptPatterns::default()).unwrap());

/// Create the banking console profile.
pub fn profile() -> ConsoleProfile {
    ConsoleProfile {
        name: "banking".to_string(),
        menu: MenuChoices::default(),
        patterns: PromptPatterns::default(),
        prompts: PROMPTS.clone(),
        phrases: Phrases::default(),
        budgets: Budgets::default(),
        amount_precision: 2,
        search_depth: 1000,
    }
}
