//! Console profile: everything the scripts need to know about one console
//! program's dialogue.

use std::fmt;
use std::time::Duration;

use regex::bytes::Regex;
use serde::Deserialize;

use super::phrases::Phrases;
use crate::channel::ReadBudget;
use crate::error::ConfigError;

/// Menu option numbers typed at the console's menus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MenuChoices {
    /// Start-up menu: log in.
    pub login: String,

    /// Start-up menu: register a new user.
    pub register: String,

    /// Start-up menu: leave the program.
    pub exit: String,

    /// Post-login menu entries.
    pub deposit: String,
    pub withdraw: String,
    pub list_transactions: String,
    pub logout: String,

    /// Post-login menu: leave the program without going back to the start-up menu.
    pub quit: String,
}

impl Default for MenuChoices {
    fn default() -> Self {
        Self {
            login: "1".into(),
            register: "2".into(),
            exit: "3".into(),
            deposit: "1".into(),
            withdraw: "2".into(),
            list_transactions: "3".into(),
            logout: "4".into(),
            quit: "5".into(),
        }
    }
}

/// Prompt patterns as written in configuration.
///
/// Patterns are matched against the tail of sanitized output, so most of
/// them are anchored with `\s*$`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PromptPatterns {
    pub start_menu: String,
    pub account_menu: String,

    /// Either menu; used when the outcome of a step decides which one follows.
    pub any_menu: String,

    pub username: String,
    pub password: String,
    pub amount: String,
}

impl Default for PromptPatterns {
    fn default() -> Self {
        Self {
            start_menu: r"Choose an option:\s*$".into(),
            account_menu: r"Please choose an option:\s*$".into(),
            any_menu: r"[Cc]hoose an option:\s*$".into(),
            username: r"[Uu]sername:\s*$".into(),
            password: r"[Pp]assword:\s*$".into(),
            amount: r"Enter amount to \w+:\s*$".into(),
        }
    }
}

/// Compiled prompt patterns.
#[derive(Debug, Clone)]
pub struct Prompts {
    pub start_menu: Regex,
    pub account_menu: Regex,
    pub any_menu: Regex,
    pub username: Regex,
    pub password: Regex,
    pub amount: Regex,
}

impl Prompts {
    /// Compile a set of prompt patterns.
    pub fn compile(patterns: &PromptPatterns) -> Result<Self, regex::Error> {
        Ok(Self {
            start_menu: Regex::new(&patterns.start_menu)?,
            account_menu: Regex::new(&patterns.account_menu)?,
            any_menu: Regex::new(&patterns.any_menu)?,
            username: Regex::new(&patterns.username)?,
            password: Regex::new(&patterns.password)?,
            amount: Regex::new(&patterns.amount)?,
        })
    }
}

/// Read budgets in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Budgets {
    /// First read after launch (the start-up menu).
    pub startup_ms: u64,

    /// Waiting for an input prompt.
    pub prompt_ms: u64,

    /// Waiting for the result of an action.
    pub result_ms: u64,

    /// Discarding stale output before a session script.
    pub drain_ms: u64,

    /// Silence after output that ends a read early.
    pub quiet_ms: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            startup_ms: 3000,
            prompt_ms: 1000,
            result_ms: 2000,
            drain_ms: 50,
            quiet_ms: 150,
        }
    }
}

impl Budgets {
    fn budget(&self, timeout_ms: u64) -> ReadBudget {
        ReadBudget::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(self.quiet_ms.min(timeout_ms)),
        )
    }

    pub fn startup(&self) -> ReadBudget {
        self.budget(self.startup_ms)
    }

    pub fn prompt(&self) -> ReadBudget {
        self.budget(self.prompt_ms)
    }

    pub fn result(&self) -> ReadBudget {
        self.budget(self.result_ms)
    }

    pub fn drain(&self) -> ReadBudget {
        self.budget(self.drain_ms)
    }
}

/// Partial profile read from configuration; unset sections keep the
/// profile's values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    pub name: Option<String>,
    pub menu: Option<MenuChoices>,
    pub prompts: Option<PromptPatterns>,
    pub phrases: Option<Phrases>,
    pub budgets: Option<Budgets>,
    pub amount_precision: Option<usize>,
    pub search_depth: Option<usize>,
}

/// Dialogue definition for one console program.
#[derive(Clone)]
pub struct ConsoleProfile {
    /// Profile name (e.g., "banking").
    pub name: String,

    pub menu: MenuChoices,

    /// Source patterns of `prompts`.
    pub patterns: PromptPatterns,

    pub prompts: Prompts,

    pub phrases: Phrases,

    pub budgets: Budgets,

    /// Decimal places used when typing amounts.
    pub amount_precision: usize,

    /// Trailing bytes searched for prompt patterns.
    pub search_depth: usize,
}

impl ConsoleProfile {
    /// Create a profile from prompt patterns, with default menus, phrases and budgets.
    pub fn new(name: impl Into<String>, patterns: PromptPatterns) -> Result<Self, regex::Error> {
        let prompts = Prompts::compile(&patterns)?;
        Ok(Self {
            name: name.into(),
            menu: MenuChoices::default(),
            patterns,
            prompts,
            phrases: Phrases::default(),
            budgets: Budgets::default(),
            amount_precision: 2,
            search_depth: 1000,
        })
    }

    /// Set the menu option numbers.
    pub fn with_menu(mut self, menu: MenuChoices) -> Self {
        self.menu = menu;
        self
    }

    /// Set the phrase sets.
    pub fn with_phrases(mut self, phrases: Phrases) -> Self {
        self.phrases = phrases;
        self
    }

    /// Set the read budgets.
    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    /// Add a phrase that marks a withdrawal as refused.
    pub fn with_withdraw_veto(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.withdraw_veto.push(phrase.into());
        self
    }

    /// Add a phrase that marks a login as refused.
    pub fn with_auth_failure(mut self, phrase: impl Into<String>) -> Self {
        self.phrases.auth_failure.push(phrase.into());
        self
    }

    /// Set the number of decimals typed for amounts.
    pub fn with_amount_precision(mut self, precision: usize) -> Self {
        self.amount_precision = precision;
        self
    }

    /// Set the prompt search depth.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Apply configuration overrides, recompiling prompts if they changed.
    pub fn with_overrides(mut self, overrides: ProfileOverrides) -> Result<Self, ConfigError> {
        if let Some(name) = overrides.name {
            self.name = name;
        }
        if let Some(menu) = overrides.menu {
            self.menu = menu;
        }
        if let Some(patterns) = overrides.prompts {
            self.prompts = Prompts::compile(&patterns).map_err(|e| ConfigError::Invalid {
                message: format!("prompt pattern: {}", e),
            })?;
            self.patterns = patterns;
        }
        if let Some(phrases) = overrides.phrases {
            self.phrases = phrases;
        }
        if let Some(budgets) = overrides.budgets {
            if budgets.startup_ms == 0 || budgets.prompt_ms == 0 || budgets.result_ms == 0 {
                return Err(ConfigError::Invalid {
                    message: "read budgets must be greater than zero".into(),
                });
            }
            self.budgets = budgets;
        }
        if let Some(precision) = overrides.amount_precision {
            self.amount_precision = precision;
        }
        if let Some(depth) = overrides.search_depth {
            self.search_depth = depth;
        }
        Ok(self)
    }

    /// Render an amount the way it is typed at the console.
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{:.*}", self.amount_precision, amount)
    }
}

impl ConsoleProfile {
    /// The built-in banking console profile.
    pub fn banking() -> Self {
        super::banking::profile()
    }
}

impl Default for ConsoleProfile {
    fn default() -> Self {
        super::banking::profile()
    }
}

impl fmt::Debug for ConsoleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleProfile")
            .field("name", &self.name)
            .field("menu", &self.menu)
            .field("patterns", &self.patterns)
            .field("budgets", &self.budgets)
            .field("amount_precision", &self.amount_precision)
            .field("search_depth", &self.search_depth)
            .finish_non_exhaustive()
    }
}
