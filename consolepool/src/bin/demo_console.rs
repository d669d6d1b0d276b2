//! A small interactive banking console.
//!
//! This is the kind of program consolepool wraps: numbered text menus on
//! stdout, one answer per line on stdin, no framing. The integration tests
//! and the example drive it through the pool.
//!
//! ```text
//! demo-console [--store <path>] [--color]
//! ```
//!
//! Users are kept in the JSON file given by `--store` (in memory when
//! omitted). `--color` decorates the welcome line with ANSI colour even
//! when `NO_COLOR` is set.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transaction {
    kind: String,
    amount: f64,
    timestamp: NaiveDateTime,
}

impl Transaction {
    fn now(kind: &str, amount: f64) -> Self {
        Self {
            kind: kind.to_string(),
            amount,
            timestamp: Local::now().naive_local(),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: ${:.2}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind,
            self.amount
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Account {
    balance: f64,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct User {
    password: String,
    account: Account,
}

struct Store {
    path: Option<PathBuf>,
    users: BTreeMap<String, User>,
}

impl Store {
    fn open(path: Option<PathBuf>) -> Self {
        let mut users = BTreeMap::new();
        if let Some(path) = path.as_ref().filter(|p| p.exists()) {
            match fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
            {
                Ok(loaded) => {
                    users = loaded;
                    println!("Loaded {} users from storage.", users.len());
                }
                Err(e) => eprintln!("Error loading user data: {}", e),
            }
        }
        Self { path, users }
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string_pretty(&self.users)
            .map_err(io::Error::other)
            .and_then(|json| {
                // Write then rename so a concurrent reader never sees a partial file
                let tmp = path.with_extension("tmp");
                fs::write(&tmp, json)?;
                fs::rename(&tmp, path)
            });
        match result {
            Ok(()) => println!("Saved {} users to storage.", self.users.len()),
            Err(e) => eprintln!("Error saving user data: {}", e),
        }
    }
}

enum Flow {
    Continue,
    /// Leave through the start menu.
    Exit,
    /// Leave immediately (account menu option 5, or end of input).
    Quit,
}

struct Console<R> {
    input: R,
    store: Store,
    current: Option<String>,
    color: bool,
}

impl<R: BufRead> Console<R> {
    fn run(&mut self) {
        loop {
            let flow = match self.current.clone() {
                None => self.start_menu(),
                Some(username) => self.account_menu(&username),
            };
            match flow {
                Flow::Continue => {}
                Flow::Exit => {
                    println!("Thank you for using the Banking System!");
                    return;
                }
                Flow::Quit => return,
            }
        }
    }

    fn prompt(&self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        }
    }

    /// `Ok(None)` is an unparsable answer, already reported.
    fn read_choice(&mut self) -> Result<Option<i32>, Flow> {
        let line = self.read_line().ok_or(Flow::Quit)?;
        match line.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => {
                println!("Invalid input. Please enter a number.");
                Ok(None)
            }
        }
    }

    fn read_amount(&mut self) -> Result<f64, Flow> {
        let line = self.read_line().ok_or(Flow::Quit)?;
        match line.trim().parse() {
            Ok(amount) => Ok(amount),
            Err(_) => {
                println!("Invalid amount. Please enter a number.");
                Ok(-1.0)
            }
        }
    }

    fn start_menu(&mut self) -> Flow {
        println!("\n===== Banking System =====");
        println!("1. Login");
        println!("2. Register");
        println!("3. Exit");
        self.prompt("Choose an option: ");

        let choice = match self.read_choice() {
            Ok(Some(choice)) => choice,
            Ok(None) => return Flow::Continue,
            Err(flow) => return flow,
        };
        let outcome = match choice {
            1 => self.login(),
            2 => self.register(),
            3 => return Flow::Exit,
            _ => {
                println!("Invalid option. Please try again.");
                Ok(())
            }
        };
        match outcome {
            Ok(()) => Flow::Continue,
            Err(flow) => flow,
        }
    }

    fn login(&mut self) -> Result<(), Flow> {
        self.prompt("Username: ");
        let username = self.read_line().ok_or(Flow::Quit)?;
        self.prompt("Password: ");
        let password = self.read_line().ok_or(Flow::Quit)?;

        let valid = self
            .store
            .users
            .get(&username)
            .is_some_and(|user| user.password == password);
        if !valid {
            println!("Authentication failed. Invalid username or password.");
            return Ok(());
        }

        let welcome = format!("Welcome, {}!", username);
        if self.color {
            println!("\x1B[1;32m{}\x1B[0m", welcome);
        } else {
            println!("{}", welcome);
        }
        self.current = Some(username);
        Ok(())
    }

    fn register(&mut self) -> Result<(), Flow> {
        self.prompt("New username: ");
        let username = self.read_line().ok_or(Flow::Quit)?;
        self.prompt("New password: ");
        let password = self.read_line().ok_or(Flow::Quit)?;

        if self.store.users.contains_key(&username) {
            println!("Username already exists. Please choose another one.");
            return Ok(());
        }
        self.store.users.insert(
            username,
            User {
                password,
                account: Account::default(),
            },
        );
        self.store.save();
        println!("Registration successful! You can now login.");
        Ok(())
    }

    fn account_menu(&mut self, username: &str) -> Flow {
        println!(
            "\nWelcome to Simple Banking App - Logged in as: {}",
            username
        );
        println!("1. Deposit");
        println!("2. Withdraw");
        println!("3. List Transactions");
        println!("4. Logout");
        println!("5. Exit Application");
        self.prompt("Please choose an option: ");

        let choice = match self.read_choice() {
            Ok(Some(choice)) => choice,
            Ok(None) => return Flow::Continue,
            Err(flow) => return flow,
        };
        let outcome = match choice {
            1 => self.deposit(username),
            2 => self.withdraw(username),
            3 => {
                self.list_transactions(username);
                Ok(())
            }
            4 => {
                self.current = None;
                println!("Logged out successfully.");
                Ok(())
            }
            5 => return Flow::Quit,
            _ => {
                println!("Invalid option. Please try again.");
                Ok(())
            }
        };
        match outcome {
            Ok(()) => Flow::Continue,
            Err(flow) => flow,
        }
    }

    fn account(&mut self, username: &str) -> Option<&mut Account> {
        self.store.users.get_mut(username).map(|u| &mut u.account)
    }

    fn deposit(&mut self, username: &str) -> Result<(), Flow> {
        self.prompt("Enter amount to deposit: ");
        let amount = self.read_amount()?;
        if amount.is_nan() || amount <= 0.0 {
            println!("Deposit amount must be positive.");
            return Ok(());
        }
        if let Some(account) = self.account(username) {
            account.balance += amount;
            account.transactions.push(Transaction::now("Deposit", amount));
            println!("Successfully deposited ${:?}", amount);
            println!("Current Balance: ${:?}", account.balance);
            self.store.save();
        }
        Ok(())
    }

    fn withdraw(&mut self, username: &str) -> Result<(), Flow> {
        self.prompt("Enter amount to withdraw: ");
        let amount = self.read_amount()?;
        if amount.is_nan() || amount <= 0.0 {
            println!("Withdrawal amount must be positive.");
            return Ok(());
        }
        if let Some(account) = self.account(username) {
            if amount > account.balance {
                println!("Insufficient funds. Current balance: ${:?}", account.balance);
                return Ok(());
            }
            account.balance -= amount;
            account
                .transactions
                .push(Transaction::now("Withdrawal", amount));
            println!("Successfully withdrew ${:?}", amount);
            println!("Current Balance: ${:?}", account.balance);
            self.store.save();
        }
        Ok(())
    }

    fn list_transactions(&mut self, username: &str) {
        let Some(account) = self.account(username) else {
            return;
        };
        if account.transactions.is_empty() {
            println!("No transactions to display.");
            return;
        }
        println!("\n===== Transaction History =====");
        for transaction in &account.transactions {
            println!("{}", transaction);
        }
        println!("Current Balance: ${:?}", account.balance);
    }
}

fn main() {
    let mut store = None;
    let mut force_color = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--store" => store = args.next().map(PathBuf::from),
            "--color" => force_color = true,
            other => {
                eprintln!("unknown argument: {}", other);
                std::process::exit(2);
            }
        }
    }

    let color = force_color || std::env::var_os("NO_COLOR").is_none();
    let mut console = Console {
        input: io::stdin().lock(),
        store: Store::open(store),
        current: None,
        color,
    };
    console.run();
}
