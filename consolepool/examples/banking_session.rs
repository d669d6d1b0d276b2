//! Session example: register, log in and move money through a pooled console
//!
//! This example drives the bundled `demo-console` program (or any console
//! with the same menus) through a full session.
//!
//! # Usage
//!
//! ```bash
//! cargo build --bin demo-console
//! cargo run --example banking_session -- --program target/debug/demo-console
//! ```
//!
//! Pass `--config <file>` to load a JSON service configuration instead.

use std::env;
use std::path::PathBuf;

use consolepool::{Credentials, ServiceBuilder, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for per-step output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let builder = match &args.config {
        Some(path) => ServiceBuilder::from_config(ServiceConfig::from_json_file(path)?),
        None => {
            let store = env::temp_dir()
                .join("consolepool-example-users.json")
                .display()
                .to_string();
            ServiceBuilder::new(&args.program).args(["--store", store.as_str()])
        }
    };
    let service = builder.build().await?;

    // Registration fails harmlessly when the user already exists
    let registered = service.register(&args.user, &args.password).await?;
    println!("register {}: {}", args.user, registered.success);

    let Some(session) = service
        .login(Credentials::new(&args.user, &args.password))
        .await?
    else {
        eprintln!("Login rejected for {}", args.user);
        service.shutdown().await;
        std::process::exit(1);
    };
    let id = session.id();
    println!("session {} established", id);

    let deposit = service.deposit(id, 50.0).await?;
    println!("deposit 50.00: {}", deposit.success);

    let withdraw = service.withdraw(id, 20.0).await?;
    println!("withdraw 20.00: {}", withdraw.success);

    let refused = service.withdraw(id, 1_000_000.0).await?;
    println!(
        "withdraw 1000000.00: {} (matched {:?})",
        refused.success, refused.matched
    );

    if let Some(balance) = service.balance(id).await? {
        println!("balance: ${:.2}", balance);
    }

    if let Some(history) = service.history(id).await? {
        println!("\n{} transactions", history.len());
        println!("{}", "-".repeat(50));
        for t in history {
            let when = t
                .timestamp
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<20} {:<12} {:>10.2}", when, t.kind.to_string(), t.amount);
        }
        println!("{}", "-".repeat(50));
    }

    let stats = service.pool_stats();
    println!(
        "\npool: {} processes ({} healthy, {} idle)",
        stats.total, stats.healthy, stats.idle
    );

    service.logout(id).await;
    service.shutdown().await;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    program: PathBuf,
    config: Option<PathBuf>,
    user: String,
    password: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut program = PathBuf::from("target/debug/demo-console");
        let mut config = None;
        let mut user = "alice".to_string();
        let mut password = "pw1".to_string();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--program" => {
                    i += 1;
                    if i < args.len() {
                        program = PathBuf::from(&args[i]);
                    }
                }
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = Some(PathBuf::from(&args[i]));
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = args[i].clone();
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            program,
            config,
            user,
            password,
        }
    }

    fn print_help() {
        println!(
            r#"consolepool banking_session example

USAGE:
    cargo run --example banking_session -- [OPTIONS]

OPTIONS:
    --program <PATH>         Console program [default: target/debug/demo-console]
    -c, --config <FILE>      JSON service configuration (overrides --program)
    -u, --user <USER>        Username [default: alice]
    -P, --password <PASS>    Password [default: pw1]
    --help                   Print this help message
"#
        );
    }
}
