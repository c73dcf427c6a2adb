//! Command-line interface.
//!
//! Without a subcommand the binary starts the server. Subcommands work on the
//! database directly:
//! - `seed-staff` - Create one staff account from flags or `ADMIN_*` env vars
//! - `seed-all-staff` - Create the three default development accounts
//! - `list-staff` - Show staff accounts
//! - `config check` - Validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::db::{self, seed_staff_user, DbPool, SeedOutcome, StaffRole, StaffUser, DEFAULT_STAFF};

#[derive(Parser, Debug)]
#[command(name = "defrost")]
#[command(author, version, about = "Storefront, POS and back-office API for DeFrost Clothing", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "defrost.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a staff account
    SeedStaff {
        #[arg(long, env = "ADMIN_EMAIL")]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
        #[arg(long, env = "ADMIN_NAME", default_value = "Admin User")]
        name: String,
        /// admin, manager or cashier
        #[arg(long, env = "ADMIN_ROLE", default_value = "admin")]
        role: String,
    },

    /// Create the default admin, manager and cashier accounts
    SeedAllStaff,

    /// List staff accounts
    ListStaff,

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::SeedStaff {
            email,
            password,
            name,
            role,
        }) => cmd_seed_staff(cli, email, password, name, role).await,
        Some(Commands::SeedAllStaff) => cmd_seed_all_staff(cli).await,
        Some(Commands::ListStaff) => cmd_list_staff(cli).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

/// Open the configured database, creating the data directory if needed
pub async fn open_database(config: &Config) -> Result<DbPool> {
    if config.database.url.is_none() {
        std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.server.data_dir.display()
            )
        })?;
    }
    db::connect(&config.database_url(), 5).await
}

fn report_seed(outcome: &SeedOutcome) {
    match outcome {
        SeedOutcome::Created(user) => {
            println!("[OK] Created {} account: {}", user.role, user.email);
        }
        SeedOutcome::AlreadyExists(user) => {
            println!("[--] {} already exists ({}), left unchanged", user.email, user.role);
        }
    }
}

async fn cmd_seed_staff(cli: &Cli, email: &str, password: &str, name: &str, role: &str) -> Result<()> {
    let role: StaffRole = role.parse().map_err(|_| {
        let valid: Vec<String> = StaffRole::ALL.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("Invalid role '{}'. Must be one of: {}", role, valid.join(", "))
    })?;
    if email.trim().is_empty() || password.is_empty() {
        anyhow::bail!("Email and password are required");
    }

    let config = Config::load(&cli.config)?;
    let pool = open_database(&config).await?;
    let outcome = seed_staff_user(&pool, email, password, name, role).await?;
    report_seed(&outcome);
    Ok(())
}

async fn cmd_seed_all_staff(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = open_database(&config).await?;

    for (email, password, name, role) in DEFAULT_STAFF {
        let outcome = seed_staff_user(&pool, email, password, name, role).await?;
        report_seed(&outcome);
    }

    println!();
    println!("Default passwords are for development only. Change them before going live.");
    Ok(())
}

async fn cmd_list_staff(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = open_database(&config).await?;

    let staff: Vec<StaffUser> = sqlx::query_as("SELECT * FROM admin_users ORDER BY role, email")
        .fetch_all(&pool)
        .await?;

    if staff.is_empty() {
        println!("No staff accounts found. Run `defrost seed-staff` to create one.");
        return Ok(());
    }

    println!();
    println!(
        "{:<32} {:<24} {:<10} {:<8} {}",
        "EMAIL", "NAME", "ROLE", "ACTIVE", "LAST LOGIN"
    );
    println!("{}", "-".repeat(100));
    for user in &staff {
        println!(
            "{:<32} {:<24} {:<10} {:<8} {}",
            user.email,
            user.name.as_deref().unwrap_or("-"),
            user.role,
            if user.is_active { "yes" } else { "no" },
            user.last_login.as_deref().unwrap_or("never"),
        );
    }
    println!();
    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "Enabled"
    } else {
        "Disabled"
    }
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To create a custom configuration, copy defrost.example.toml to defrost.toml");
        return Ok(());
    }

    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    match Config::parse(&content) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  Port:         {}", config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!("  Static Dir:   {}", config.server.static_dir.display());
            println!("  Database:     {}", config.database_url());
            println!();
            println!("Auth:");
            println!("  Session Days: {}", config.auth.session_max_age_days);
            println!("  Secure Cookies: {}", enabled(config.auth.secure_cookies));
            println!("  Google Sign-in: {}", enabled(config.auth.google.is_some()));
            println!("  Rate Limiting: {}", enabled(config.rate_limit.enabled));
            println!();
            println!("Email:");
            println!("  SMTP:         {}", enabled(config.email.is_configured()));
            println!();

            let mut warnings = Vec::new();
            if config.auth.secret.is_empty() && std::env::var(crate::config::SECRET_ENV).is_err() {
                warnings.push("No session secret set - sessions will not survive a restart");
            }
            if !config.email.is_configured() {
                warnings.push("SMTP not configured - verification codes will not be emailed");
            }
            if config.auth.expose_verification_code {
                warnings.push("expose_verification_code is on - never enable this in production");
            }
            if !config.auth.secure_cookies {
                warnings.push("secure_cookies is off - enable it when serving over HTTPS");
            }

            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  [!] {}", warning);
                }
                println!();
            }

            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            println!("Please check the configuration file syntax and try again.");
            anyhow::bail!("Invalid configuration file");
        }
    }
}
