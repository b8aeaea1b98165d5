//! TrumpProof CLI - replay scenarios, verify ledgers, inspect receipts
//!
//! # Quick Start
//!
//! ```bash
//! # Replay every acceptance scenario against a fresh kernel
//! trumpproof all
//!
//! # Replay one scenario, JSON output
//! trumpproof --json scenario GODEL
//!
//! # Walk a persisted ledger's hash chain
//! trumpproof verify data/ledger.jsonl
//!
//! # Check a single receipt, or digest a payload
//! trumpproof inspect receipt.json
//! trumpproof digest '{"amount": 1}'
//! ```
//!
//! Every command exits non-zero when what it checks does not hold.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trumpproof_kernel::{KernelConfig, LoggingConfig};

mod commands;
mod display;

use commands::{ledger, receipt, scenario};

/// TrumpProof - receipts-native verification kernel
#[derive(Parser)]
#[command(name = "trumpproof")]
#[command(author = "TrumpProof Contributors")]
#[command(version)]
#[command(about = "Every fact validated, hash-chained, latency-bounded and policy-checked", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one built-in acceptance scenario
    Scenario {
        /// Scenario name (e.g. BASELINE, GODEL, LEDGER_ROLLBACK)
        name: String,
    },

    /// Replay every built-in acceptance scenario
    All,

    /// List the built-in scenarios
    List,

    /// Verify the hash chain of a JSONL ledger file
    Verify {
        /// Ledger file, one receipt per line
        ledger: String,
    },

    /// Inspect and verify a single receipt
    Inspect {
        /// Receipt JSON (file path or inline)
        receipt: String,
    },

    /// Compute the dual digest of a JSON payload
    Digest {
        /// Payload JSON (file path or inline)
        payload: String,

        /// Check the payload against this digest instead of printing one
        #[arg(long)]
        expect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = KernelConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    match cli.command {
        Commands::Scenario { name } => scenario::run_one(&name, cli.json).await?,
        Commands::All => scenario::run_all(cli.json).await?,
        Commands::List => scenario::list(cli.json)?,
        Commands::Verify { ledger } => ledger::verify_ledger(&ledger, cli.json)?,
        Commands::Inspect { receipt } => receipt::inspect(&receipt, cli.json)?,
        Commands::Digest { payload, expect } => receipt::digest(&payload, expect.as_deref(), cli.json)?,
    }

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["trumpproof", "scenario", "GODEL", "--json", "-c", "trumpproof.toml"]);
        assert!(cli.json);
        assert_eq!(cli.config.as_deref(), Some("trumpproof.toml"));
        assert!(matches!(cli.command, Commands::Scenario { ref name } if name == "GODEL"));
    }

    #[test]
    fn test_digest_takes_optional_expectation() {
        let cli = Cli::parse_from(["trumpproof", "digest", "{}", "--expect", "a:b"]);
        match cli.command {
            Commands::Digest { payload, expect } => {
                assert_eq!(payload, "{}");
                assert_eq!(expect.as_deref(), Some("a:b"));
            }
            _ => panic!("expected digest"),
        }
    }
}
