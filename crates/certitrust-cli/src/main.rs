// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CertiTrust: issue PDFs with a signed QR proof stamp and verify them.
//
// Entry point. Initialises logging, loads configuration, and dispatches to
// the command handlers.

mod commands;
mod data_dir;

use std::path::PathBuf;
use std::process::ExitCode;

use certitrust_core::error::{CertiTrustError, Result};
use certitrust_core::types::Verdict;
use clap::{Parser, Subcommand};
use serde::Serialize;

use commands::Context;

/// CertiTrust document authenticity toolchain.
#[derive(Parser, Debug)]
#[command(name = "certitrust", version, about)]
struct Cli {
    /// Configuration file (JSON). Defaults to `config.json` in the data
    /// directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the audit database and default config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an issuer key pair.
    Keygen {
        /// Where to write the private key.
        #[arg(long)]
        out: PathBuf,
        /// Seal the key with the passphrase held in this environment variable.
        #[arg(long)]
        passphrase_env: Option<String>,
    },
    /// Sign and stamp a PDF.
    Issue {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Verify a stamped PDF or a photo of one. Prints the result as JSON.
    Verify {
        document: PathBuf,
        /// Scan or photo of the printed first page.
        #[arg(long)]
        page_image: Option<PathBuf>,
    },
    /// Inspect the audit chain.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuditAction {
    /// Recompute every entry hash from genesis.
    Verify,
    /// List entries for one document, or the most recent entries.
    List {
        #[arg(long)]
        document: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

// Exit codes for `verify`; errors exit with 1.
const EXIT_SUSPECT: u8 = 2;
const EXIT_REJECTED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("certitrust: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let context = || -> Result<Context> {
        let ctx = Context::load(cli.config.as_deref(), cli.data_dir.clone())?;
        tracing::info!(data_dir = %ctx.data_dir.display(), "configuration loaded");
        Ok(ctx)
    };

    match cli.command {
        Commands::Keygen {
            out,
            passphrase_env,
        } => {
            let passphrase = match passphrase_env {
                Some(var) => Some(
                    std::env::var(&var)
                        .map_err(|_| CertiTrustError::MissingSecret(format!("environment variable {var}")))?,
                ),
                None => None,
            };
            print_json(&commands::keygen(&out, passphrase)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Issue { input, output } => {
            let issued = commands::issue(&context()?, &input, &output).await?;
            print_json(&issued.proof)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify {
            document,
            page_image,
        } => {
            let result = commands::verify(&context()?, &document, page_image.as_deref()).await?;
            print_json(&result)?;
            Ok(match result.verdict {
                Verdict::Verified => ExitCode::SUCCESS,
                Verdict::Suspect(_) => ExitCode::from(EXIT_SUSPECT),
                Verdict::Rejected(_) => ExitCode::from(EXIT_REJECTED),
            })
        }
        Commands::Audit {
            action: AuditAction::Verify,
        } => {
            let report = commands::audit_verify(&context()?)?;
            print_json(&report)?;
            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Audit {
            action: AuditAction::List { document, limit },
        } => {
            let entries = commands::audit_list(&context()?, document.as_deref(), limit)?;
            print_json(&entries)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
