//! Paysign CLI
//!
//! Sign platform API requests, verify platform responses and inspect
//! certificates from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "paysign")]
#[command(about = "Sign payment platform API requests and verify signed responses", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce an Authorization header for a request
    Sign(commands::sign::SignArgs),

    /// Verify a platform response or callback signature
    Verify(commands::verify::VerifyArgs),

    /// Show serial number and validity of a platform certificate
    InspectCert {
        /// PEM certificate file
        path: std::path::PathBuf,
    },

    /// Decrypt an AEAD_AES_256_GCM resource or notification
    Decrypt(commands::decrypt::DecryptArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("paysign_cli=debug,paysign_lib=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("paysign_cli=info,paysign_lib=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Sign(args) => commands::sign::run(args, cli.verbose),
        Commands::Verify(args) => commands::verify::run(args, cli.verbose),
        Commands::InspectCert { path } => commands::inspect::run(&path, cli.verbose),
        Commands::Decrypt(args) => commands::decrypt::run(args, cli.verbose),
    }
}
