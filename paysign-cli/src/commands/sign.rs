//! Sign command - produce an Authorization header

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use paysign_lib::{CredentialStore, HttpMethod, RequestSigner, SignatureAlgorithm};

use super::{read_input, read_text};
use crate::ui;

#[derive(Args)]
pub struct SignArgs {
    /// Merchant id (mchid)
    #[arg(long, env = "PAYSIGN_MCHID")]
    pub mchid: String,

    /// Serial number of the merchant API certificate
    #[arg(long, env = "PAYSIGN_SERIAL")]
    pub serial: String,

    /// Merchant private key (PEM, PKCS#8 or PKCS#1)
    #[arg(long, env = "PAYSIGN_KEY_FILE")]
    pub key: PathBuf,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Request URL or path, including the query string
    #[arg(long)]
    pub url: String,

    /// File with the exact request body ('-' for stdin)
    #[arg(long)]
    pub body: Option<PathBuf>,

    /// Signature algorithm
    #[arg(long, default_value = "SHA256-RSA2048", env = "PAYSIGN_ALGORITHM")]
    pub algorithm: String,

    /// Credential scheme
    #[arg(long, default_value = paysign_lib::config::DEFAULT_SCHEME, env = "PAYSIGN_SCHEME")]
    pub scheme: String,

    /// Fixed timestamp instead of the current time
    #[arg(long, requires = "nonce")]
    pub timestamp: Option<i64>,

    /// Fixed nonce instead of a random one
    #[arg(long, requires = "timestamp")]
    pub nonce: Option<String>,
}

pub fn run(args: SignArgs, verbose: bool) -> Result<()> {
    let method: HttpMethod = args.method.to_ascii_uppercase().parse()?;
    let algorithm: SignatureAlgorithm = args
        .algorithm
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let key_pem = read_text(&args.key)?;
    let credentials = CredentialStore::new(&args.mchid, &args.serial, &key_pem)
        .context("Failed to load merchant key")?;
    tracing::debug!(key = %args.key.display(), "loaded merchant key");
    let body = match &args.body {
        Some(path) => read_input(path)?,
        None => Vec::new(),
    };

    let signer = RequestSigner::new(credentials)
        .with_algorithm(algorithm)
        .with_scheme(&args.scheme);
    let auth = match (args.timestamp, args.nonce.as_deref()) {
        (Some(timestamp), Some(nonce)) => {
            signer.authorize_with(method, &args.url, &body, timestamp, nonce)?
        }
        _ => signer.authorize(method, &args.url, &body)?,
    };

    if verbose {
        ui::header("Signed Request");
        ui::key_value("Method", method.as_str());
        ui::key_value("Path", &paysign_lib::signer::canonical_path(&args.url)?);
        ui::key_value("Timestamp", &auth.timestamp.to_string());
        ui::key_value("Nonce", &auth.nonce);
        ui::key_value("Body bytes", &body.len().to_string());
        println!();
    }
    println!("{}", auth.to_header_value());
    Ok(())
}
