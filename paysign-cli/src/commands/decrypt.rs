//! Decrypt command - open an AEAD_AES_256_GCM resource

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use paysign_lib::{Notification, ResourceDecryptor};

use super::read_input;
use crate::ui;

#[derive(Args)]
pub struct DecryptArgs {
    /// Environment variable holding the API v3 key
    #[arg(long, default_value = "PAYSIGN_API_V3_KEY")]
    pub api_key_env: String,

    /// Notification body to decrypt ('-' for stdin)
    #[arg(long, conflicts_with_all = ["nonce", "aad", "ciphertext"])]
    pub notification: Option<PathBuf>,

    /// Resource nonce
    #[arg(long, requires = "ciphertext")]
    pub nonce: Option<String>,

    /// Associated data
    #[arg(long, default_value = "")]
    pub aad: String,

    /// Base64 ciphertext
    #[arg(long, requires = "nonce")]
    pub ciphertext: Option<String>,
}

pub fn run(args: DecryptArgs, verbose: bool) -> Result<()> {
    let key = std::env::var(&args.api_key_env)
        .with_context(|| format!("Environment variable {} is not set", args.api_key_env))?;
    let decryptor = ResourceDecryptor::new(key.as_bytes())?;

    if let Some(path) = &args.notification {
        let body = read_input(path)?;
        let notification = Notification::from_json(&body)?;
        if verbose {
            ui::header("Notification");
            ui::key_value("Id", &notification.id);
            ui::key_value("Event", &notification.event_type);
            ui::key_value("Created", &notification.create_time);
            ui::warning("Signature not checked; run 'paysign verify' on the raw body first");
            println!();
        }
        println!("{}", notification.decrypt(&decryptor)?.plaintext);
        return Ok(());
    }

    let (Some(nonce), Some(ciphertext)) = (&args.nonce, &args.ciphertext) else {
        bail!("either --notification or --nonce with --ciphertext is required");
    };
    let plaintext = decryptor.decrypt_raw(nonce.as_bytes(), args.aad.as_bytes(), ciphertext)?;
    println!("{}", String::from_utf8(plaintext).context("Plaintext is not UTF-8")?);
    Ok(())
}
