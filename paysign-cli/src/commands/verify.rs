//! Verify command - check a platform response signature

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use paysign_lib::{
    PlatformCertificate, PlatformCertificateStore, ResponseVerifier, SignInfo, SignatureAlgorithm,
};

use super::{read_input, read_text};
use crate::ui;

#[derive(Args)]
pub struct VerifyArgs {
    /// Trusted platform certificate (PEM); repeat for several
    #[arg(long = "cert", required_unless_present = "public_key")]
    pub certs: Vec<PathBuf>,

    /// Trusted platform public key (PEM), used in public-key mode with --public-key-id
    #[arg(long, requires = "public_key_id")]
    pub public_key: Option<PathBuf>,

    /// Key id the platform names the public key by
    #[arg(long)]
    pub public_key_id: Option<String>,

    /// Wechatpay-Timestamp header
    #[arg(long)]
    pub timestamp: i64,

    /// Wechatpay-Nonce header
    #[arg(long)]
    pub nonce: String,

    /// Wechatpay-Signature header
    #[arg(long)]
    pub signature: String,

    /// Wechatpay-Serial header
    #[arg(long)]
    pub serial: String,

    /// File with the exact response body ('-' for stdin)
    #[arg(long)]
    pub body: PathBuf,

    /// Clock-skew tolerance in seconds
    #[arg(long, default_value_t = 300, env = "PAYSIGN_CLOCK_SKEW_SECS")]
    pub skew: u64,

    /// Verify as of this epoch time instead of now
    #[arg(long)]
    pub at: Option<i64>,

    /// Signature algorithm
    #[arg(long, default_value = "SHA256-RSA2048", env = "PAYSIGN_ALGORITHM")]
    pub algorithm: String,
}

pub fn run(args: VerifyArgs, verbose: bool) -> Result<()> {
    let mut certificates = Vec::new();
    for path in &args.certs {
        let pem = read_text(path)?;
        let cert = PlatformCertificate::from_pem(&pem)
            .with_context(|| format!("Invalid certificate {}", path.display()))?;
        certificates.push(cert);
    }
    if let (Some(path), Some(id)) = (&args.public_key, &args.public_key_id) {
        let pem = read_text(path)?;
        certificates.push(PlatformCertificate::from_public_key_pem(id, &pem, 0, i64::MAX)?);
    }

    let store = PlatformCertificateStore::with_certificates(certificates)?;
    tracing::debug!(serials = ?store.serials(), "loaded trusted certificates");
    let algorithm: SignatureAlgorithm = args
        .algorithm
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let verifier = ResponseVerifier::new(Arc::new(store))
        .with_tolerance(args.skew)
        .with_algorithm(algorithm);

    let body = read_input(&args.body)?;
    let sign_info = SignInfo::new(args.timestamp, args.nonce, args.signature, args.serial);
    let now = args.at.unwrap_or_else(|| chrono::Utc::now().timestamp());

    if verbose {
        ui::header("Response");
        ui::key_value("Serial", &sign_info.platform_serial_no);
        ui::key_value("Timestamp", &ui::timestamp(sign_info.timestamp));
        ui::key_value("Verified at", &ui::timestamp(now));
        ui::key_value("Body bytes", &body.len().to_string());
        println!();
    }

    match verifier.verify_response_at(&sign_info, &body, now) {
        Ok(()) => {
            ui::success("Signature verified");
            Ok(())
        }
        Err(err) => {
            ui::error(&format!("{err} (code {})", err.code() as i32));
            if err.suggests_certificate_refresh() {
                ui::info("Refresh the platform certificates and try again");
            }
            bail!("verification failed")
        }
    }
}
