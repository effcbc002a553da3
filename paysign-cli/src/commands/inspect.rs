//! Inspect command - show certificate details

use anyhow::{Context, Result};
use std::path::Path;

use paysign_lib::PlatformCertificate;

use super::read_text;
use crate::ui;

pub fn run(path: &Path, _verbose: bool) -> Result<()> {
    let pem = read_text(path)?;
    let cert = PlatformCertificate::from_pem(&pem)
        .with_context(|| format!("Invalid certificate {}", path.display()))?;
    let now = chrono::Utc::now().timestamp();

    ui::header("Platform Certificate");
    ui::key_value("Serial", cert.serial_no());
    if let Some(subject) = cert.subject() {
        ui::key_value("Subject", subject);
    }
    ui::key_value("Not before", &ui::timestamp(cert.not_before()));
    ui::key_value("Not after", &ui::timestamp(cert.not_after()));

    if cert.is_expired_at(now) {
        ui::warning("Certificate has expired");
    } else if !cert.is_valid_at(now) {
        ui::warning("Certificate is not valid yet");
    } else {
        let days = (cert.not_after() - now) / 86_400;
        ui::success(&format!("Certificate is valid ({days} days left)"));
    }
    Ok(())
}
