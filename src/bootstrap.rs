//! Operator-console provisioning of the genesis credential.
//!
//! The plaintext goes to the console writer exactly once and nowhere else;
//! tracing only ever sees the record metadata.

use std::io::Write;

use chrono::Utc;

use crate::authority::issuer::PatIssuer;
use crate::errors::AppError;
use crate::models::token::PatSummary;

#[derive(Debug)]
pub enum BootstrapOutcome {
    Issued(PatSummary),
    /// A bootstrap record already exists; it was left untouched.
    AlreadyBootstrapped,
}

pub async fn provision<W: Write>(issuer: &PatIssuer, console: &mut W) -> Result<BootstrapOutcome, AppError> {
    match issuer.issue_bootstrap().await {
        Ok(issued) => {
            let summary = issued.pat.summary_at(Utc::now());
            let expiry = summary
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());

            let banner = "=".repeat(72);
            writeln!(console, "{}", banner).map_err(console_err)?;
            writeln!(console, "  BOOTSTRAP PERSONAL ACCESS TOKEN (shown once, store it now)").map_err(console_err)?;
            writeln!(console, "{}", banner).map_err(console_err)?;
            writeln!(console, "  Token:    {}", issued.token.expose()).map_err(console_err)?;
            writeln!(console, "  ID:       {}", summary.id).map_err(console_err)?;
            writeln!(console, "  Scope:    {}", summary.scope).map_err(console_err)?;
            writeln!(console, "  Expires:  {}", expiry).map_err(console_err)?;
            writeln!(console, "{}", banner).map_err(console_err)?;
            console.flush().map_err(console_err)?;

            tracing::info!(pat_id = %summary.id, "bootstrap PAT displayed on console");
            Ok(BootstrapOutcome::Issued(summary))
        }
        Err(AppError::AlreadyBootstrapped) => {
            writeln!(console, "Bootstrap PAT already exists; nothing to do.").map_err(console_err)?;
            tracing::info!("bootstrap skipped: credential already exists");
            Ok(BootstrapOutcome::AlreadyBootstrapped)
        }
        Err(e) => {
            tracing::error!(error = %e, "bootstrap provisioning failed");
            Err(e)
        }
    }
}

fn console_err(e: std::io::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(e).context("writing to operator console"))
}
