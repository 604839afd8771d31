use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};

/// Token authority: PATs, session tokens and request validation
#[derive(Parser)]
#[command(name = "authority", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to AUTH_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Provision the bootstrap PAT before serving
        #[arg(long)]
        bootstrap: bool,
    },

    /// Issue the one-time bootstrap PAT and print it to the console
    Bootstrap,

    /// Manage personal access tokens
    Pat {
        #[command(subcommand)]
        command: PatCommands,
    },
}

#[derive(Subcommand)]
pub enum PatCommands {
    /// Issue a new PAT; the plaintext is printed once
    Create {
        #[arg(long)]
        name: String,
        /// READ_ONLY, WRITE or ADMIN
        #[arg(long, default_value = "READ_ONLY")]
        scope: String,
        /// Days until expiry; omit for a non-expiring token
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List PATs (metadata only)
    List {
        /// ALL, ACTIVE, REVOKED, EXPIRED or BY_CREATOR
        #[arg(long, default_value = "ALL")]
        filter: String,
        /// Principal for BY_CREATOR, e.g. SYSTEM or user:<uuid>
        #[arg(long)]
        created_by: Option<String>,
    },
    /// Revoke a PAT permanently
    Revoke {
        #[arg(long)]
        id: String,
    },
    /// Replace a PAT's secret; the new plaintext is printed once
    Rotate {
        #[arg(long)]
        id: String,
    },
}

/// Absolute expiry for `pat create --expires-in-days`.
pub fn expiry_from_days(days: Option<i64>, now: DateTime<Utc>) -> anyhow::Result<Option<DateTime<Utc>>> {
    let Some(days) = days else {
        return Ok(None);
    };
    if days <= 0 {
        anyhow::bail!("--expires-in-days must be positive");
    }
    Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("--expires-in-days {} is out of range", days))
}
