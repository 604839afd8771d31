use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authority::bootstrap::{self, BootstrapOutcome};
use authority::config::{self, Config};
use authority::models::token::{CreatedBy, PatFilter, PatScope};
use authority::state::AppState;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "authority=debug,tower_http=info".into()),
    );
    let json_logs = std::env::var("AUTH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, bootstrap }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port, bootstrap).await
        }
        Some(cli::Commands::Bootstrap) => {
            let state = persistent_state(cfg).await?;
            run_bootstrap(&state).await.map(|_| ())
        }
        Some(cli::Commands::Pat { command }) => {
            let state = persistent_state(cfg).await?;
            handle_pat_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port, false).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Console commands act on durable records only; the in-memory store would
/// vanish with the process.
async fn persistent_state(cfg: Config) -> anyhow::Result<AppState> {
    if cfg.database_url.is_none() {
        anyhow::bail!("DATABASE_URL must be set for this command");
    }
    AppState::from_config(cfg).await
}

async fn run_bootstrap(state: &AppState) -> anyhow::Result<BootstrapOutcome> {
    let mut stdout = std::io::stdout();
    bootstrap::provision(&state.issuer, &mut stdout)
        .await
        .context("bootstrap provisioning failed")
}

async fn run_server(cfg: Config, port: u16, bootstrap_flag: bool) -> anyhow::Result<()> {
    let bootstrap_requested = bootstrap_flag || cfg.bootstrap_on_start;
    let state = Arc::new(AppState::from_config(cfg).await?);

    // The flag may be set on every restart; the store decides whether anything is issued.
    if bootstrap_requested {
        run_bootstrap(&state).await?;
    }

    let app = authority::api::router(state.clone()).layer({
        use axum::http::{header, Method};
        let origins = std::env::var("AUTH_ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::predicate(move |origin, _| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == origins
                    || origin_str.starts_with("http://localhost:")
                    || origin_str.starts_with("http://127.0.0.1:")
            }))
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        jwt_enabled = state.config.jwt_enabled,
        pat_enabled = state.config.pat_enabled,
        "token authority listening on {}",
        addr
    );
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_pat_command(cmd: cli::PatCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::PatCommands::Create {
            name,
            scope,
            expires_in_days,
        } => {
            let scope: PatScope = scope.parse().map_err(anyhow::Error::msg)?;
            let expires_at = cli::expiry_from_days(expires_in_days, Utc::now())?;
            let issued = state
                .issuer
                .issue(&name, scope, expires_at, CreatedBy::Operator)
                .await
                .context("failed to issue PAT")?;
            println!(
                "PAT created (the token is shown once):\n  Token:   {}\n  ID:      {}\n  Name:    {}\n  Scope:   {}",
                issued.token.expose(),
                issued.pat.id,
                issued.pat.name,
                issued.pat.scope
            );
        }
        cli::PatCommands::List { filter, created_by } => {
            let filter = PatFilter::parse(Some(&filter), created_by.as_deref()).map_err(anyhow::Error::msg)?;
            let pats = state.admin.list(filter, Utc::now()).await?;
            if pats.is_empty() {
                println!("No tokens found.");
            } else {
                println!(
                    "{:<38} {:<24} {:<10} {:<8} {:<26}",
                    "ID", "NAME", "SCOPE", "STATUS", "LAST USED"
                );
                for p in pats {
                    println!(
                        "{:<38} {:<24} {:<10} {:<8} {:<26}",
                        p.id,
                        p.name,
                        p.scope,
                        p.status.as_str(),
                        p.last_used_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".into())
                    );
                }
            }
        }
        cli::PatCommands::Revoke { id } => {
            let id = uuid::Uuid::parse_str(&id).context("Invalid PAT id")?;
            state.admin.revoke(id).await?;
            println!("PAT {} revoked.", id);
        }
        cli::PatCommands::Rotate { id } => {
            let id = uuid::Uuid::parse_str(&id).context("Invalid PAT id")?;
            let issued = state.issuer.rotate(id).await?;
            println!(
                "PAT rotated (the new token is shown once):\n  Token:   {}\n  ID:      {}",
                issued.token.expose(),
                issued.pat.id
            );
        }
    }
    Ok(())
}
