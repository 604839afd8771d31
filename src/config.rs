use std::time::Duration;

pub const PLACEHOLDER_ACCESS_SECRET: &str = "CHANGE_ME_ACCESS_SECRET_AT_LEAST_32_BYTES";
pub const PLACEHOLDER_REFRESH_SECRET: &str = "CHANGE_ME_REFRESH_SECRET_AT_LEAST_32_BYTES";
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Upper bound for either session token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 3600;
/// Upper bound for the bootstrap PAT validity window (ten years).
pub const MAX_BOOTSTRAP_VALIDITY_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Unset means the in-memory store (development only).
    pub database_url: Option<String>,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Expected `aud` of Google ID tokens.
    pub google_client_id: Option<String>,
    pub google_jwks_uri: String,
    pub jwt_enabled: bool,
    pub pat_enabled: bool,
    /// Provision unknown verified identities as players on first login.
    pub auto_create_users: bool,
    /// Run bootstrap provisioning when the server starts.
    pub bootstrap_on_start: bool,
    /// 0 = the bootstrap PAT never expires.
    pub bootstrap_validity_days: i64,
    pub pat_secret_bytes: usize,
    pub operation_timeout_ms: u64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            jwt_access_secret: PLACEHOLDER_ACCESS_SECRET.into(),
            jwt_refresh_secret: PLACEHOLDER_REFRESH_SECRET.into(),
            jwt_issuer: "ffl-playoffs".into(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            google_client_id: None,
            google_jwks_uri: GOOGLE_JWKS_URI.into(),
            jwt_enabled: true,
            pat_enabled: true,
            auto_create_users: true,
            bootstrap_on_start: false,
            bootstrap_validity_days: 365,
            pat_secret_bytes: 48,
            operation_timeout_ms: 2000,
            argon2_memory_kib: 19_456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Config {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Out-of-range values are clamped; [`load`] rejects them up front.
    pub fn bootstrap_validity(&self) -> Option<chrono::Duration> {
        (self.bootstrap_validity_days > 0)
            .then(|| chrono::Duration::days(self.bootstrap_validity_days.min(MAX_BOOTSTRAP_VALIDITY_DAYS)))
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        clamped_ttl(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        clamped_ttl(self.refresh_token_ttl_secs)
    }

    /// Range checks for values that feed token lifetimes and hashing.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, secs) in [
            ("AUTH_ACCESS_TOKEN_TTL_SECS", self.access_token_ttl_secs),
            ("AUTH_REFRESH_TOKEN_TTL_SECS", self.refresh_token_ttl_secs),
        ] {
            if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
                anyhow::bail!("{} must be between 1 and {}", key, MAX_TOKEN_TTL_SECS);
            }
        }
        if !(0..=MAX_BOOTSTRAP_VALIDITY_DAYS).contains(&self.bootstrap_validity_days) {
            anyhow::bail!(
                "AUTH_BOOTSTRAP_VALIDITY_DAYS must be between 0 and {}",
                MAX_BOOTSTRAP_VALIDITY_DAYS
            );
        }
        if self.jwt_access_secret == self.jwt_refresh_secret {
            anyhow::bail!("access and refresh signing secrets must differ");
        }
        if self.pat_secret_bytes < crate::crypto::secret::MIN_SECRET_BYTES {
            anyhow::bail!(
                "AUTH_PAT_SECRET_BYTES must be at least {}",
                crate::crypto::secret::MIN_SECRET_BYTES
            );
        }
        if self.operation_timeout_ms == 0 {
            anyhow::bail!("AUTH_OPERATION_TIMEOUT_MS must be positive");
        }
        Ok(())
    }

    fn uses_placeholder_secrets(&self) -> bool {
        self.jwt_access_secret == PLACEHOLDER_ACCESS_SECRET
            || self.jwt_refresh_secret == PLACEHOLDER_REFRESH_SECRET
    }
}

fn clamped_ttl(secs: i64) -> chrono::Duration {
    chrono::Duration::seconds(secs.clamp(1, MAX_TOKEN_TTL_SECS))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let defaults = Config::default();
    let cfg = Config {
        port: env_parse("AUTH_PORT", defaults.port),
        database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
        jwt_access_secret: std::env::var("AUTH_JWT_ACCESS_SECRET")
            .unwrap_or(defaults.jwt_access_secret),
        jwt_refresh_secret: std::env::var("AUTH_JWT_REFRESH_SECRET")
            .unwrap_or(defaults.jwt_refresh_secret),
        jwt_issuer: std::env::var("AUTH_JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
        access_token_ttl_secs: env_parse("AUTH_ACCESS_TOKEN_TTL_SECS", defaults.access_token_ttl_secs),
        refresh_token_ttl_secs: env_parse("AUTH_REFRESH_TOKEN_TTL_SECS", defaults.refresh_token_ttl_secs),
        google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
        google_jwks_uri: std::env::var("GOOGLE_JWKS_URI").unwrap_or(defaults.google_jwks_uri),
        jwt_enabled: env_flag("AUTH_JWT_ENABLED", defaults.jwt_enabled),
        pat_enabled: env_flag("AUTH_PAT_ENABLED", defaults.pat_enabled),
        auto_create_users: env_flag("AUTH_AUTO_CREATE_USERS", defaults.auto_create_users),
        bootstrap_on_start: env_flag("AUTH_BOOTSTRAP_PAT", defaults.bootstrap_on_start),
        bootstrap_validity_days: env_parse("AUTH_BOOTSTRAP_VALIDITY_DAYS", defaults.bootstrap_validity_days),
        pat_secret_bytes: env_parse("AUTH_PAT_SECRET_BYTES", defaults.pat_secret_bytes),
        operation_timeout_ms: env_parse("AUTH_OPERATION_TIMEOUT_MS", defaults.operation_timeout_ms),
        argon2_memory_kib: env_parse("AUTH_ARGON2_MEMORY_KIB", defaults.argon2_memory_kib),
        argon2_iterations: env_parse("AUTH_ARGON2_ITERATIONS", defaults.argon2_iterations),
        argon2_parallelism: env_parse("AUTH_ARGON2_PARALLELISM", defaults.argon2_parallelism),
    };

    if cfg.uses_placeholder_secrets() {
        let env_mode = std::env::var("AUTH_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "AUTH_JWT_ACCESS_SECRET / AUTH_JWT_REFRESH_SECRET are still insecure placeholders. \
                 Set random secrets of at least 32 bytes before running in production."
            );
        }
        eprintln!("⚠️  JWT signing secrets are not set, using insecure placeholders. Set them for production.");
    }
    cfg.validate()?;
    Ok(cfg)
}
