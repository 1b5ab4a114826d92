const PLACEHOLDER_SECRET: &str = "CHANGE_ME_LABSTOCK_JWT_SECRET";
const MAX_TOKEN_TTL_DAYS: i64 = 365;
const MAX_SESSION_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Unset means the in-memory store (development only).
    pub database_url: Option<String>,
    /// HMAC secret shared by capability links and session tokens.
    pub jwt_secret: String,
    /// Base URL approval links point at.
    pub public_url: url::Url,
    /// Lifetime of capability links. Set via LABSTOCK_TOKEN_TTL_DAYS. Default: 7.
    pub token_ttl_days: i64,
    /// Lifetime of login sessions. Set via LABSTOCK_SESSION_TTL_MINUTES. Default: 60.
    pub session_ttl_minutes: i64,
    pub smtp: Option<SmtpSettings>,
    /// Comma-separated list of webhook URLs notified alongside email.
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<String>,
    pub upload_dir: String,
    pub chemical_id_prefix: String,
    pub dashboard_origin: String,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Config {
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary variable source.
pub fn load_from(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let jwt_secret = var("LABSTOCK_JWT_SECRET").unwrap_or_else(|| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = var("LABSTOCK_ENV")
            .or_else(|| var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "LABSTOCK_JWT_SECRET is still the insecure placeholder. \
                 Set a long random secret before running in production."
            );
        }
        tracing::warn!("LABSTOCK_JWT_SECRET is not set, using insecure placeholder");
    }

    let port: u16 = var("LABSTOCK_PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000);

    let public_url = var("LABSTOCK_PUBLIC_URL")
        .unwrap_or_else(|| format!("http://localhost:{}", port));
    let public_url = url::Url::parse(&public_url)
        .map_err(|e| anyhow::anyhow!("invalid LABSTOCK_PUBLIC_URL {}: {}", public_url, e))?;

    let smtp = match var("LABSTOCK_SMTP_HOST") {
        Some(host) => {
            let username = var("LABSTOCK_SMTP_USERNAME").unwrap_or_default();
            Some(SmtpSettings {
                host,
                port: var("LABSTOCK_SMTP_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(587),
                from: var("LABSTOCK_SMTP_FROM").unwrap_or_else(|| username.clone()),
                username,
                password: var("LABSTOCK_SMTP_PASSWORD").unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(Config {
        port,
        database_url: var("DATABASE_URL").filter(|s| !s.is_empty()),
        jwt_secret,
        public_url,
        token_ttl_days: lifetime(
            "LABSTOCK_TOKEN_TTL_DAYS",
            var("LABSTOCK_TOKEN_TTL_DAYS"),
            7,
            MAX_TOKEN_TTL_DAYS,
        ),
        session_ttl_minutes: lifetime(
            "LABSTOCK_SESSION_TTL_MINUTES",
            var("LABSTOCK_SESSION_TTL_MINUTES"),
            60,
            MAX_SESSION_TTL_MINUTES,
        ),
        smtp,
        webhook_urls: var("LABSTOCK_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: var("LABSTOCK_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        upload_dir: var("LABSTOCK_UPLOAD_DIR").unwrap_or_else(|| "uploads".into()),
        chemical_id_prefix: var("LABSTOCK_CHEMICAL_ID_PREFIX").unwrap_or_else(|| "CHEM-".into()),
        dashboard_origin: var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
    })
}

/// Positive lifetime from the environment: unset or invalid falls back to
/// `default`, anything above `max` is clamped.
fn lifetime(name: &str, raw: Option<String>, default: i64, max: i64) -> i64 {
    match raw.and_then(|v| v.trim().parse::<i64>().ok()).filter(|v| *v > 0) {
        Some(v) if v > max => {
            tracing::warn!("{} = {} is above the maximum, using {}", name, v, max);
            max
        }
        Some(v) => v,
        None => default,
    }
}
