use crate::api::{self, ApiConfig, guard::AuthConfig};
use anyhow::{Result, bail};
use axum::http::HeaderValue;
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<HeaderValue>,
    pub enable_admin_api: bool,
    pub jwt_secret: SecretString,
    pub session_cookie: String,
    pub debug_auth: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing secret is empty or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new(args.jwt_secret)
        .with_cookie_name(args.session_cookie)
        .with_debug_auth(args.debug_auth);
    if !auth_config.has_secret() {
        bail!("JWT secret must not be empty");
    }

    let api_config = ApiConfig::default()
        .with_admin_api(args.enable_admin_api)
        .with_allowed_origins(args.allowed_origins);

    api::new(&args.host, args.port, api_config, &auth_config).await
}

fn startup_entries(args: &Args) -> Vec<(&'static str, String)> {
    let origins = if args.allowed_origins.is_empty() {
        "none".to_string()
    } else {
        args.allowed_origins
            .iter()
            .filter_map(|origin| origin.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ")
    };

    vec![
        ("listen", format!("{}:{}", args.host, args.port)),
        ("jwt_secret", "REDACTED".to_string()),
        ("session_cookie", args.session_cookie.clone()),
        ("allowed_origins", origins),
        ("admin_api", args.enable_admin_api.to_string()),
        ("debug_auth", args.debug_auth.to_string()),
    ]
}

fn log_startup_args(args: &Args) {
    let entries = startup_entries(args);
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\nStartup configuration:", bn88_banner());
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn bn88_banner() -> String {
    BN88_BANNER.replace(
        "{VERSION}",
        &format!(
            " - {} - {}",
            env!("CARGO_PKG_VERSION"),
            short_commit(crate::GIT_COMMIT_HASH)
        ),
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

const BN88_BANNER: &str = r"
  ___ _  _  ___  ___
 | _ ) \| |( _ )( _ )
 | _ \ .` |/ _ \/ _ \
 |___/_|\_|\___/\___/ {VERSION}";
