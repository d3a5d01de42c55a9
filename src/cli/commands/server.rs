//! Listener and HTTP surface arguments.

use anyhow::{Context, Result, bail};
use axum::http::HeaderValue;
use clap::{Arg, ArgAction, ArgMatches, Command, builder::BoolishValueParser};
use url::Url;

pub const ARG_HOST: &str = "host";
pub const ARG_PORT: &str = "port";
pub const ARG_ALLOWED_ORIGINS: &str = "allowed-origins";
pub const ARG_ENABLE_ADMIN_API: &str = "enable-admin-api";

#[derive(Debug)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<HeaderValue>,
    pub enable_admin_api: bool,
}

impl Options {
    /// Parse server arguments from matches.
    ///
    /// # Errors
    /// Returns an error if an allowed origin is not an absolute http(s) URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let host = matches
            .get_one::<String>(ARG_HOST)
            .map(|host| host.trim())
            .filter(|host| !host.is_empty())
            .unwrap_or("0.0.0.0")
            .to_string();
        let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(3000);

        let allowed_origins = matches
            .get_one::<String>(ARG_ALLOWED_ORIGINS)
            .map(|raw| parse_origins(raw))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            allowed_origins,
            enable_admin_api: matches.get_flag(ARG_ENABLE_ADMIN_API),
        })
    }
}

/// Comma-separated origins, normalized to `scheme://host[:port]`.
///
/// # Errors
/// Returns an error for entries that are not absolute http(s) URLs.
pub fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let url = Url::parse(entry).with_context(|| format!("Invalid origin: {entry}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("Origin must use http or https: {entry}");
            }
            let host = url
                .host_str()
                .with_context(|| format!("Origin must include a host: {entry}"))?;
            let port = url
                .port()
                .map_or_else(String::new, |port| format!(":{port}"));
            HeaderValue::from_str(&format!("{}://{host}{port}", url.scheme()))
                .with_context(|| format!("Failed to build origin header for {entry}"))
        })
        .collect()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HOST)
                .long(ARG_HOST)
                .help("Address to bind")
                .env("BN88_HOST")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .env("BN88_PORT")
                .default_value("3000")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ALLOWED_ORIGINS)
                .long(ARG_ALLOWED_ORIGINS)
                .help("Comma-separated list of origins allowed by CORS")
                .env("BN88_ALLOWED_ORIGINS"),
        )
        .arg(
            Arg::new(ARG_ENABLE_ADMIN_API)
                .long(ARG_ENABLE_ADMIN_API)
                .help("Mount the /api/admin routes")
                .env("BN88_ENABLE_ADMIN_API")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
