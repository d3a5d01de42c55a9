//! Session token arguments.

use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, builder::BoolishValueParser};
use secrecy::SecretString;

use crate::api::guard::DEFAULT_SESSION_COOKIE_NAME;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_SESSION_COOKIE: &str = "session-cookie";
pub const ARG_DEBUG_AUTH: &str = "debug-auth";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub session_cookie: String,
    pub debug_auth: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(secret) if !secret.trim().is_empty() => SecretString::from(secret.clone()),
            _ => bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        let session_cookie = matches
            .get_one::<String>(ARG_SESSION_COOKIE)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SESSION_COOKIE_NAME)
            .to_string();

        Ok(Self {
            jwt_secret,
            session_cookie,
            debug_auth: matches.get_flag(ARG_DEBUG_AUTH),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to verify session tokens")
                .env("BN88_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE)
                .long(ARG_SESSION_COOKIE)
                .help("Cookie that carries the session token")
                .env("BN88_SESSION_COOKIE")
                .default_value(DEFAULT_SESSION_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_DEBUG_AUTH)
                .long(ARG_DEBUG_AUTH)
                .help("Log why the auth guard rejects requests (never logs tokens)")
                .env("BN88_DEBUG_AUTH")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
