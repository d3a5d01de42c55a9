//! Map validated CLI matches to the action the binary runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, server};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let server_opts = server::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        host: server_opts.host,
        port: server_opts.port,
        allowed_origins: server_opts.allowed_origins,
        enable_admin_api: server_opts.enable_admin_api,
        jwt_secret: auth_opts.jwt_secret,
        session_cookie: auth_opts.session_cookie,
        debug_auth: auth_opts.debug_auth,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn clean_env<F: FnOnce()>(vars: [(&str, Option<&str>); 3], f: F) {
        temp_env::with_vars(
            [
                ("BN88_HOST", None),
                ("BN88_PORT", None),
                ("BN88_SESSION_COOKIE", None),
                ("BN88_ENABLE_ADMIN_API", None),
                ("BN88_DEBUG_AUTH", None),
                vars[0],
                vars[1],
                vars[2],
            ],
            f,
        );
    }

    #[test]
    fn jwt_secret_required() {
        clean_env(
            [
                ("BN88_JWT_SECRET", None),
                ("BN88_ALLOWED_ORIGINS", None),
                ("BN88_LOG_LEVEL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bn88"]);
                let result = handler(&matches);
                assert!(
                    result
                        .err()
                        .is_some_and(|err| err
                            .to_string()
                            .contains("missing required argument: --jwt-secret"))
                );
            },
        );
    }

    #[test]
    fn blank_jwt_secret_rejected() {
        clean_env(
            [
                ("BN88_JWT_SECRET", Some("   ")),
                ("BN88_ALLOWED_ORIGINS", None),
                ("BN88_LOG_LEVEL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bn88"]);
                assert!(handler(&matches).is_err());
            },
        );
    }

    #[test]
    fn invalid_origin_rejected() {
        clean_env(
            [
                ("BN88_JWT_SECRET", Some("s3cret")),
                ("BN88_ALLOWED_ORIGINS", Some("https://ok.bn88.dev,javascript:alert(1)")),
                ("BN88_LOG_LEVEL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["bn88"]);
                assert!(handler(&matches).is_err());
            },
        );
    }

    #[test]
    fn builds_server_action() {
        clean_env(
            [
                ("BN88_JWT_SECRET", Some("s3cret")),
                ("BN88_ALLOWED_ORIGINS", Some("https://admin.bn88.dev")),
                ("BN88_LOG_LEVEL", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "bn88",
                    "--port",
                    "9000",
                    "--enable-admin-api",
                ]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.host, "0.0.0.0");
                    assert_eq!(args.port, 9000);
                    assert_eq!(args.jwt_secret.expose_secret(), "s3cret");
                    assert_eq!(args.session_cookie, "bn88_token");
                    assert_eq!(args.allowed_origins.len(), 1);
                    assert!(args.enable_admin_api);
                    assert!(!args.debug_auth);
                }
            },
        );
    }
}
