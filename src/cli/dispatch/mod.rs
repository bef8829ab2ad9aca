//! Map validated CLI arguments to the action to execute.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, session, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(4444);

    let database_opts = database::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: database_opts.dsn,
        db_username: database_opts.username,
        db_password: database_opts.password,
        timezone: database_opts.timezone,
        session_secret: session_opts.secret,
        session_cookie_name: session_opts.cookie_name,
        session_ttl_seconds: session_opts.ttl_seconds,
        session_cookie_secure: session_opts.cookie_secure,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_server_args() {
        temp_env::with_vars(
            [
                ("SESAME_DB_USERNAME", None::<&str>),
                ("SESAME_DB_PASSWORD", None::<&str>),
                ("SESAME_TIMEZONE", None::<&str>),
                ("SESAME_SESSION_COOKIE_NAME", None::<&str>),
                ("SESAME_SESSION_TTL_SECONDS", None::<&str>),
                ("SESAME_SESSION_COOKIE_SECURE", None::<&str>),
                ("SESAME_PORT", None::<&str>),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec![
                    "sesame",
                    "--dsn",
                    "postgres://localhost:5432/sesame",
                    "--session-secret",
                    "secret",
                    "--db-username",
                    "app",
                    "--session-cookie-secure",
                ]);

                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 4444);
                    assert_eq!(args.dsn, "postgres://localhost:5432/sesame");
                    assert_eq!(args.db_username.as_deref(), Some("app"));
                    assert!(args.db_password.is_none());
                    assert_eq!(args.timezone, "Asia/Jakarta");
                    assert_eq!(args.session_secret.expose_secret(), "secret");
                    assert_eq!(args.session_cookie_name, "sesame_session");
                    assert_eq!(args.session_ttl_seconds, 2_592_000);
                    assert!(args.session_cookie_secure);
                }
            },
        );
    }
}
