use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::session::MAX_SESSION_TTL_SECONDS;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub cookie_name: String,
    pub ttl_seconds: i64,
    pub cookie_secure: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if the session secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .map(|secret| SecretString::from(secret.clone()))
            .context("missing required argument: --session-secret")?;

        Ok(Self {
            secret,
            cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| "sesame_session".to_string()),
            ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session cookies")
                .env("SESAME_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Name of the session cookie")
                .env("SESAME_SESSION_COOKIE_NAME")
                .default_value("sesame_session"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session TTL in seconds (at most ten years), 0 keeps sessions until logout")
                .env("SESAME_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64).range(0..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("SESAME_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
