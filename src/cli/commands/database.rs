use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_USERNAME: &str = "db-username";
pub const ARG_DB_PASSWORD: &str = "db-password";
pub const ARG_TIMEZONE: &str = "timezone";

pub const DEFAULT_TIMEZONE: &str = "Asia/Jakarta";

#[derive(Debug)]
pub struct Options {
    pub dsn: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timezone: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the DSN is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;

        Ok(Self {
            dsn,
            username: matches.get_one::<String>(ARG_DB_USERNAME).cloned(),
            password: matches
                .get_one::<String>(ARG_DB_PASSWORD)
                .map(|password| SecretString::from(password.clone())),
            timezone: matches
                .get_one::<String>(ARG_TIMEZONE)
                .cloned()
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "Database connection string. --db-username/--db-password, when given, replace the credentials in the DSN.",
                )
                .env("SESAME_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DB_USERNAME)
                .long(ARG_DB_USERNAME)
                .help("Database username, injected into the DSN")
                .env("SESAME_DB_USERNAME"),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("Database password, injected into the DSN")
                .env("SESAME_DB_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TIMEZONE)
                .long(ARG_TIMEZONE)
                .help("IANA timezone used for the database session and stored timestamps")
                .env("SESAME_TIMEZONE")
                .default_value(DEFAULT_TIMEZONE),
        )
}
