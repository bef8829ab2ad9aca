use crate::{
    sesame::{self, AppState},
    session::{valid_cookie_name, PgSessionStore, SessionConfig, SessionManager},
    store::PgUserStore,
};
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_username: Option<String>,
    pub db_password: Option<SecretString>,
    pub timezone: String,
    pub session_secret: SecretString,
    pub session_cookie_name: String,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let timezone = parse_timezone(&args.timezone)?;
    let session_config = session_config(&args)?;
    let dsn = database_url(&args.dsn, args.db_username.as_deref(), args.db_password.as_ref())?;

    debug!("Server args: {:?}", args);

    let users = PgUserStore::connect(&dsn, timezone)
        .await
        .context("Failed to connect to database")?;

    users
        .migrate()
        .await
        .context("Failed to apply database schema")?;

    info!("Database ready (timezone {})", timezone.name());

    let sessions = SessionManager::new(
        Arc::new(PgSessionStore::new(users.pool().clone())),
        session_config,
    );

    let state = Arc::new(AppState::new(Arc::new(users), sessions));

    sesame::new(args.port, state).await
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("Invalid timezone {name}: {e}"))
}

fn session_config(args: &Args) -> Result<SessionConfig> {
    if args.session_secret.expose_secret().trim().is_empty() {
        return Err(anyhow!("Session secret must not be empty"));
    }
    if !valid_cookie_name(&args.session_cookie_name) {
        return Err(anyhow!(
            "Invalid session cookie name {:?}: use visible ASCII without separators",
            args.session_cookie_name
        ));
    }

    Ok(SessionConfig::new(args.session_secret.clone())
        .with_cookie_name(args.session_cookie_name.clone())
        .with_ttl_seconds(args.session_ttl_seconds)
        .with_cookie_secure(args.session_cookie_secure))
}

/// Inject the optional username/password into the DSN.
fn database_url(
    dsn: &str,
    username: Option<&str>,
    password: Option<&SecretString>,
) -> Result<String> {
    let mut dsn = Url::parse(dsn).context("Invalid database connection string")?;

    if let Some(username) = username {
        dsn.set_username(username)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if let Some(password) = password {
        dsn.set_password(Some(password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(dsn.to_string())
}
