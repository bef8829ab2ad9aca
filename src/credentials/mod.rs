//! Credential validation for login and registration.
//!
//! [`authenticate`] decides whether a username/password pair is accepted and
//! [`register`] validates and inserts a new account. Both return an
//! [`AuthError`] whose variant tells the caller exactly why a request was
//! turned down; the HTTP layer maps those to the reply envelope.

mod password;

pub use password::{hash_password, verify_password};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::session::SessionError;
use crate::store::{NewUser, StoreError, User, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("required input is empty")]
    EmptyInput,

    #[error("username is not an email address")]
    InvalidUsernameFormat,

    #[error("username not found")]
    NotFound,

    #[error("password does not match")]
    PasswordMismatch,

    #[error("username {0} already exists")]
    UsernameTaken(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Registration form after extraction from the request.
#[derive(Clone, Default)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"***")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// RFC 5322 `atext`.
const ATEXT: &str = r"[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]";

/// Syntactic addr-spec check: a dot-atom or quoted-string local part, then
/// `@` and a dot-atom domain. A display name (`Alice <a@b>`) is not an
/// addr-spec and is rejected. Nothing is resolved or delivered.
pub fn valid_email(email: &str) -> bool {
    let dot_atom = format!(r"{ATEXT}+(?:\.{ATEXT}+)*");
    let quoted = r#""(?:[^"\\\r\n]|\\[^\r\n])+""#;
    Regex::new(&format!("^(?:{dot_atom}|{quoted})@{dot_atom}$"))
        .is_ok_and(|re| re.is_match(email))
}

/// Accept or reject a login attempt.
///
/// # Errors
/// `EmptyInput` when either field is blank, `NotFound` when the lookup fails
/// or finds nothing, `PasswordMismatch` when the password is wrong.
#[instrument(skip(store, password))]
pub async fn authenticate(
    store: &dyn UserStore,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    if is_blank(username) || is_blank(password) {
        return Err(AuthError::EmptyInput);
    }

    let user = match store.find_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("User not found");
            return Err(AuthError::NotFound);
        }
        Err(e) => {
            error!("Error looking up user: {e}");
            return Err(AuthError::NotFound);
        }
    };

    match verify_password(password, &user.password_hash) {
        Ok(true) => Ok(user),
        Ok(false) => {
            debug!("Password mismatch");
            Err(AuthError::PasswordMismatch)
        }
        Err(e) => {
            error!("Stored password hash is unusable: {e}");
            Err(AuthError::PasswordMismatch)
        }
    }
}

/// Validate a registration and insert the user.
///
/// # Errors
/// `EmptyInput`, `InvalidUsernameFormat`, `UsernameTaken` (including an insert
/// that lost a race against a concurrent registration), `Store` for any other
/// persistence failure.
#[instrument(skip(store))]
pub async fn register(store: &dyn UserStore, form: Registration) -> Result<User, AuthError> {
    if is_blank(&form.username)
        || is_blank(&form.password)
        || is_blank(&form.first_name)
        || is_blank(&form.last_name)
    {
        return Err(AuthError::EmptyInput);
    }

    if !valid_email(&form.username) {
        return Err(AuthError::InvalidUsernameFormat);
    }

    if store
        .find_by_username(&form.username)
        .await
        .map_err(AuthError::Store)?
        .is_some()
    {
        return Err(AuthError::UsernameTaken(form.username));
    }

    let password_hash = hash_password(&form.password)?;

    let new_user = NewUser {
        username: form.username,
        first_name: form.first_name,
        last_name: form.last_name,
        password_hash,
    };
    let username = new_user.username.clone();

    match store.insert(new_user).await {
        Ok(user) => {
            debug!(user_id = user.id, "User registered");
            Ok(user)
        }
        Err(StoreError::Conflict) => Err(AuthError::UsernameTaken(username)),
        Err(e) => {
            error!("Error inserting user: {e}");
            Err(AuthError::Store(e))
        }
    }
}
