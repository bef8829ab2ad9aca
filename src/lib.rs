//! # Sesame (session based authentication)
//!
//! `sesame` registers users, checks their credentials and keeps them logged
//! in with a server-side session reached through a signed cookie.
//!
//! ## Accounts
//!
//! A user is identified by a unique username that must be an email address at
//! registration time. Passwords are stored as Argon2id PHC strings; the plain
//! text never reaches the database. Username uniqueness is enforced by the
//! store (a unique constraint in Postgres), so two concurrent registrations of
//! the same name end with exactly one account.
//!
//! ## Sessions
//!
//! Logging in stores `{username, first_name, last_name}` under a random token
//! and hands the client `<token>.<hmac>` in a cookie. A missing, tampered or
//! expired cookie reads as "no session". Logging out deletes the record and
//! clears the cookie.
//!
//! ## HTTP
//!
//! Every reply is `{"status": "OK" | "fail", ...}`; see [`sesame::handlers`].

pub mod cli;
pub mod credentials;
pub mod sesame;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
