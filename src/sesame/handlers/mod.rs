//! Route handlers and the reply envelope they share.
//!
//! Every endpoint answers with a [`ReplyBody`]:
//!
//! - `{"status": "OK", "message": ...}` for completed actions,
//! - `{"status": "OK", "data": {...}}` for the current session,
//! - `{"status": "fail", "message": ...}` for rejected requests,
//! - `{"status": "fail", "error": "no sessions"}` when nobody is logged in.

pub mod current_session;
pub mod health;
pub mod login;
pub mod logout;
pub mod register;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::credentials::AuthError;
use crate::session::SessionIdentity;

pub const NO_SESSIONS: &str = "no sessions";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "fail")]
    Fail,
}

/// JSON envelope returned by every `/api` endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReplyBody {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SessionIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a handler, serialized uniformly at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done(&'static str),
    Session(SessionIdentity),
    Rejected(StatusCode, String),
    NoSession,
}

/// Which form produced an [`AuthError`]; the wording for blank input differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Login,
    Register,
}

impl Reply {
    #[must_use]
    pub fn from_auth_error(err: AuthError, flow: Flow) -> Self {
        match err {
            AuthError::EmptyInput => Self::bad_request(match flow {
                Flow::Login => "Please fill username and password".to_string(),
                Flow::Register => "Please fill all form input".to_string(),
            }),
            AuthError::InvalidUsernameFormat => {
                Self::bad_request("Please fill username with email".to_string())
            }
            AuthError::NotFound => Self::bad_request("Username not found".to_string()),
            AuthError::PasswordMismatch => Self::bad_request("Password not match".to_string()),
            AuthError::UsernameTaken(username) => {
                Self::bad_request(format!("Username {username} already exists"))
            }
            AuthError::Store(_) | AuthError::Session(_) | AuthError::Hashing(_) => {
                error!("Request failed: {err}");
                Self::internal(&err)
            }
        }
    }

    fn bad_request(message: String) -> Self {
        debug!("Request rejected: {message}");
        Self::Rejected(StatusCode::BAD_REQUEST, message)
    }

    /// 500 reply carrying the error text, `Error <detail>`.
    #[must_use]
    pub fn internal(err: &dyn std::fmt::Display) -> Self {
        Self::Rejected(StatusCode::INTERNAL_SERVER_ERROR, format!("Error {err}"))
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Done(_) | Self::Session(_) | Self::NoSession => StatusCode::OK,
            Self::Rejected(status, _) => *status,
        }
    }

    #[must_use]
    pub fn body(self) -> ReplyBody {
        match self {
            Self::Done(message) => ReplyBody {
                status: Status::Ok,
                message: Some(message.to_string()),
                data: None,
                error: None,
            },
            Self::Session(identity) => ReplyBody {
                status: Status::Ok,
                message: None,
                data: Some(identity),
                error: None,
            },
            Self::Rejected(_, message) => ReplyBody {
                status: Status::Fail,
                message: Some(message),
                data: None,
                error: None,
            },
            Self::NoSession => ReplyBody {
                status: Status::Fail,
                message: None,
                data: None,
                error: Some(NO_SESSIONS.to_string()),
            },
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
