use axum::extract::{Extension, Form};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{Flow, Reply, ReplyBody};
use crate::credentials::{register as register_user, Registration};
use crate::sesame::AppState;

#[derive(ToSchema, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegisterForm {
    /// Must be an email address.
    username: String,
    password: String,
    first_name: String,
    last_name: String,
}

impl std::fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterForm")
            .field("username", &self.username)
            .field("password", &"***")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

impl From<RegisterForm> for Registration {
    fn from(form: RegisterForm) -> Self {
        Self {
            username: form.username,
            password: form.password,
            first_name: form.first_name,
            last_name: form.last_name,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "Registration successful", body = ReplyBody),
        (status = 400, description = "Empty input, username is not an email, or username already exists", body = ReplyBody),
        (status = 500, description = "User could not be stored", body = ReplyBody),
    ),
    tag = "register"
)]
#[instrument(skip(state, form))]
pub async fn register(state: Extension<Arc<AppState>>, form: Option<Form<RegisterForm>>) -> Reply {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    match register_user(state.users(), form.into()).await {
        Ok(user) => {
            info!(username = %user.username, "Register success");
            Reply::Done("Register success")
        }
        Err(err) => Reply::from_auth_error(err, Flow::Register),
    }
}
