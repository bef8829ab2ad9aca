use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{Flow, Reply, ReplyBody};
use crate::credentials::{authenticate, AuthError};
use crate::sesame::AppState;
use crate::session::SessionIdentity;

#[derive(ToSchema, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/do_login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses (
        (status = 200, description = "Login success, session cookie set", body = ReplyBody),
        (status = 400, description = "Empty input, unknown username or wrong password", body = ReplyBody),
        (status = 500, description = "Session could not be created", body = ReplyBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state, form))]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    form: Option<Form<LoginForm>>,
) -> Response {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let user = match authenticate(state.users(), &form.username, &form.password).await {
        Ok(user) => user,
        Err(err) => return Reply::from_auth_error(err, Flow::Login).into_response(),
    };

    let sessions = state.sessions();
    let previous = sessions.token_from_headers(&headers);

    let cookie = match sessions
        .create(previous.as_ref(), SessionIdentity::from(&user))
        .await
        .and_then(|token| sessions.session_cookie(&token))
    {
        Ok(cookie) => cookie,
        Err(err) => return Reply::from_auth_error(AuthError::from(err), Flow::Login).into_response(),
    };

    info!(username = %user.username, "Login success");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    (headers, Reply::Done("Login success")).into_response()
}
