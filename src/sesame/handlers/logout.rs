use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::{Reply, ReplyBody};
use crate::sesame::AppState;

#[utoipa::path(
    post,
    path = "/api/auth/do_logout",
    responses (
        (status = 200, description = "Logout success, session cookie cleared", body = ReplyBody),
        (status = 500, description = "Session could not be deleted or cookie could not be cleared", body = ReplyBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state))]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let sessions = state.sessions();
    let token = sessions.token_from_headers(&headers);

    if token.is_none() {
        debug!("Logout without a valid session cookie");
    }

    // the cookie is cleared even if the row could not be deleted, but the
    // reply reports the failure since copies of the cookie stay valid
    let reply = match sessions.invalidate(token.as_ref()).await {
        Ok(()) => Reply::Done("Logout success"),
        Err(err) => {
            error!("Failed to delete session, it stays valid until it expires: {err}");
            Reply::internal(&err)
        }
    };

    match sessions.clear_cookie() {
        Ok(cookie) => {
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (headers, reply).into_response()
        }
        Err(err) => {
            error!("Failed to build clearing cookie: {err}");
            Reply::internal(&err).into_response()
        }
    }
}
