use axum::{extract::Extension, http::HeaderMap};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::{Reply, ReplyBody};
use crate::sesame::AppState;

#[utoipa::path(
    get,
    path = "/api/auth/current_session",
    responses (
        (status = 200, description = "Session payload, or `error: \"no sessions\"` when logged out", body = ReplyBody),
        (status = 500, description = "Session store failure", body = ReplyBody),
    ),
    tag = "auth"
)]
#[instrument(skip(headers, state))]
pub async fn current_session(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Reply {
    match state.sessions().read_from_headers(&headers).await {
        Ok(payload) => match payload.identity() {
            Some(identity) => Reply::Session(identity),
            None => {
                debug!("No active session");
                Reply::NoSession
            }
        },
        Err(err) => {
            error!("Failed to read session: {err}");
            Reply::internal(&err)
        }
    }
}
