use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use async_trait::async_trait;
use sesame::{
    sesame::{router, AppState},
    session::{
        MemorySessionStore, SessionConfig, SessionError, SessionManager, SessionRecord,
        SessionStore,
    },
    store::MemoryUserStore,
};
use std::sync::Arc;
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";

struct Reply {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

impl Reply {
    /// `name=value` pair to send back in a `Cookie` header.
    fn cookie_pair(&self) -> Result<String> {
        let header = self.set_cookie.as_deref().context("no Set-Cookie header")?;
        let pair = header.split(';').next().context("empty Set-Cookie")?;
        Ok(pair.to_string())
    }
}

fn app() -> Router {
    app_with(Arc::new(MemorySessionStore::new()))
}

fn app_with(store: Arc<dyn SessionStore>) -> Router {
    let sessions = SessionManager::new(
        store,
        SessionConfig::new(SecretString::from("integration-secret")),
    );
    router(Arc::new(AppState::new(
        Arc::new(MemoryUserStore::default()),
        sessions,
    )))
}

async fn send(app: &Router, request: Request<Body>) -> Result<Reply> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .map(|value| value.to_str().map(str::to_string))
        .transpose()?;
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = serde_json::from_slice(&bytes)?;
    Ok(Reply {
        status,
        set_cookie,
        body,
    })
}

async fn post_form(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Result<Reply> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    send(app, request.body(Body::from(form.to_string()))?).await
}

async fn current_session(app: &Router, cookie: Option<&str>) -> Result<Reply> {
    let mut request = Request::builder().uri("/api/auth/current_session");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    send(app, request.body(Body::empty())?).await
}

async fn register_alice(app: &Router) -> Result<Reply> {
    post_form(
        app,
        "/api/register",
        "username=alice%40example.com&password=pw1&first_name=Alice&last_name=A",
        None,
    )
    .await
}

#[tokio::test]
async fn register_login_session_logout() -> Result<()> {
    let app = app();

    let reply = register_alice(&app).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "OK", "message": "Register success"}));

    let reply = post_form(
        &app,
        "/api/auth/do_login",
        "username=alice%40example.com&password=pw1",
        None,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "OK", "message": "Login success"}));
    let set_cookie = reply.set_cookie.clone().context("login must set a cookie")?;
    assert!(set_cookie.starts_with("sesame_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = reply.cookie_pair()?;

    let reply = current_session(&app, Some(&cookie)).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        json!({
            "status": "OK",
            "data": {
                "username": "alice@example.com",
                "first_name": "Alice",
                "last_name": "A"
            }
        })
    );

    let reply = post_form(&app, "/api/auth/do_logout", "", Some(&cookie)).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "OK", "message": "Logout success"}));
    assert!(reply
        .set_cookie
        .as_deref()
        .is_some_and(|c| c.contains("Max-Age=0")));

    // the old cookie no longer reaches a session even if the client kept it
    let reply = current_session(&app, Some(&cookie)).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "fail", "error": "no sessions"}));

    // logging out twice is fine
    let reply = post_form(&app, "/api/auth/do_logout", "", Some(&cookie)).await?;
    assert_eq!(reply.body["status"], "OK");
    Ok(())
}

#[tokio::test]
async fn login_rejections() -> Result<()> {
    let app = app();
    register_alice(&app).await?;

    let cases = [
        ("username=&password=pw1", "Please fill username and password"),
        ("username=alice%40example.com&password=+++", "Please fill username and password"),
        ("", "Please fill username and password"),
        ("username=bob%40example.com&password=pw1", "Username not found"),
        ("username=ALICE%40example.com&password=pw1", "Username not found"),
        ("username=alice%40example.com&password=wrong", "Password not match"),
    ];
    for (form, message) in cases {
        let reply = post_form(&app, "/api/auth/do_login", form, None).await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{form}");
        assert_eq!(reply.body, json!({"status": "fail", "message": message}), "{form}");
        assert!(reply.set_cookie.is_none());
    }
    Ok(())
}

#[tokio::test]
async fn login_without_form_body_is_empty_input() -> Result<()> {
    let app = app();
    let reply = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/do_login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username":"a","password":"b"}"#))?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Please fill username and password");
    Ok(())
}

#[tokio::test]
async fn register_rejections() -> Result<()> {
    let app = app();

    let reply = post_form(
        &app,
        "/api/register",
        "username=alice%40example.com&password=pw1&first_name=Alice",
        None,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        json!({"status": "fail", "message": "Please fill all form input"})
    );

    let reply = post_form(
        &app,
        "/api/register",
        "username=alice&password=pw1&first_name=Alice&last_name=A",
        None,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        json!({"status": "fail", "message": "Please fill username with email"})
    );

    assert_eq!(register_alice(&app).await?.status, StatusCode::OK);
    let reply = register_alice(&app).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        json!({"status": "fail", "message": "Username alice@example.com already exists"})
    );
    Ok(())
}

#[tokio::test]
async fn current_session_without_cookie() -> Result<()> {
    let app = app();
    let reply = current_session(&app, None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "fail", "error": "no sessions"}));
    Ok(())
}

#[tokio::test]
async fn tampered_cookie_reads_as_no_session() -> Result<()> {
    let app = app();
    register_alice(&app).await?;
    let login = post_form(
        &app,
        "/api/auth/do_login",
        "username=alice%40example.com&password=pw1",
        None,
    )
    .await?;
    let cookie = login.cookie_pair()?;

    let (pair, signature) = cookie.rsplit_once('.').context("signed cookie")?;
    let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{pair}.{flipped}{}", &signature[1..]);

    let reply = current_session(&app, Some(&tampered)).await?;
    assert_eq!(reply.body, json!({"status": "fail", "error": "no sessions"}));

    let (name, value) = cookie.split_once('=').context("cookie pair")?;
    let (token, _) = value.split_once('.').context("signed value")?;
    let unsigned = format!("{name}={token}");
    let reply = current_session(&app, Some(&unsigned)).await?;
    assert_eq!(reply.body, json!({"status": "fail", "error": "no sessions"}));
    Ok(())
}

#[tokio::test]
async fn login_again_replaces_the_previous_session() -> Result<()> {
    let app = app();
    register_alice(&app).await?;

    let form = "username=alice%40example.com&password=pw1";
    let first = post_form(&app, "/api/auth/do_login", form, None).await?.cookie_pair()?;
    let second = post_form(&app, "/api/auth/do_login", form, Some(&first))
        .await?
        .cookie_pair()?;
    assert_ne!(first, second);

    let reply = current_session(&app, Some(&first)).await?;
    assert_eq!(reply.body["error"], "no sessions");

    let reply = current_session(&app, Some(&second)).await?;
    assert_eq!(reply.body["data"]["username"], "alice@example.com");
    Ok(())
}

#[tokio::test]
async fn logout_without_cookie_still_succeeds() -> Result<()> {
    let app = app();
    let reply = post_form(&app, "/api/auth/do_logout", "", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"status": "OK", "message": "Logout success"}));
    assert!(reply.set_cookie.is_some());
    Ok(())
}

/// Session store whose deletes always fail.
#[derive(Default)]
struct UndeletableSessions(MemorySessionStore);

#[async_trait]
impl SessionStore for UndeletableSessions {
    async fn insert(&self, key: &[u8], record: SessionRecord) -> Result<(), SessionError> {
        self.0.insert(key, record).await
    }

    async fn get(&self, key: &[u8]) -> Result<Option<SessionRecord>, SessionError> {
        self.0.get(key).await
    }

    async fn delete(&self, _key: &[u8]) -> Result<(), SessionError> {
        Err(SessionError::Store(sqlx::Error::PoolTimedOut))
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        self.0.purge_expired().await
    }
}

#[tokio::test]
async fn logout_reports_a_session_that_could_not_be_deleted() -> Result<()> {
    let app = app_with(Arc::new(UndeletableSessions::default()));
    register_alice(&app).await?;
    let cookie = post_form(
        &app,
        "/api/auth/do_login",
        "username=alice%40example.com&password=pw1",
        None,
    )
    .await?
    .cookie_pair()?;

    let reply = post_form(&app, "/api/auth/do_logout", "", Some(&cookie)).await?;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body["status"], "fail");
    assert!(reply.body["message"]
        .as_str()
        .is_some_and(|message| message.starts_with("Error ")));
    assert!(reply
        .set_cookie
        .as_deref()
        .is_some_and(|c| c.contains("Max-Age=0")));

    // the server-side session survived, which is what the failure reports
    let reply = current_session(&app, Some(&cookie)).await?;
    assert_eq!(reply.body["data"]["username"], "alice@example.com");
    Ok(())
}
