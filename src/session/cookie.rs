//! Signed session cookie codec.
//!
//! Cookie value: `<token>.<signature>`, where the signature is
//! base64url(HMAC-SHA256(secret, "<cookie name>|<token>")). Binding the name
//! into the MAC keeps a value issued under one cookie name from being replayed
//! under another.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::{SessionConfig, SessionError, SessionToken};

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &SecretString, name: &str, token: &str) -> Result<HmacSha256, SessionError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| SessionError::Signing(e.to_string()))?;
    mac.update(name.as_bytes());
    mac.update(b"|");
    mac.update(token.as_bytes());
    Ok(mac)
}

/// Whether `name` is an RFC 6265 cookie-name (an HTTP token): visible ASCII
/// without separators. Other names can be set but never read back.
#[must_use]
pub fn valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}

/// Produce the signed cookie value for `token`.
pub(super) fn encode(config: &SessionConfig, token: &SessionToken) -> Result<String, SessionError> {
    let signature = mac(config.secret(), config.cookie_name(), token.as_str())?
        .finalize()
        .into_bytes();
    Ok(format!(
        "{}.{}",
        token.as_str(),
        Base64UrlUnpadded::encode_string(&signature)
    ))
}

/// Verify a signed cookie value. Anything malformed or mis-signed is `None`.
pub(super) fn decode(config: &SessionConfig, value: &str) -> Option<SessionToken> {
    let (token, signature) = value.split_once('.')?;
    if token.is_empty() {
        return None;
    }
    let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;
    mac(config.secret(), config.cookie_name(), token)
        .ok()?
        .verify_slice(&signature)
        .ok()?;
    Some(SessionToken::from_raw(token))
}

/// Find the raw value of cookie `name` in the request headers.
pub(super) fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().map(str::trim);
            let val = parts.next().map(str::trim);
            if let (Some(key), Some(val)) = (key, val) {
                if key == name {
                    return Some(val);
                }
            }
        }
    }
    None
}

/// Build the `Set-Cookie` value carrying a session.
pub(super) fn set_cookie(config: &SessionConfig, value: &str) -> Result<HeaderValue, SessionError> {
    let mut cookie = format!(
        "{}={value}; Path=/; HttpOnly; SameSite=Lax",
        config.cookie_name()
    );
    if config.ttl_seconds() > 0 {
        cookie.push_str(&format!("; Max-Age={}", config.ttl_seconds()));
    }
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Build the `Set-Cookie` value that makes the client drop the session.
pub(super) fn clear_cookie(config: &SessionConfig) -> Result<HeaderValue, SessionError> {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name()
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    fn config() -> SessionConfig {
        SessionConfig::new(SecretString::from("top-secret"))
    }

    #[test]
    fn cookie_names_must_be_tokens() {
        assert!(valid_cookie_name("sesame_session"));
        assert!(valid_cookie_name("__Host-sid"));
        for name in ["", "a=b", "a;b", "a b", "a,b", "\"sid\"", "séance"] {
            assert!(!valid_cookie_name(name), "{name} should be rejected");
        }
    }

    #[test]
    fn encode_then_decode_yields_token() -> Result<()> {
        let config = config();
        let token = SessionToken::generate()?;
        let value = encode(&config, &token)?;
        assert_eq!(decode(&config, &value), Some(token));
        Ok(())
    }

    #[test]
    fn decode_rejects_tampering() -> Result<()> {
        let config = config();
        let token = SessionToken::generate()?;
        let value = encode(&config, &token)?;
        let (raw, signature) = value.split_once('.').context("missing separator")?;

        assert_eq!(decode(&config, raw), None);
        assert_eq!(decode(&config, &format!("{raw}x.{signature}")), None);
        assert_eq!(decode(&config, &format!("{raw}.")), None);
        assert_eq!(decode(&config, &format!(".{signature}")), None);
        assert_eq!(decode(&config, "garbage"), None);
        Ok(())
    }

    #[test]
    fn decode_rejects_other_secret_or_name() -> Result<()> {
        let token = SessionToken::generate()?;
        let value = encode(&config(), &token)?;

        let other_secret = SessionConfig::new(SecretString::from("another-secret"));
        assert_eq!(decode(&other_secret, &value), None);

        let other_name = config().with_cookie_name("other".to_string());
        assert_eq!(decode(&other_name, &value), None);
        Ok(())
    }

    #[test]
    fn find_cookie_picks_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; sesame_session=abc.def ; lang=en"),
        );
        assert_eq!(find_cookie(&headers, "sesame_session"), Some("abc.def"));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }

    #[test]
    fn find_cookie_scans_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("sesame_session=v"));
        assert_eq!(find_cookie(&headers, "sesame_session"), Some("v"));
    }

    #[test]
    fn set_cookie_attributes() -> Result<()> {
        let header = set_cookie(&config().with_ttl_seconds(60), "v")?;
        assert_eq!(
            header.to_str()?,
            "sesame_session=v; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );

        let header = set_cookie(&config().with_ttl_seconds(0).with_cookie_secure(true), "v")?;
        assert_eq!(
            header.to_str()?,
            "sesame_session=v; Path=/; HttpOnly; SameSite=Lax; Secure"
        );
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<()> {
        let header = clear_cookie(&config())?;
        assert_eq!(
            header.to_str()?,
            "sesame_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        Ok(())
    }
}
