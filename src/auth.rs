//! OAuth redirect flow helpers.
//!
//! The authorization-code exchange happens on the redirect host; it sends
//! the browser back to `/?token=...` or `/?error=...`. This module only
//! builds the authorize link and reads that final callback URL.

use reqwest::Url;

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Scopes needed to read playlists and drive a playback device.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "streaming",
    "user-modify-playback-state",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not a valid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Sign-in failed: {0}")]
    Denied(String),

    #[error("The callback URL carries no token")]
    MissingToken,
}

/// Link that starts the sign-in.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}?response_type=code&client_id={}&scope={}&redirect_uri={}",
        AUTHORIZE_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(&SCOPES.join(" ")),
        urlencoding::encode(redirect_uri)
    )
}

/// Extract the access token from the URL the browser ended up on.
///
/// Accepts a full URL or just the query (`?token=...`). An `error`
/// parameter wins over a token.
pub fn credential_from_callback(callback: &str) -> Result<String, AuthError> {
    let callback = callback.trim();
    let url = Url::parse(callback)
        .or_else(|_| {
            Url::parse("http://localhost/").and_then(|base| base.join(callback))
        })
        .map_err(|e| AuthError::InvalidCallback(format!("{}: {}", callback, e)))?;

    let mut token = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(AuthError::Denied(value.into_owned())),
            "token" | "access_token" if !value.trim().is_empty() => {
                token = Some(value.trim().to_string());
            }
            _ => {}
        }
    }
    token.ok_or(AuthError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_authorize_url_carries_all_scopes() {
        let url = authorize_url("abc123", "http://localhost:3000/api/callback");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?response_type=code"));
        assert!(url.contains("client_id=abc123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapi%2Fcallback"));
        for scope in SCOPES {
            assert!(url.contains(scope), "missing scope {}", scope);
        }
        assert!(url.contains("streaming%20user-modify-playback-state"));
    }

    #[test]
    fn test_token_from_full_url_and_bare_query() {
        assert_eq!(
            credential_from_callback("http://localhost:3000/?token=BQD-x_1").unwrap(),
            "BQD-x_1"
        );
        assert_eq!(credential_from_callback("/?token=abc").unwrap(), "abc");
        assert_eq!(credential_from_callback("?token=abc&x=1").unwrap(), "abc");
    }

    #[test]
    fn test_callback_errors() {
        assert_eq!(
            credential_from_callback("http://localhost:3000/?error=token_exchange_failed"),
            Err(AuthError::Denied("token_exchange_failed".into()))
        );
        assert_eq!(
            credential_from_callback("http://localhost:3000/?token="),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            credential_from_callback("http://localhost:3000/"),
            Err(AuthError::MissingToken)
        );
    }

    proptest! {
        #[test]
        fn prop_token_survives_the_query(token in "[A-Za-z0-9_-]{1,64}") {
            let url = format!("https://beatstop.example/?token={}", token);
            prop_assert_eq!(credential_from_callback(&url).unwrap(), token);
        }
    }
}
