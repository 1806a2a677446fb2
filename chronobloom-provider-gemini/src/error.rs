//! Internal error helpers for mapping HTTP/reqwest errors to [`InvocationError`].

use std::time::Duration;

use chronobloom_types::InvocationError;

/// Map an HTTP status code (from the Gemini API) to an [`InvocationError`].
///
/// An invalid key comes back as 400 with `API_KEY_INVALID` in the body.
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> InvocationError {
    match status.as_u16() {
        401 | 403 => InvocationError::Auth(body.to_string()),
        400 if body.contains("API_KEY_INVALID") => InvocationError::Auth(body.to_string()),
        code => InvocationError::Service {
            status: code,
            body: body.to_string(),
        },
    }
}

/// Map a [`reqwest::Error`] to an [`InvocationError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> InvocationError {
    if err.is_timeout() {
        InvocationError::Timeout(timeout)
    } else {
        InvocationError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_and_403_map_to_auth() {
        for status in [reqwest::StatusCode::UNAUTHORIZED, reqwest::StatusCode::FORBIDDEN] {
            let err = map_http_status(status, "denied");
            assert!(matches!(err, InvocationError::Auth(msg) if msg == "denied"));
        }
    }

    #[test]
    fn invalid_key_400_maps_to_auth() {
        let body = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;
        let err = map_http_status(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, InvocationError::Auth(_)));
    }

    #[test]
    fn plain_400_is_not_retryable_service_error() {
        let err = map_http_status(reqwest::StatusCode::BAD_REQUEST, "bad body");
        assert!(matches!(&err, InvocationError::Service { status: 400, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_429_is_retryable() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "quota");
        assert!(matches!(&err, InvocationError::Service { status: 429, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn status_503_is_retryable() {
        let err = map_http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(err.is_retryable());
    }
}
