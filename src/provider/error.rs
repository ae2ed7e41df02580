//! Classification of transport and HTTP failures into actionable outcomes.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by a streaming call or (internally) by model discovery.
///
/// None of these are retried automatically; they terminate the current turn
/// only, and the session stays usable. Discovery errors never reach callers
/// at all — drivers substitute their fallback model lists instead.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connect, timeout, or TLS failure before or during streaming.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 401: the credential is invalid.
    #[error("authentication failed: API key was rejected (check your config)")]
    Auth,

    /// 402: the account is out of balance.
    #[error("billing error: insufficient balance on this account")]
    Billing,

    /// 429: slow down and re-issue the turn manually.
    #[error("rate limited: too many requests, try again shortly")]
    RateLimited,

    /// Any other non-2xx status, with the raw body for display.
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

impl ApiError {
    /// Maps a terminal HTTP status to its classified outcome. Must be called
    /// before any fragment production starts; no fragments are ever emitted
    /// after an error status.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 => ApiError::Auth,
            402 => ApiError::Billing,
            429 => ApiError::RateLimited,
            code => ApiError::Api { status: code, body },
        }
    }

    /// Heuristic sub-classification of [`ApiError::Api`]: does this look like
    /// the model id not existing on the backend? Matched against the status
    /// and known error phrases so the session can hint at `/model`.
    pub fn is_model_not_found(&self) -> bool {
        match self {
            ApiError::Api { status, body } => {
                let body = body.to_ascii_lowercase();
                *status == 404
                    || body.contains("model_not_found")
                    || body.contains("model not found")
                    || body.contains("does not exist")
                    || body.contains("unknown model")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn classifies_terminal_statuses() {
        assert!(matches!(
            ApiError::from_status(status(401), String::new()),
            ApiError::Auth
        ));
        assert!(matches!(
            ApiError::from_status(status(402), String::new()),
            ApiError::Billing
        ));
        assert!(matches!(
            ApiError::from_status(status(429), String::new()),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(status(500), "boom".into()),
            ApiError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn model_not_found_by_status() {
        let err = ApiError::from_status(status(404), "no such route".into());
        assert!(err.is_model_not_found());
    }

    #[test]
    fn model_not_found_by_phrase() {
        let err = ApiError::from_status(
            status(400),
            r#"{"error": {"code": "model_not_found", "message": "The model `gpt-7` does not exist"}}"#.into(),
        );
        assert!(err.is_model_not_found());

        let err = ApiError::from_status(status(400), "bad request".into());
        assert!(!err.is_model_not_found());
    }

    #[test]
    fn auth_errors_are_not_model_errors() {
        assert!(!ApiError::Auth.is_model_not_found());
        assert!(!ApiError::RateLimited.is_model_not_found());
    }
}
