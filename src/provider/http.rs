//! Shared HTTP client construction.

use std::time::Duration;

/// Client used for every backend call. Certificate verification stays on and
/// TLS is pinned to 1.2 or newer. The overall timeout bounds a whole call;
/// connect and read get their own shorter budgets so a slow-starting but
/// healthy long stream is not killed by the header phase.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .danger_accept_invalid_certs(false)
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .read_timeout(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Normalizes a base URL and appends an endpoint path without doubling
/// slashes.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("https://api.openai.com/v1", "chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/models"),
            "https://api.openai.com/v1/models"
        );
    }
}
