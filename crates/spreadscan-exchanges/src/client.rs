//! Shared HTTP plumbing for all venue adapters.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single endpoint fetch. Each variant carries the URL so the
/// log line identifies which venue endpoint misbehaved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("non-OK status code {status} from {url}")]
    Status { status: u16, url: String },

    #[error("error decoding JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

static HTTP: OnceLock<Client> = OnceLock::new();

/// Process-wide HTTP client with the 10-second per-request timeout every
/// venue fetch uses.
pub(crate) fn http() -> &'static Client {
    HTTP.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client")
    })
}

/// Fetches `url` and decodes the JSON body into `T`.
///
/// # Errors
/// Any transport failure, non-2xx status, or decode failure; the caller
/// aborts the whole adapter run without writing.
pub(crate) async fn fetch_json<T: DeserializeOwned>(url: &str) -> Result<T, FetchError> {
    let response = http()
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response.json::<T>().await.map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ServerTimeResponse {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

/// Venue server clock in unix milliseconds; signed requests are timestamped
/// against this rather than the local clock.
pub(crate) async fn fetch_server_time_ms(url: &str) -> Result<i64, FetchError> {
    let response: ServerTimeResponse = fetch_json(url).await?;
    Ok(response.server_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_mentions_url() {
        let err = FetchError::Status {
            status: 503,
            url: "https://api.example.com/ticker".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("https://api.example.com/ticker"));
    }

    #[test]
    fn test_server_time_parses() {
        let json = r#"{"serverTime": 1700000000000}"#;
        let parsed: ServerTimeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.server_time, 1_700_000_000_000);
    }
}
