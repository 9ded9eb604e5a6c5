// Shared HTTP transport for hosted provider backends
//
// Every hosted backend funnels its reqwest failures through here so that
// one HTTP status maps to exactly one ProviderError variant no matter
// which vendor produced it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracklab_core::port::ProviderError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("tracklab/", env!("CARGO_PKG_VERSION"));

pub fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Unavailable {
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// POST a JSON body with a bearer token and decode the JSON response.
///
/// Status mapping:
/// - 429 -> `RateLimit` (with `Retry-After` when the server sends one)
/// - 5xx -> `Unavailable`
/// - timeout -> `Timeout`
/// - other non-2xx -> `Api`
pub async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    operation: &str,
    body: &Req,
) -> Result<Resp, ProviderError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| map_send_error(operation, e))?;

    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        return Err(ProviderError::RateLimit { retry_after_ms });
    }

    if status.is_server_error() {
        return Err(ProviderError::Unavailable {
            reason: format!("{operation} returned HTTP {}", status.as_u16()),
        });
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            operation: operation.to_string(),
            message,
            status_code: Some(status.as_u16()),
        });
    }

    response.json().await.map_err(|e| ProviderError::Api {
        operation: operation.to_string(),
        message: format!("invalid response body: {e}"),
        status_code: Some(status.as_u16()),
    })
}

fn map_send_error(operation: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            operation: operation.to_string(),
            timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
        }
    } else {
        ProviderError::Unavailable {
            reason: format!("{operation} transport failure: {err}"),
        }
    }
}
