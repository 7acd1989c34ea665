//! Shared reqwest plumbing for provider clients.

use crate::FetchError;
use reqwest::{Response, StatusCode};
use std::time::Duration;

const USER_AGENT: &str = concat!("heatwave/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub(crate) fn build_client(settings: HttpSettings) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .build()
        .unwrap_or_default()
}

/// Pass 2xx responses through; map everything else onto the fetch error taxonomy.
pub(crate) async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        let _ = response.bytes().await;
        return Err(FetchError::Unauthorized);
    }

    if is_rate_limited(&response) {
        let _ = response.bytes().await;
        return Err(FetchError::RateLimited);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(FetchError::Status {
        status: status.as_u16(),
        body,
    })
}

fn is_rate_limited(response: &Response) -> bool {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }

    let headers = response.headers();
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    exhausted || headers.contains_key("retry-after")
}

pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, FetchError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}
