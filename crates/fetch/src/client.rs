use std::net::SocketAddr;
use std::time::Duration;

use catalog_common::config::HttpConfig;

/// Final response from a retried fetch. Non-2xx statuses that are not
/// retryable (e.g. 404) are returned to the caller, not raised.
#[derive(Clone, Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Resilient HTTP client shared by every extractor.
///
/// Retries timeouts, connection errors, and 5xx with fixed backoff; the
/// first 2xx wins. Hosts listed in `ipv4_hosts` are pinned to their first
/// A record at build time while TLS verification stays name-based.
pub struct FetchClient {
    http: reqwest::Client,
    cfg: HttpConfig,
}

impl FetchClient {
    pub async fn new(cfg: &HttpConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());

        for host in &cfg.ipv4_hosts {
            match resolve_ipv4(host).await {
                Some(addr) => {
                    tracing::info!(host = %host, addr = %addr, "Pinned host to IPv4 address");
                    builder = builder.resolve(host, addr);
                }
                None => {
                    tracing::warn!(
                        host = %host,
                        "Could not resolve host to IPv4, leaving resolution to the system"
                    );
                }
            }
        }

        let http = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http,
            cfg: cfg.clone(),
        })
    }

    /// GET a URL with the configured fixed-backoff retry budget.
    pub async fn get_text(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.get_with_options(url, None, false).await
    }

    /// GET with exponential 429 backoff enabled (base 5s: 5, 10, 20...).
    /// Used for hosts that rate-limit scrapes, e.g. HuggingFace pages.
    pub async fn get_text_backoff(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.get_with_options(url, None, true).await
    }

    /// GET and deserialize a JSON body. The request must end 2xx.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T, FetchError> {
        let response = self.get_with_options(url, bearer, false).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn get_with_options(
        &self,
        url: &str,
        bearer: Option<&str>,
        backoff_429: bool,
    ) -> Result<FetchResponse, FetchError> {
        let max_attempts = self.cfg.max_retries.max(1);
        let domain = extract_domain(url);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let start = std::time::Instant::now();

            let mut request = self
                .http
                .get(url)
                .timeout(Duration::from_secs(self.cfg.timeout_seconds));
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    metrics::histogram!("catalog.fetch.latency", "domain" => domain.clone())
                        .record(start.elapsed().as_secs_f64());

                    if status == 429 && backoff_429 && attempt < max_attempts {
                        let wait = self.cfg.backoff_base_seconds * 2u64.pow(attempt - 1);
                        tracing::warn!(url = %url, wait_seconds = wait, "Rate limited, backing off");
                        metrics::counter!("catalog.fetch.rate_limited").increment(1);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }

                    if (500..600).contains(&status) && attempt < max_attempts {
                        tracing::warn!(url = %url, status = status, attempt = attempt, "Server error, retrying");
                        metrics::counter!("catalog.fetch.retries").increment(1);
                        tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_seconds)).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .map_err(|e| FetchError::Http(e.to_string()))?;
                    return Ok(FetchResponse { status, body });
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    last_error = e.to_string();
                    if retryable && attempt < max_attempts {
                        tracing::warn!(url = %url, attempt = attempt, error = %last_error, "Transient error, retrying");
                        metrics::counter!("catalog.fetch.retries").increment(1);
                        tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_seconds)).await;
                        continue;
                    }
                    return Err(FetchError::Http(last_error));
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            detail: last_error,
        })
    }

    /// HEAD probe for URL accessibility. Redirects are followed; 4xx is a
    /// falsy result, never an error.
    pub async fn accessible(&self, url: &str) -> bool {
        match self.head_status(url).await {
            Ok(status) => status == 200,
            Err(_) => false,
        }
    }

    /// HEAD a URL, returning the final status code.
    pub async fn head_status(&self, url: &str) -> Result<u16, FetchError> {
        let response = self
            .http
            .head(url)
            .timeout(Duration::from_secs(self.cfg.head_timeout_seconds))
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Resolve a hostname to its first A record.
async fn resolve_ipv4(host: &str) -> Option<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, 443)).await.ok()?;
    addrs.find(|a| a.is_ipv4())
}

/// Domain component of a URL, for metrics labels and rate-limit buckets.
pub fn extract_domain(url: &str) -> String {
    url.split("//")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Retries exhausted for {url}: {detail}")]
    RetriesExhausted { url: String, detail: String },

    #[error("JSON decode error: {0}")]
    Decode(String),

    #[error("Client build error: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://console.groq.com/docs"), "console.groq.com");
        assert_eq!(extract_domain("http://huggingface.co/a/b"), "huggingface.co");
        assert_eq!(extract_domain("not-a-url"), "not-a-url");
    }

    #[test]
    fn test_response_success() {
        let ok = FetchResponse {
            status: 200,
            body: String::new(),
        };
        let missing = FetchResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
