//! `reqwest`-backed [`Fetcher`] with an explicit timeout and retry count.
//!
//! Only transient failures are retried: connection errors, timeouts
//! (including ones while reading the body), HTTP 429 and HTTP 5xx. Everything else fails immediately so the caller
//! can skip the page or listing and move on.

use std::time::Duration;

use crate::{Fetcher, ScrapeError};

/// Browser-like user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the exponent of the retry backoff (2^6 = 64s).
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Total time allowed for one request, including reading the body.
    pub timeout: Duration,
    /// How many times a transient failure is retried. `0` disables retries.
    pub max_retries: u32,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// HTTP fetcher used for listing pages and thumbnails.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpFetcher {
    /// Builds a fetcher from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the client cannot be constructed.
    pub fn new(config: &HttpConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// Sends a GET request and reads its body with `read`, retrying
    /// transient failures.
    ///
    /// Each attempt covers both the request and the body read, so a
    /// connection that stalls mid-body is retried like one that never
    /// answered.
    async fn get_with_retry<T, Fut>(
        &self,
        url: &str,
        read: impl Fn(reqwest::Response) -> Fut + Send + Sync,
    ) -> Result<T, ScrapeError>
    where
        Fut: Future<Output = reqwest::Result<T>> + Send,
    {
        let mut attempt = 0;

        loop {
            let failure = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match read(response).await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                if !is_transient(&e) || attempt >= self.max_retries {
                                    return Err(ScrapeError::Http(e));
                                }
                                ScrapeError::Http(e)
                            }
                        }
                    } else {
                        let error = ScrapeError::Status {
                            url: url.to_owned(),
                            status,
                        };
                        let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                            || status.is_server_error();
                        if !retryable || attempt >= self.max_retries {
                            return Err(error);
                        }
                        error
                    }
                }
                Err(e) => {
                    if !is_transient(&e) || attempt >= self.max_retries {
                        return Err(ScrapeError::Http(e));
                    }
                    ScrapeError::Http(e)
                }
            };

            attempt += 1;
            let delay = Duration::from_secs(1u64 << attempt.min(MAX_BACKOFF_SHIFT));
            log::warn!(
                "{failure} (retry {attempt}/{} in {delay:?})",
                self.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        self.get_with_retry(url, reqwest::Response::text).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        self.get_with_retry(url, |response| async move {
            response.bytes().await.map(|bytes| bytes.to_vec())
        })
        .await
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
///
/// Body read failures surface wrapped in a decode error, so the source
/// chain is checked too.
fn is_transient(e: &reqwest::Error) -> bool {
    if e.is_timeout() || e.is_connect() || e.is_body() {
        return true;
    }
    std::error::Error::source(e)
        .and_then(|source| source.downcast_ref::<reqwest::Error>())
        .is_some_and(is_transient)
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::net::{TcpListener, TcpStream};

    use super::*;

    fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn default_config_disables_retries() {
        let config = HttpConfig::default();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(HttpFetcher::new(&config).is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_fails_without_retrying() {
        let fetcher = HttpFetcher::new(&HttpConfig {
            timeout: Duration::from_secs(2),
            ..HttpConfig::default()
        })
        .unwrap();

        // Port 9 on localhost is the discard service, which is never
        // listening in test environments.
        let result = fetcher.fetch_text("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(ScrapeError::Http(_))));
    }

    #[tokio::test]
    async fn retries_when_body_stalls() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/page", listener.local_addr().unwrap());

        // The first connection sends 3 of 10 body bytes and then goes quiet;
        // the second one serves the whole body.
        let server = std::thread::spawn(move || {
            let (mut stalled, _) = listener.accept().unwrap();
            read_request(&mut stalled);
            let _ = stalled.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc");
            let _ = stalled.flush();

            let (mut healthy, _) = listener.accept().unwrap();
            read_request(&mut healthy);
            healthy
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nabcdefghij",
                )
                .unwrap();
            drop(stalled);
        });

        let fetcher = HttpFetcher::new(&HttpConfig {
            timeout: Duration::from_secs(1),
            max_retries: 1,
            ..HttpConfig::default()
        })
        .unwrap();

        let body = fetcher.fetch_text(&url).await.unwrap();
        assert_eq!(body, "abcdefghij");

        server.join().unwrap();
    }
}
