//! HTTP client abstraction for the LLM backends.
//!
//! Backends talk to their APIs through [`HttpClient`] so request shaping and
//! response parsing can be tested against canned bodies.

use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Raw response body chunks as they arrive.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ProviderError>>;

/// Trait for HTTP communication with external APIs.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response text.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Request`] if the request cannot be sent and
    /// [`ProviderError::Status`] for any non-2xx response.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, ProviderError>;

    /// Sends a POST request with a JSON body and returns the body as a
    /// stream of chunks. Status errors are reported before streaming starts.
    async fn post_json_stream(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<ByteStream, ProviderError>;
}

/// HTTP client implementation using reqwest.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        debug!("POST {}", redact(url));
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let response = self.send(url, headers, body).await?;
        response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.without_url().to_string()))
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<ByteStream, ProviderError> {
        let response = self.send(url, headers, body).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ProviderError::Stream(e.without_url().to_string()))
            })
            .boxed())
    }
}

/// Strips query parameters (Gemini puts the API key there) before logging.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures_util::stream;
    use std::sync::Mutex;

    /// A recorded request.
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: serde_json::Value,
    }

    /// Mock HTTP client returning a canned body. Streaming requests return
    /// the configured chunks instead.
    pub struct MockHttpClient {
        response: Result<String, (u16, String)>,
        chunks: Vec<String>,
        pub requests: Mutex<Vec<Recorded>>,
    }

    impl MockHttpClient {
        pub fn new(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                chunks: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(status: u16, body: &str) -> Self {
            Self {
                response: Err((status, body.to_string())),
                ..Self::new("")
            }
        }

        pub fn streaming(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                ..Self::new("")
            }
        }

        pub fn last_request(&self) -> Recorded {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn record(&self, url: &str, headers: &[(&str, &str)], body: &serde_json::Value) {
            self.requests.lock().unwrap().push(Recorded {
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: body.clone(),
            });
        }

        fn outcome(&self) -> Result<String, ProviderError> {
            self.response.clone().map_err(|(status, body)| ProviderError::Status { status, body })
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<String, ProviderError> {
            self.record(url, headers, body);
            self.outcome()
        }

        async fn post_json_stream(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<ByteStream, ProviderError> {
            self.record(url, headers, body);
            self.outcome()?;
            let chunks: Vec<Result<Vec<u8>, ProviderError>> =
                self.chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
            Ok(stream::iter(chunks).boxed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockHttpClient;
    use super::*;

    #[test]
    fn test_redact_drops_query_string() {
        assert_eq!(
            redact("https://example.com/models/x:generateContent?key=secret"),
            "https://example.com/models/x:generateContent"
        );
        assert_eq!(redact("https://example.com/chat"), "https://example.com/chat");
    }

    #[tokio::test]
    async fn test_mock_http_client_records_requests() {
        let client = MockHttpClient::new("test response");
        let body = serde_json::json!({"key": "value"});

        let response = client
            .post_json("https://api.example.com", &[("x-test", "1")], &body)
            .await
            .unwrap();

        assert_eq!(response, "test response");
        let recorded = client.last_request();
        assert_eq!(recorded.url, "https://api.example.com");
        assert_eq!(recorded.headers, vec![("x-test".to_string(), "1".to_string())]);
        assert_eq!(recorded.body, body);
    }

    #[tokio::test]
    async fn test_mock_http_client_stream_yields_chunks() {
        let client = MockHttpClient::streaming(&["ab", "cd"]);
        let stream = client
            .post_json_stream("https://api.example.com", &[], &serde_json::json!({}))
            .await
            .unwrap();

        let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![b"ab".to_vec(), b"cd".to_vec()]);
    }
}
