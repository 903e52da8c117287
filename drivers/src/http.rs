//! `reqwest`-backed implementation of [`HttpClient`].

use pulse_core::environment::{HttpClient, HttpError, HttpRequest, HttpResponse};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Outbound JSON POST client used by both drivers.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let HttpRequest { url, body, api_key } = request;

        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(api_key) = &api_key {
            builder = builder.header("x-api-key", api_key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let data = response
            .json::<Value>()
            .await
            .map_err(|e| HttpError::InvalidBody {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(HttpResponse {
            status: status.as_u16(),
            data,
        })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn post(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + '_>> {
        Box::pin(self.send(request))
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout {
            url: url.to_string(),
        }
    } else {
        HttpError::RequestFailed {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ReqwestHttpClient {
        ReqwestHttpClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_post_sends_json_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/coingecko/call"))
            .and(header("x-api-key", "secret"))
            .and(body_json(json!({ "data": { "base": "ETH" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::new(
            format!("{}/coingecko/call", server.uri()),
            json!({ "data": { "base": "ETH" } }),
        )
        .with_api_key("secret");

        let response = client().post(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.data, json!({ "result": 1 }));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client()
            .post(HttpRequest::new(server.uri(), json!({})))
            .await;
        assert!(matches!(result, Err(HttpError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_non_json_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client()
            .post(HttpRequest::new(server.uri(), json!({})))
            .await;
        assert!(matches!(result, Err(HttpError::InvalidBody { .. })));
    }

    #[tokio::test]
    async fn test_slow_responder_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new(Duration::from_millis(100)).unwrap();
        let result = client.post(HttpRequest::new(server.uri(), json!({}))).await;
        assert!(matches!(result, Err(HttpError::Timeout { .. })));
    }
}
