//! Remote execution.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as Json;

use crate::config::Config;
use crate::driver::wire;
use crate::error::{FaunaError, FaunaResult};
use crate::transpiler::Expr;

/// Sends one query expression and returns the decoded resource.
///
/// Exactly one request per call; implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn query(&self, expr: &Expr) -> FaunaResult<Json>;
}

/// HTTP transport: POSTs the wire JSON with the secret as bearer token.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    secret: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &Config) -> FaunaResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FaunaError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
            secret: config.secret.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, expr: &Expr) -> FaunaResult<Json> {
        tracing::debug!(endpoint = %self.endpoint, "sending query");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.secret)
            .json(&expr.to_wire())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.request_error(e))?;
        let result = wire::parse_response(status, &body);
        if let Err(e) = &result {
            tracing::warn!(status, error = %e, "query failed");
        }
        result
    }
}

impl HttpTransport {
    fn request_error(&self, e: reqwest::Error) -> FaunaError {
        if e.is_timeout() {
            tracing::warn!(timeout = ?self.timeout, "query timed out");
            FaunaError::Timeout(self.timeout)
        } else {
            tracing::warn!(error = %e, "request failed");
            FaunaError::Connection(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let config = Config::builder()
            .secret("s")
            .scheme("http")
            .domain("127.0.0.1")
            .port(9)
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:9/");
        let err = transport.query(&Expr::Null).await.unwrap_err();
        assert!(matches!(err, FaunaError::Connection(_) | FaunaError::Timeout(_)));
    }
}
