use crate::config::ClientConfig;
use crate::error::{Result, StreamError};
use crate::push::PushConnection;
use crate::transport::Transport;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "msg", alias = "message")]
    error: String,
}

/// [`Transport`] over the REST API using `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
    push_insert: bool,
    push: Option<Arc<dyn PushConnection>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let mut base = config.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url: Url::parse(&base)?,
            api_key: config.api_key.clone(),
            client,
            push_insert: config.push_insert,
            push: None,
        })
    }

    pub fn with_push(mut self, push: Arc<dyn PushConnection>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(path.trim_start_matches('/'))?;
        tracing::debug!("{} {}", method, url);

        let request = self.client.request(method, url);
        Ok(match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }

    async fn send(request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        handle_response(response).await
    }
}

async fn handle_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(StreamError::Transport {
            status: status.as_u16(),
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    // Some endpoints answer with bare text rather than JSON.
    Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<Value> {
        let request = self.request(Method::GET, path)?.query(params);
        Self::send(request).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let request = self.request(Method::POST, path)?.json(body);
        Self::send(request).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        let request = self.request(Method::PUT, path)?.json(body);
        Self::send(request).await
    }

    fn push_insert_enabled(&self) -> bool {
        self.push_insert && self.push.is_some()
    }

    fn push(&self) -> Option<Arc<dyn PushConnection>> {
        self.push.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = HttpTransport::new(&ClientConfig::new("http://localhost:8000/api/v1")).unwrap();
        assert_eq!(transport.base_url().as_str(), "http://localhost:8000/api/v1/");

        let url = transport.base_url().join("alice/phone/steps/data").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/alice/phone/steps/data");
    }

    #[test]
    fn test_push_insert_needs_a_push_connection() {
        let config = ClientConfig::new("http://localhost:8000/api/v1").with_push_insert(true);
        let transport = HttpTransport::new(&config).unwrap();
        assert!(!transport.push_insert_enabled());
        assert!(transport.push().is_none());
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpTransport::new(&ClientConfig::new("not a url")).err().unwrap();
        assert!(matches!(err, StreamError::InvalidUrl(_)));
    }
}
