use log::{error, trace};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::ApiConfig;
use crate::shared::{DeskError, Result};

/// Thin authenticated wrapper over the desk REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
    access_token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeskError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    /// Drops the bearer token without awaiting. If a request is reading it
    /// right now the clear is finished on the runtime.
    pub fn clear_token(&self) {
        match self.access_token.try_write() {
            Ok(mut token) => *token = None,
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let token = self.access_token.clone();
                    runtime.spawn(async move {
                        *token.write().await = None;
                    });
                }
                Err(_) => *self.access_token.blocking_write() = None,
            },
        }
    }

    pub async fn has_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request builder carrying the bearer token when one is set.
    pub(crate) async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        trace!("{method} {url}");
        let builder = self.http_client.request(method, url);
        match self.access_token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            error!("request failed: {e}");
            DeskError::from(e)
        })?;
        check_status(response).await
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| DeskError::Decode(format!("{e}: {body}")))
    }
}

/// Maps a non-2xx response onto the error taxonomy, keeping the API's own wording.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED => DeskError::Unauthorized(message),
        StatusCode::FORBIDDEN => DeskError::Forbidden(message),
        StatusCode::NOT_FOUND => DeskError::NotFound(message),
        other => DeskError::Remote {
            status: other.as_u16(),
            message,
        },
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_error_field() {
        assert_eq!(
            error_message(r#"{"error":"Email already registered.","message":"x"}"#).as_deref(),
            Some("Email already registered.")
        );
        assert_eq!(
            error_message(r#"{"message":"No tickets found for the specified criteria."}"#).as_deref(),
            Some("No tickets found for the specified criteria.")
        );
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_base_url_is_normalised() {
        let config = ApiConfig {
            base_url: "http://desk.local:5000/".to_string(),
            timeout_secs: 5,
        };
        let client = crate::assert_ok!(ApiClient::new(&config));
        assert_eq!(client.url("/tickets/my"), "http://desk.local:5000/tickets/my");
    }
}
