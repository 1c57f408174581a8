// system-tests/tests/helpers/client.rs
// ============================================================================
// Module: API Client
// Description: Minimal JSON client for the evalstream HTTP API.
// Purpose: Return status codes and bodies without interpreting them.
// Dependencies: reqwest, serde_json
// ============================================================================

use std::time::Duration;

use serde_json::Value;

/// Identity header sent when the client acts as a user.
pub const USER_HEADER: &str = "x-user-id";

/// Status code and decoded JSON body of one response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body.
    pub body: Value,
}

/// HTTP client bound to one server and, optionally, one user.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    user: Option<String>,
}

impl ApiClient {
    /// Creates an anonymous client.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self {
            base_url,
            http,
            user: None,
        })
    }

    /// Returns a copy of this client that identifies as `user`.
    #[must_use]
    pub fn as_user(&self, user: &str) -> Self {
        Self {
            user: Some(user.to_string()),
            ..self.clone()
        }
    }

    /// Issues a GET request.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, String> {
        self.send(self.http.get(self.url(path))).await
    }

    /// Issues a POST request with an optional JSON body.
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<ApiResponse, String> {
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    /// Issues a POST request with a raw body.
    pub async fn post_raw(&self, path: &str, body: &'static str) -> Result<ApiResponse, String> {
        let request = self
            .http
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body);
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, mut request: reqwest::RequestBuilder) -> Result<ApiResponse, String> {
        if let Some(user) = &self.user {
            request = request.header(USER_HEADER, user);
        }
        let response = request.send().await.map_err(|err| format!("request failed: {err}"))?;
        let status = response.status().as_u16();
        let body = response.json().await.map_err(|err| format!("invalid json body: {err}"))?;
        Ok(ApiResponse {
            status,
            body,
        })
    }
}
