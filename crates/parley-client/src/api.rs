//! REST client for the external chat API.
//!
//! Thin wrapper over `reqwest`: every call is one request, authenticated with
//! the bearer token returned by login. Results feed back into the Sans-IO
//! [`crate::Client`] as events; nothing here touches session state.
//!
//! Non-success responses become [`ApiError::Status`] carrying the server's
//! `message` (or `error`) field, falling back to `HTTP <status>`.

use parley_proto::{
    Chat, ChatId, Friend, FriendRequests, FriendSuggestion, Group, LoginResponse, Message,
    NewGroup, NewMessage, UserId,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::event::RestFailure;

/// Base URL used outside production when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Overrides the development base URL.
pub const API_URL_VAR: &str = "PARLEY_API_URL";

/// Base URL for production deployments. Required when deploying.
pub const PRODUCTION_API_URL_VAR: &str = "PARLEY_PRODUCTION_API_URL";

/// REST errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or `HTTP <status>`.
        message: String,
    },

    /// No response: connection refused, timeout, TLS failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the session token was rejected.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

impl From<ApiError> for RestFailure {
    fn from(err: ApiError) -> Self {
        Self { status: err.status(), message: err.to_string() }
    }
}

/// Which base URL to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    /// Production backend, from [`PRODUCTION_API_URL_VAR`].
    Production,
    /// Local or staging backend, from [`API_URL_VAR`] or [`DEFAULT_API_URL`].
    #[default]
    Development,
}

/// REST client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without a trailing slash, e.g. `http://localhost:8000/api`.
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_API_URL.to_string() }
    }
}

impl ApiConfig {
    /// Configuration with an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { base_url: base_url.trim_end_matches('/').to_string() }
    }

    /// Read the base URL from the process environment.
    ///
    /// # Errors
    ///
    /// - `ApiError::Config` for [`Deployment::Production`] without
    ///   [`PRODUCTION_API_URL_VAR`]
    pub fn from_environment(deployment: Deployment) -> Result<Self, ApiError> {
        Self::from_lookup(deployment, |var| std::env::var(var).ok())
    }

    /// Like [`Self::from_environment`] with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_environment`].
    pub fn from_lookup(
        deployment: Deployment,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ApiError> {
        let configured = |var: &str| lookup(var).filter(|url| !url.trim().is_empty());
        match deployment {
            Deployment::Production => configured(PRODUCTION_API_URL_VAR)
                .map(Self::new)
                .ok_or_else(|| ApiError::Config(format!("{PRODUCTION_API_URL_VAR} is not set"))),
            Deployment::Development => {
                Ok(configured(API_URL_VAR).map_or_else(Self::default, Self::new))
            },
        }
    }

    /// Absolute URL for an API path such as `/chats`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Client for the REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    token: Option<String>,
}

impl ApiClient {
    /// Unauthenticated client.
    ///
    /// # Errors
    ///
    /// - `ApiError::Config` if the HTTP client cannot be built
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self { http, config, token: None })
    }

    /// Use an existing session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Session token, if logged in. Absence means unauthenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Configuration in use.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `POST /auth/login`. Stores the returned token.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; invalid credentials arrive as `ApiError::Status`.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        #[derive(Serialize)]
        struct Credentials<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response: LoginResponse =
            self.json(Method::POST, "/auth/login", Some(&Credentials { username, password })).await?;
        self.token = Some(response.token.clone());
        Ok(response)
    }

    /// `POST /auth/logout`. The token is dropped even if the call fails.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]. The client is logged out regardless.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        let result = self.empty(Method::POST, "/auth/logout").await;
        self.token = None;
        result
    }

    /// `GET /friends`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.json(Method::GET, "/friends", None::<&()>).await
    }

    /// `GET /friends/suggestions?query=`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn suggestions(&self, query: &str) -> Result<Vec<FriendSuggestion>, ApiError> {
        let request = self.request(Method::GET, "/friends/suggestions").query(&[("query", query)]);
        decode(self.execute(request).await?).await
    }

    /// `POST /friends/request`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; the server explains refusals in the message.
    pub async fn send_friend_request(&self, user_id: UserId) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Request {
            user_id: UserId,
        }

        let request = self.request(Method::POST, "/friends/request").json(&Request { user_id });
        self.execute(request).await.map(drop)
    }

    /// `GET /friends/requests`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn friend_requests(&self) -> Result<FriendRequests, ApiError> {
        self.json(Method::GET, "/friends/requests", None::<&()>).await
    }

    /// `POST /friends/requests/{id}/accept`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn accept_request(&self, request_id: u64) -> Result<(), ApiError> {
        self.empty(Method::POST, &format!("/friends/requests/{request_id}/accept")).await
    }

    /// `POST /friends/requests/{id}/reject`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn reject_request(&self, request_id: u64) -> Result<(), ApiError> {
        self.empty(Method::POST, &format!("/friends/requests/{request_id}/reject")).await
    }

    /// `DELETE /friends/requests/{id}/cancel`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn cancel_request(&self, request_id: u64) -> Result<(), ApiError> {
        self.empty(Method::DELETE, &format!("/friends/requests/{request_id}/cancel")).await
    }

    /// `DELETE /friends/{id}/unfriend`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn unfriend(&self, friend_id: UserId) -> Result<(), ApiError> {
        self.empty(Method::DELETE, &format!("/friends/{friend_id}/unfriend")).await
    }

    /// `GET /groups`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn groups(&self) -> Result<Vec<Group>, ApiError> {
        self.json(Method::GET, "/groups", None::<&()>).await
    }

    /// `POST /groups`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn create_group(&self, group: &NewGroup) -> Result<Group, ApiError> {
        self.json(Method::POST, "/groups", Some(group)).await
    }

    /// `GET /chats`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn chats(&self) -> Result<Vec<Chat>, ApiError> {
        self.json(Method::GET, "/chats", None::<&()>).await
    }

    /// `GET /chats/{id}/messages`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, ApiError> {
        self.json(Method::GET, &format!("/chats/{chat_id}/messages"), None::<&()>).await
    }

    /// `POST /messages`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn post_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
        self.json(Method::POST, "/messages", Some(message)).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .http
            .request(method, self.config.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(self.execute(request).await?).await
    }

    async fn empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        self.execute(self.request(method, path)).await.map(drop)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "request failed");
            ApiError::Request(e.to_string())
        })?;

        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "api response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ApiError::Status { status: status.as_u16(), message: error_message(status, &body) };
        tracing::warn!(error = %err, status = status.as_u16(), "api error");
        Err(err)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Message shown for a failed request: the body's `message` or `error`
/// field, else `HTTP <status>`.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|field| value.get(field).and_then(serde_json::Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn development_defaults_to_localhost() {
        let config = ApiConfig::from_lookup(Deployment::Development, lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn development_url_can_be_overridden() {
        let config = ApiConfig::from_lookup(
            Deployment::Development,
            lookup(&[(API_URL_VAR, "https://staging.example/api/")]),
        )
        .unwrap();
        assert_eq!(config.url("/chats"), "https://staging.example/api/chats");
    }

    #[test]
    fn production_requires_its_own_url() {
        let err = ApiConfig::from_lookup(
            Deployment::Production,
            lookup(&[(API_URL_VAR, "http://localhost:8000/api")]),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let config = ApiConfig::from_lookup(
            Deployment::Production,
            lookup(&[(PRODUCTION_API_URL_VAR, "https://chat.example/api")]),
        )
        .unwrap();
        assert_eq!(config.url("messages"), "https://chat.example/api/messages");
    }

    #[test]
    fn error_message_prefers_message_then_error() {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        assert_eq!(error_message(status, r#"{"message":"already friends","error":"x"}"#), "already friends");
        assert_eq!(error_message(status, r#"{"error":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(error_message(status, "<html>"), "HTTP 422");
        assert_eq!(error_message(status, r#"{"message":42}"#), "HTTP 422");
    }

    #[test]
    fn failures_convert_to_rest_failures() {
        let failure: RestFailure =
            ApiError::Status { status: 401, message: "Unauthorized".into() }.into();
        assert_eq!(failure, RestFailure { status: Some(401), message: "Unauthorized".into() });

        let failure: RestFailure = ApiError::Request("refused".into()).into();
        assert_eq!(failure.status, None);
    }

    #[test]
    fn login_token_is_attached() {
        let client = ApiClient::new(ApiConfig::default()).unwrap().with_token("t0k");
        let request = client.request(Method::GET, "/friends").build().unwrap();

        assert_eq!(request.url().as_str(), "http://localhost:8000/api/friends");
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer t0k");
    }
}
