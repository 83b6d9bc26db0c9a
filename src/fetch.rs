//! HTTP plumbing shared by every API call
//!
//! Requests are built through [`HttpClient`], which attaches the current
//! bearer token from [`AuthHeader`] when the request is sent. Call sites
//! never handle the token themselves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ClientOptions;
use crate::error::Error;

/// The bearer token attached to outgoing requests.
///
/// Clones share the same cell. The session manager is the only writer.
#[derive(Debug, Clone, Default)]
pub struct AuthHeader {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, read at send time
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_set(&self) -> bool {
        self.token.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Header value for the current token
    pub fn authorization(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {}", token))
    }

    pub(crate) fn set(&self, token: Option<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }
}

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client bound to the API root with the auth interceptor installed
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    api_root: String,
    auth: AuthHeader,
}

impl HttpClient {
    /// Create a client from options, sharing `auth` with the session manager
    pub fn new(options: &ClientOptions, auth: AuthHeader) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self::with_client(client, &options.api_root(), auth))
    }

    /// Wrap an existing `reqwest::Client`
    pub fn with_client(client: Client, api_root: &str, auth: AuthHeader) -> Self {
        Self {
            client,
            api_root: api_root.trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn auth_header(&self) -> &AuthHeader {
        &self.auth
    }

    /// Absolute URL for an API path such as `/samples/packs`
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.api_root, path)
    }

    pub fn get(&self, path: &str) -> FetchBuilder<'_> {
        FetchBuilder::new(self, path, Method::GET)
    }

    pub fn post(&self, path: &str) -> FetchBuilder<'_> {
        FetchBuilder::new(self, path, Method::POST)
    }

    pub fn put(&self, path: &str) -> FetchBuilder<'_> {
        FetchBuilder::new(self, path, Method::PUT)
    }

    pub fn delete(&self, path: &str) -> FetchBuilder<'_> {
        FetchBuilder::new(self, path, Method::DELETE)
    }
}

/// Helper for building and executing one request
pub struct FetchBuilder<'a> {
    http: &'a HttpClient,
    url: String,
    method: Method,
    headers: HeaderMap,
    query_params: Option<HashMap<String, String>>,
    body: Option<Vec<u8>>,
    form: Option<Form>,
    bearer_override: Option<String>,
}

impl<'a> FetchBuilder<'a> {
    fn new(http: &'a HttpClient, path: &str, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self {
            http,
            url: http.url(path),
            method,
            headers,
            query_params: None,
            body: None,
            form: None,
            bearer_override: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Authenticate with an explicit token instead of the shared one
    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.bearer_override = Some(token.to_string());
        self
    }

    /// Add a query parameter to the request
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query_params
            .get_or_insert_with(HashMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(body)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(json);
        Ok(self)
    }

    /// Send a multipart form body
    pub fn multipart(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    fn build(self) -> Result<RequestBuilder, Error> {
        let mut url = Url::parse(&self.url)?;

        if let Some(params) = &self.query_params {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in params {
                query_pairs.append_pair(key, value);
            }
        }

        let mut headers = self.headers;
        let authorization = match self.bearer_override {
            Some(token) => Some(format!("Bearer {}", token)),
            None => self.http.auth.authorization(),
        };
        if let Some(value) = authorization.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(AUTHORIZATION, value);
        }

        debug!(
            "{} {} (authenticated: {})",
            self.method,
            url.path(),
            headers.contains_key(AUTHORIZATION)
        );

        let mut req = self.http.client.request(self.method, url.as_str());
        req = req.headers(headers);

        if let Some(form) = self.form {
            req = req.multipart(form);
        } else if let Some(body) = self.body {
            req = req.body(body);
        }

        Ok(req)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(self) -> Result<T, Error> {
        let response = self.execute_checked().await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Execute the request and return the body bytes
    pub async fn execute_bytes(self) -> Result<Vec<u8>, Error> {
        let response = self.execute_checked().await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Execute the request, turning non-success statuses into [`Error::Api`]
    pub async fn execute_checked(self) -> Result<Response, Error> {
        let response = self.execute_raw().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.or(body.message))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    text
                }
            });

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Execute the request and return the raw response
    pub async fn execute_raw(self) -> Result<Response, Error> {
        let req = self.build()?;
        Ok(req.send().await?)
    }
}
