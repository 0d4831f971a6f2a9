// HTTP transport shared by the flight, sheet and notification clients.
// Every client builds an `HttpRequest` and hands it to a `Transport`; production
// code runs over reqwest, tests run over the scripted `mock_server::MockServer`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed: {status} - {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl HttpRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: vec![],
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn with_form(mut self, pairs: &[(&str, &str)]) -> Self {
        self.body = RequestBody::Form(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Value of a query parameter, if it was set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if the body is a form.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).send(request).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Json(value) => builder.json(value),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        tracing::debug!(url = %request.url, status, "response received");
        Ok(HttpResponse { status, body })
    }
}

// Scripted in-memory server used by the tests and the bench.
pub mod mock_server {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    struct Route {
        scripted: VecDeque<HttpResponse>,
        fallback: Option<HttpResponse>,
        throttle_next: usize,
    }

    #[derive(Debug, Default)]
    pub struct MockServer {
        outage: AtomicBool,
        request_count: AtomicUsize,
        routes: Mutex<HashMap<String, Route>>,
        recent_requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockServer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every request fails at the network level while set.
        pub fn set_outage(&self, outage: bool) {
            self.outage.store(outage, Ordering::SeqCst);
        }

        /// Queue a one-shot response for `path`.
        pub async fn enqueue(&self, path: &str, response: HttpResponse) {
            let mut routes = self.routes.lock().await;
            routes
                .entry(path.to_string())
                .or_default()
                .scripted
                .push_back(response);
        }

        /// Response served for `path` once its queue is drained.
        pub async fn set_default(&self, path: &str, response: HttpResponse) {
            let mut routes = self.routes.lock().await;
            routes.entry(path.to_string()).or_default().fallback = Some(response);
        }

        /// The next `count` requests to `path` get a 429.
        pub async fn rate_limit_next(&self, path: &str, count: usize) {
            let mut routes = self.routes.lock().await;
            routes.entry(path.to_string()).or_default().throttle_next = count;
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        pub async fn requests(&self) -> Vec<HttpRequest> {
            self.recent_requests.lock().await.clone()
        }

        pub async fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
            self.recent_requests
                .lock()
                .await
                .iter()
                .filter(|r| path_matches(path, &request_path(&r.url)))
                .cloned()
                .collect()
        }

        pub async fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            self.recent_requests.lock().await.push(request.clone());

            if self.outage.load(Ordering::SeqCst) {
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }

            let path = request_path(&request.url);
            let mut routes = self.routes.lock().await;

            // Longest registered prefix wins so `/prices/2` can fall back to `/prices`.
            let key = routes
                .keys()
                .filter(|k| path_matches(k, &path))
                .max_by_key(|k| k.len())
                .cloned();

            let Some(route) = key.as_ref().and_then(|k| routes.get_mut(k)) else {
                return Ok(HttpResponse::new(404, format!("no route for {path}")));
            };

            if route.throttle_next > 0 {
                route.throttle_next -= 1;
                return Ok(HttpResponse::new(429, r#"{"errors":[{"status":429}]}"#));
            }

            if let Some(response) = route.scripted.pop_front() {
                return Ok(response);
            }

            Ok(route
                .fallback
                .clone()
                .unwrap_or_else(|| HttpResponse::new(404, format!("nothing scripted for {path}"))))
        }
    }

    #[async_trait]
    impl Transport for MockServer {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.handle(request).await
        }
    }

    fn request_path(url: &str) -> String {
        reqwest::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    fn path_matches(route: &str, path: &str) -> bool {
        path == route
            || path
                .strip_prefix(route)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
