//! REST backend for a Dudwalls server.
//!
//! [`HttpStore`] maps every backend call onto a request under
//! `/api/dudwalls/`.

use async_trait::async_trait;
use reqwest::{
    Client, Method, StatusCode, Url,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde_json::{Value, json};
use std::time::Duration;

use dudwalls_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{Document, documents_from_value},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::config::HttpStoreConfig;

const API_PATH: [&str; 2] = ["api", "dudwalls"];
const HEALTH_PATH: [&str; 2] = ["api", "health"];

fn transport_error(err: reqwest::Error) -> DocumentStoreError {
    DocumentStoreError::Transport(err.to_string())
}

/// A Dudwalls server reached over its REST API.
///
/// Every method is one request against `{endpoint}/api/dudwalls`. Path
/// segments (database, collection and document names) are percent-encoded.
/// Successful responses may wrap their payload as `{"data": ...}`; the
/// envelope is removed before the payload is interpreted.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoint: Url,
}

impl HttpStore {
    /// Creates a store for `endpoint` authenticated with `api_key`, using the
    /// default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if the endpoint is not
    /// an absolute http(s) URL or the key cannot be sent as a header.
    pub fn new(endpoint: &str, api_key: &str) -> DocumentStoreResult<Self> {
        Self::from_config(&HttpStoreConfig::new(endpoint, api_key))
    }

    /// Creates a builder.
    pub fn builder(endpoint: impl Into<String>, api_key: impl Into<String>) -> HttpStoreBuilder {
        HttpStoreBuilder::new(endpoint, api_key)
    }

    /// Creates a store from a full configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpStore::new`].
    pub fn from_config(config: &HttpStoreConfig) -> DocumentStoreResult<Self> {
        let endpoint = Url::parse(config.endpoint.trim())
            .map_err(|e| DocumentStoreError::Initialization(format!("invalid endpoint `{}`: {e}", config.endpoint)))?;

        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DocumentStoreError::Initialization(format!(
                "endpoint `{}` must be an http(s) URL",
                config.endpoint
            )));
        }

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| DocumentStoreError::Initialization(format!("invalid API key: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent())
            .timeout(config.timeout())
            .build()
            .map_err(|e| DocumentStoreError::Initialization(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str]) -> DocumentStoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| DocumentStoreError::Initialization(format!("endpoint `{}` cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// `{endpoint}/api/dudwalls/{segments..}`; the API root keeps its trailing slash.
    fn api_url(&self, segments: &[&str]) -> DocumentStoreResult<Url> {
        let mut path: Vec<&str> = API_PATH.iter().copied().collect();
        match segments {
            [] => path.push(""),
            segments => path.extend_from_slice(segments),
        }

        self.url(&path)
    }

    /// Sends a request and returns the status with the decoded body
    /// (`Null` for an empty body).
    async fn execute(&self, method: Method, url: Url, body: Option<&Value>) -> DocumentStoreResult<(StatusCode, Value)> {
        tracing::debug!(%method, %url, "sending request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        tracing::debug!(status = status.as_u16(), bytes = text.len(), "received response");

        if text.trim().is_empty() {
            return Ok((status, Value::Null));
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok((status, value)),
            Err(_) if !status.is_success() => Ok((status, Value::Null)),
            Err(e) => Err(DocumentStoreError::Serialization(format!(
                "response from server is not JSON: {e}"
            ))),
        }
    }

    /// Sends a request and returns the unwrapped payload.
    async fn call(&self, method: Method, segments: &[&str], body: Option<&Value>) -> DocumentStoreResult<Value> {
        let (status, body) = self.execute(method, self.api_url(segments)?, body).await?;
        unwrap_envelope(status, body)
    }
}

/// Maps error statuses to [`DocumentStoreError::Api`] and strips the `data`
/// envelope from successful responses.
fn unwrap_envelope(status: StatusCode, body: Value) -> DocumentStoreResult<Value> {
    if status.is_client_error() || status.is_server_error() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        return Err(DocumentStoreError::Api {
            status: status.as_u16(),
            message,
        });
    }

    match body {
        Value::Object(mut map) if map.contains_key("data") => Ok(map.remove("data").unwrap_or(Value::Null)),
        other => Ok(other),
    }
}

/// Reads a list of names, given either as strings or as `{"name": ...}` objects.
fn names_from_value(payload: Value) -> DocumentStoreResult<Vec<String>> {
    let items = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(DocumentStoreError::Serialization(format!(
                "expected a list of names, got {other}"
            )));
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            Value::Object(mut map) => match map.remove("name") {
                Some(Value::String(name)) => Ok(name),
                _ => Err(DocumentStoreError::Serialization("listed entry has no `name`".to_string())),
            },
            other => Err(DocumentStoreError::Serialization(format!("unexpected list entry {other}"))),
        })
        .collect()
}

#[async_trait]
impl StoreBackend for HttpStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        let (status, body) = self.execute(Method::GET, self.url(&HEALTH_PATH)?, None).await?;
        unwrap_envelope(status, body)?;

        Ok(())
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        names_from_value(self.call(Method::GET, &[], None).await?)
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        self.call(Method::POST, &[], Some(&json!({ "name": name })))
            .await?;

        Ok(())
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        self.call(Method::DELETE, &[name], None).await?;

        Ok(())
    }

    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>> {
        names_from_value(self.call(Method::GET, &[database], None).await?)
    }

    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        self.call(Method::POST, &[database], Some(&json!({ "name": name })))
            .await?;

        Ok(())
    }

    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        self.call(Method::DELETE, &[database, name], None).await?;

        Ok(())
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        match self.call(Method::GET, &[database, collection], None).await? {
            Value::Null => Ok(Vec::new()),
            payload => documents_from_value(payload),
        }
    }

    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let url = self.api_url(&[database, collection, id])?;
        let (status, body) = self.execute(Method::GET, url, None).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        match unwrap_envelope(status, body)? {
            Value::Null => Ok(None),
            Value::Object(document) => Ok(Some(document)),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, got {other}"
            ))),
        }
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document> {
        let sent = document.clone();
        let body = Value::Object(document);

        match self.call(Method::POST, &[database, collection], Some(&body)).await? {
            Value::Object(stored) => Ok(stored),
            // acknowledged without echoing the document back
            _ => Ok(sent),
        }
    }

    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document> {
        let body = Value::Object(update);

        match self.call(Method::PUT, &[database, collection, id], Some(&body)).await? {
            Value::Object(stored) if !stored.is_empty() => Ok(stored),
            _ => self
                .get_document(database, collection, id)
                .await?
                .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string())),
        }
    }

    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()> {
        self.call(Method::DELETE, &[database, collection, id], None)
            .await?;

        Ok(())
    }
}

/// Builder for [`HttpStore`].
///
/// ```ignore
/// use dudwalls::{backend::StoreBackendBuilder, http::HttpStoreBuilder};
///
/// let store = HttpStoreBuilder::from_env()?
///     .timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpStoreBuilder {
    config: HttpStoreConfig,
}

impl HttpStoreBuilder {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::from_config(HttpStoreConfig::new(endpoint, api_key))
    }

    pub fn from_config(config: HttpStoreConfig) -> Self {
        Self { config }
    }

    /// Starts from `DUDWALLS_ENDPOINT`, `DUDWALLS_API_KEY` and
    /// `DUDWALLS_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// See [`HttpStoreConfig::from_env`].
    pub fn from_env() -> DocumentStoreResult<Self> {
        Ok(Self::from_config(HttpStoreConfig::from_env()?))
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    /// Sets the per-request timeout, rounded down to whole seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Returns the configuration collected so far.
    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }
}

#[async_trait]
impl StoreBackendBuilder for HttpStoreBuilder {
    type Backend = HttpStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        HttpStore::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_percent_encoded_api_urls() {
        let store = HttpStore::new("https://db.example.com/", "key").unwrap();

        assert_eq!(store.api_url(&[]).unwrap().as_str(), "https://db.example.com/api/dudwalls/");
        assert_eq!(
            store.api_url(&["my db", "users", "a/b"]).unwrap().as_str(),
            "https://db.example.com/api/dudwalls/my%20db/users/a%2Fb"
        );
    }

    #[test]
    fn keeps_endpoint_path_prefix() {
        let store = HttpStore::new("http://host:8080/proxy", "key").unwrap();
        assert_eq!(store.api_url(&["app"]).unwrap().as_str(), "http://host:8080/proxy/api/dudwalls/app");
    }

    #[test]
    fn rejects_unusable_endpoints() {
        assert!(HttpStore::new("not a url", "key").is_err());
        assert!(HttpStore::new("mailto:ops@example.com", "key").is_err());
        assert!(HttpStore::new("http://host", "bad\nkey").is_err());
    }

    #[test]
    fn envelope_and_error_mapping() {
        assert_eq!(
            unwrap_envelope(StatusCode::OK, serde_json::json!({"data": [1]})).unwrap(),
            serde_json::json!([1])
        );
        assert_eq!(
            unwrap_envelope(StatusCode::OK, serde_json::json!({"id": "x"})).unwrap(),
            serde_json::json!({"id": "x"})
        );

        match unwrap_envelope(StatusCode::BAD_REQUEST, serde_json::json!({"error": "bad name"})) {
            Err(DocumentStoreError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad name");
            }
            other => panic!("unexpected {other:?}"),
        }

        match unwrap_envelope(StatusCode::BAD_GATEWAY, Value::Null) {
            Err(DocumentStoreError::Api { message, .. }) => assert_eq!(message, "HTTP 502"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn names_accept_strings_and_objects() {
        let names = names_from_value(serde_json::json!(["a", {"name": "b"}])).unwrap();
        assert_eq!(names, ["a", "b"]);
        assert!(names_from_value(serde_json::json!({"a": 1})).is_err());
    }
}
