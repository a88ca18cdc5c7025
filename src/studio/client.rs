//! Studio API Client
//!
//! Communicates with the Framecut Studio platform: projects, credits,
//! brand kit, assets, feedback, and referrals. Requests carry the
//! configured credentials, retry on transient failures with exponential
//! backoff, and unwrap the standard `{success, data|error}` envelope.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::types::{ProjectStatus, ProjectStatusSource};

use super::error::{StudioError, StudioResult};

/// Default per-attempt timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for multipart uploads of large media files.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Timeout for streaming file downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const DEFAULT_USER_AGENT: &str = "framecut-gateway/0.1.0";
const DEFAULT_MAX_RETRIES: u32 = 3;

// ─── Auth Context ────────────────────────────────────────────────

/// Immutable credential set. A request snapshots the client's current
/// context at entry; rotation produces a new context instead of
/// mutating one in place.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    api_key: Option<String>,
    bearer_token: Option<String>,
    basic_auth: Option<String>,
}

impl AuthContext {
    pub fn new(
        api_key: Option<String>,
        bearer_token: Option<String>,
        basic_auth: Option<String>,
    ) -> Self {
        Self {
            api_key: api_key.filter(|v| !v.is_empty()),
            bearer_token: bearer_token.filter(|v| !v.is_empty()),
            basic_auth: basic_auth.filter(|v| !v.is_empty()),
        }
    }

    /// Rotate to an API key, clearing any bearer token.
    pub fn with_api_key(&self, key: Option<String>) -> Self {
        Self {
            api_key: key.filter(|v| !v.is_empty()),
            bearer_token: None,
            basic_auth: self.basic_auth.clone(),
        }
    }

    /// Rotate to a bearer token, clearing any API key.
    pub fn with_bearer_token(&self, token: Option<String>) -> Self {
        Self {
            api_key: None,
            bearer_token: token.filter(|v| !v.is_empty()),
            basic_auth: self.basic_auth.clone(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.bearer_token.is_some()
    }

    /// The `Authorization: Basic ...` value, if basic credentials are set.
    pub fn basic_header(&self) -> Option<String> {
        self.basic_auth.as_ref().map(|creds| {
            format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(creds)
            )
        })
    }

    /// Build the auth headers for a request.
    ///
    /// API keys combine with HTTP Basic credentials; a bearer token
    /// occupies the Authorization header, so basic auth cannot be sent
    /// alongside it. With neither credential configured this fails with
    /// `missing_auth` before any network call.
    pub fn headers(&self) -> StudioResult<Vec<(String, String)>> {
        if let Some(ref key) = self.api_key {
            let mut headers = Vec::new();
            if let Some(basic) = self.basic_header() {
                headers.push(("Authorization".to_string(), basic));
            }
            headers.push(("X-API-Key".to_string(), key.clone()));
            return Ok(headers);
        }
        if let Some(ref token) = self.bearer_token {
            return Ok(vec![(
                "Authorization".to_string(),
                format!("Bearer {}", token),
            )]);
        }
        Err(StudioError::missing_auth())
    }
}

// ─── Request Options ─────────────────────────────────────────────

/// Multipart body described by path so every retry attempt can open a
/// fresh file stream.
#[derive(Clone, Debug)]
pub struct MultipartSpec {
    pub file_path: PathBuf,
    pub fields: Vec<(String, String)>,
}

#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartSpec),
}

#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn json(body: Value) -> Self {
        Self {
            body: RequestBody::Json(body),
            ..Self::default()
        }
    }

    pub fn multipart(spec: MultipartSpec) -> Self {
        Self {
            body: RequestBody::Multipart(spec),
            timeout: Some(UPLOAD_TIMEOUT),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for constructing a `StudioClient`.
#[derive(Clone, Debug)]
pub struct StudioClientOptions {
    pub api_endpoint: String,
    pub auth: AuthContext,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for StudioClientOptions {
    fn default() -> Self {
        Self {
            api_endpoint: "https://framecut.app".to_string(),
            auth: AuthContext::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

// ─── Client ──────────────────────────────────────────────────────

pub struct StudioClient {
    base_url: String,
    base: Url,
    auth: RwLock<AuthContext>,
    max_retries: u32,
    user_agent: String,
    http: reqwest::Client,
}

impl StudioClient {
    pub fn new(options: StudioClientOptions) -> StudioResult<Self> {
        let base_url = options.api_endpoint.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| {
            StudioError::new(
                "invalid_endpoint",
                400,
                format!("Invalid API endpoint '{}': {}", base_url, e),
            )
        })?;

        Ok(Self {
            base_url,
            base,
            auth: RwLock::new(options.auth),
            max_retries: options.max_retries,
            user_agent: options.user_agent,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Snapshot of the current auth context.
    pub fn auth(&self) -> AuthContext {
        self.auth.read().expect("auth lock poisoned").clone()
    }

    /// Replace the auth context. Used by the setup flow after a new API
    /// key has been generated.
    pub fn rotate_auth(&self, next: AuthContext) {
        *self.auth.write().expect("auth lock poisoned") = next;
    }

    /// Resolve a path against the API root.
    ///
    /// Absolute URLs pass through untouched (server-provided download
    /// links). Relative paths are namespaced under `/api/v1` unless they
    /// already carry the unversioned `/api/` prefix (socket token
    /// issuance and other endpoints outside the versioned surface).
    pub fn resolve_url(&self, path: &str) -> StudioResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| {
                StudioError::new("invalid_url", 400, format!("Invalid URL '{}': {}", path, e))
            });
        }

        let normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let full = if normalized.starts_with("/api/") {
            format!("{}{}", self.base_url, normalized)
        } else {
            format!("{}/api/v1{}", self.base_url, normalized)
        };

        Url::parse(&full).map_err(|e| {
            StudioError::new("invalid_url", 400, format!("Invalid URL '{}': {}", full, e))
        })
    }

    /// Exponential backoff for retryable failures, capped at 8 seconds.
    pub fn backoff_ms(attempt: u32) -> u64 {
        2u64.saturating_pow(attempt).saturating_mul(1000).min(8000)
    }

    fn is_retryable_status(status: u16) -> bool {
        status >= 500 || status == 429
    }

    /// Headers for one attempt: auth (only when the target host matches
    /// the configured base host), caller headers, and a User-Agent
    /// fallback when the caller did not supply one.
    fn build_headers(&self, url: &Url, extra: &[(String, String)]) -> StudioResult<HeaderMap> {
        let mut map = HeaderMap::new();

        if url.host_str() == self.base.host_str() {
            for (name, value) in self.auth().headers()? {
                insert_header(&mut map, &name, &value)?;
            }
        }

        let mut has_user_agent = false;
        for (name, value) in extra {
            if name.eq_ignore_ascii_case("user-agent") {
                has_user_agent = true;
            }
            insert_header(&mut map, name, value)?;
        }

        if !has_user_agent {
            insert_header(&mut map, "User-Agent", &self.user_agent)?;
        }

        Ok(map)
    }

    async fn build_multipart(&self, spec: &MultipartSpec) -> StudioResult<reqwest::multipart::Form> {
        let file = tokio::fs::File::open(&spec.file_path).await.map_err(|e| {
            StudioError::new(
                "file_not_found",
                400,
                format!("Cannot open {}: {}", spec.file_path.display(), e),
            )
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| StudioError::network(e.to_string()))?
            .len();

        let file_name = spec
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());

        let stream = tokio_util::io::ReaderStream::new(file);
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            length,
        )
        .file_name(file_name);

        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (name, value) in &spec.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }

    /// Perform one logical JSON request with retries, returning the
    /// unwrapped envelope payload.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> StudioResult<Value> {
        match self.run(method, path, options, false).await? {
            Outcome::Json(value) => Ok(value),
            Outcome::Raw(_) => unreachable!("raw outcome from json request"),
        }
    }

    /// Perform one logical request with retries, returning the live
    /// response without parsing. Used for streaming downloads.
    pub async fn request_raw(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> StudioResult<Response> {
        match self.run(method, path, options, true).await? {
            Outcome::Raw(response) => Ok(response),
            Outcome::Json(_) => unreachable!("json outcome from raw request"),
        }
    }

    async fn run(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
        raw: bool,
    ) -> StudioResult<Outcome> {
        let url = self.resolve_url(path)?;
        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        // Credential check happens up front so a misconfigured client
        // fails before touching the network.
        let headers = self.build_headers(&url, &options.headers)?;

        for attempt in 0..=self.max_retries {
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone())
                .timeout(timeout);

            builder = match &options.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(value),
                RequestBody::Multipart(spec) => builder.multipart(self.build_multipart(spec).await?),
            };

            let response = match builder.send().await {
                Ok(response) => response,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(if err.is_timeout() {
                            StudioError::timeout("Request timed out")
                        } else {
                            StudioError::network(err.to_string())
                        });
                    }
                    debug!(
                        "attempt {} for {} {} failed: {}, backing off",
                        attempt + 1,
                        method,
                        url,
                        err
                    );
                    tokio::time::sleep(Duration::from_millis(Self::backoff_ms(attempt))).await;
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 && attempt < self.max_retries {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(10);
                let wait = (retry_after * 1000).max(1000);
                debug!("rate limited on {} {}, waiting {}ms", method, url, wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
                continue;
            }

            if raw {
                if !(200..300).contains(&status) {
                    return Err(StudioError::request_failed(status));
                }
                return Ok(Outcome::Raw(response));
            }

            let payload = match response.text().await {
                Ok(text) => parse_payload(&text),
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(if err.is_timeout() {
                            StudioError::timeout("Request timed out")
                        } else {
                            StudioError::network(err.to_string())
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(Self::backoff_ms(attempt))).await;
                    continue;
                }
            };

            if !(200..300).contains(&status) {
                if Self::is_retryable_status(status) && attempt < self.max_retries {
                    tokio::time::sleep(Duration::from_millis(Self::backoff_ms(attempt))).await;
                    continue;
                }
                return Err(remote_error(&payload, status));
            }

            if payload.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(remote_error(&payload, status));
            }

            return Ok(Outcome::Json(unwrap_data(payload)));
        }

        Err(StudioError::retry_exhausted())
    }

    // ── Auth & Socket ────────────────────────────────────────────

    /// Request a one-time socket verification token. Lives outside the
    /// versioned API surface.
    pub async fn get_socket_token(&self) -> StudioResult<Value> {
        self.request(Method::POST, "/api/auth/socket", RequestOptions::default())
            .await
    }

    // ── Credits & Pricing ────────────────────────────────────────

    pub async fn get_credits(&self) -> StudioResult<Value> {
        self.request(Method::GET, "/credits", RequestOptions::default())
            .await
    }

    pub async fn get_pricing(&self) -> StudioResult<Value> {
        self.request(Method::GET, "/pricing", RequestOptions::default())
            .await
    }

    pub async fn estimate_cost(&self, payload: Value) -> StudioResult<Value> {
        self.request(Method::POST, "/estimate", RequestOptions::json(payload))
            .await
    }

    pub async fn get_analytics(&self, period: Option<&str>) -> StudioResult<Value> {
        let path = match period {
            Some(period) => format!("/analytics?period={}", urlencoding::encode(period)),
            None => "/analytics".to_string(),
        };
        self.request(Method::GET, &path, RequestOptions::default())
            .await
    }

    // ── Brand & Assets ───────────────────────────────────────────

    pub async fn get_brand(&self) -> StudioResult<Value> {
        self.request(Method::GET, "/brand", RequestOptions::default())
            .await
    }

    pub async fn update_brand(&self, payload: Value) -> StudioResult<Value> {
        self.request(Method::PUT, "/brand", RequestOptions::json(payload))
            .await
    }

    pub async fn import_brand(&self, url: &str, apply: bool) -> StudioResult<Value> {
        let body = serde_json::json!({ "url": url.trim(), "apply": apply });
        self.request(Method::POST, "/brand/import", RequestOptions::json(body))
            .await
    }

    pub async fn list_assets(&self) -> StudioResult<Value> {
        self.request(Method::GET, "/assets", RequestOptions::default())
            .await
    }

    pub async fn upload_asset(&self, asset_type: &str, file_path: &Path) -> StudioResult<Value> {
        let spec = MultipartSpec {
            file_path: file_path.to_path_buf(),
            fields: Vec::new(),
        };
        self.request(
            Method::POST,
            &format!("/assets/{}", urlencoding::encode(asset_type)),
            RequestOptions::multipart(spec),
        )
        .await
    }

    pub async fn delete_asset(&self, asset_id: &str) -> StudioResult<Value> {
        self.request(
            Method::DELETE,
            &format!("/assets/{}", urlencoding::encode(asset_id)),
            RequestOptions::default(),
        )
        .await
    }

    // ── Projects ─────────────────────────────────────────────────

    pub async fn upload_project(
        &self,
        file_path: &Path,
        options: UploadProjectOptions,
    ) -> StudioResult<Value> {
        let mut fields = Vec::new();
        if let Some(name) = options.name {
            fields.push(("name".to_string(), name));
        }
        if let Some(configuration) = options.configuration {
            fields.push((
                "configuration".to_string(),
                serde_json::to_string(&configuration)
                    .map_err(|e| StudioError::new("invalid_configuration", 400, e.to_string()))?,
            ));
        }
        if let Some(priority) = options.priority {
            fields.push(("priority".to_string(), priority));
        }
        if let Some(webhook_url) = options.webhook_url {
            fields.push(("webhookUrl".to_string(), webhook_url));
        }
        if let Some(webhook_secret) = options.webhook_secret {
            fields.push(("webhookSecret".to_string(), webhook_secret));
        }

        let spec = MultipartSpec {
            file_path: file_path.to_path_buf(),
            fields,
        };
        self.request(
            Method::POST,
            "/projects/upload",
            RequestOptions::multipart(spec),
        )
        .await
    }

    pub async fn get_project_status(&self, project_id: &str) -> StudioResult<ProjectStatus> {
        let value = self
            .request(
                Method::GET,
                &format!("/projects/{}/status", project_id),
                RequestOptions::default(),
            )
            .await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub async fn get_project_results(&self, project_id: &str) -> StudioResult<Value> {
        self.request(
            Method::GET,
            &format!("/projects/{}/results", project_id),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn list_project_thumbnails(&self, project_id: &str) -> StudioResult<Value> {
        self.request(
            Method::GET,
            &format!("/projects/{}/thumbnails", project_id),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn generate_project_thumbnails(
        &self,
        project_id: &str,
        payload: Value,
    ) -> StudioResult<Value> {
        self.request(
            Method::POST,
            &format!("/projects/{}/thumbnails/generate", project_id),
            RequestOptions::json(payload),
        )
        .await
    }

    pub async fn rerender_project(
        &self,
        project_id: &str,
        configuration: Value,
    ) -> StudioResult<Value> {
        let body = serde_json::json!({ "configuration": configuration });
        self.request(
            Method::POST,
            &format!("/projects/{}/rerender", project_id),
            RequestOptions::json(body),
        )
        .await
    }

    pub async fn list_projects(&self, limit: u64, offset: u64) -> StudioResult<Value> {
        self.request(
            Method::GET,
            &format!("/projects?limit={}&offset={}", limit, offset),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn delete_project(&self, project_id: &str) -> StudioResult<Value> {
        self.request(
            Method::DELETE,
            &format!("/projects/{}", project_id),
            RequestOptions::default(),
        )
        .await
    }

    // ── Feedback & Referral ──────────────────────────────────────

    pub async fn submit_feedback(
        &self,
        payload: Value,
        headers: Vec<(String, String)>,
    ) -> StudioResult<Value> {
        let mut options = RequestOptions::json(payload);
        options.headers = headers;
        self.request(Method::POST, "/feedback", options).await
    }

    pub async fn get_referral(&self) -> StudioResult<Value> {
        self.request(Method::GET, "/referral", RequestOptions::default())
            .await
    }

    pub async fn apply_referral_code(&self, code: &str) -> StudioResult<Value> {
        let body = serde_json::json!({ "code": code.trim() });
        self.request(Method::POST, "/referral/apply", RequestOptions::json(body))
            .await
    }

    // ── Downloads ────────────────────────────────────────────────

    /// Stream a file to disk. `url_or_path` may be a server-relative
    /// path or a fully-qualified (possibly pre-signed, third-party) URL;
    /// credentials are only attached for the configured host.
    pub async fn download_file(
        &self,
        url_or_path: &str,
        destination: &Path,
    ) -> StudioResult<DownloadedFile> {
        use futures::StreamExt;

        let url = self.resolve_url(url_or_path)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StudioError::network(format!("Cannot create output dir: {}", e)))?;
        }

        let response = self
            .request_raw(
                Method::GET,
                url.as_str(),
                RequestOptions::default().timeout(DOWNLOAD_TIMEOUT),
            )
            .await?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| StudioError::network(format!("Cannot create file: {}", e)))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StudioError::network(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| StudioError::network(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| StudioError::network(e.to_string()))?;

        Ok(DownloadedFile {
            path: destination.to_path_buf(),
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl ProjectStatusSource for StudioClient {
    async fn fetch_status(&self, project_id: &str) -> StudioResult<ProjectStatus> {
        self.get_project_status(project_id).await
    }
}

/// Options accepted by `upload_project`.
#[derive(Clone, Debug, Default)]
pub struct UploadProjectOptions {
    pub name: Option<String>,
    pub configuration: Option<Value>,
    pub priority: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub url: String,
}

enum Outcome {
    Json(Value),
    Raw(Response),
}

/// Parse a response body: empty bodies become null, non-JSON bodies
/// pass through as raw text.
fn parse_payload(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Unwrap a successful envelope: a literal `data` key returns its
/// value, anything else returns the payload verbatim.
fn unwrap_data(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Build an error from the remote envelope, passing embedded codes
/// through verbatim.
fn remote_error(payload: &Value, status: u16) -> StudioError {
    let code = payload
        .pointer("/error/code")
        .and_then(Value::as_str)
        .unwrap_or("request_failed");
    let message = payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status));
    let details = payload
        .pointer("/error/details")
        .cloned()
        .unwrap_or(Value::Null);

    StudioError::new(code, status, message).with_details(details)
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> StudioResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| StudioError::new("invalid_header", 400, e.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| StudioError::new("invalid_header", 400, e.to_string()))?;
    map.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> StudioClient {
        StudioClient::new(StudioClientOptions {
            api_endpoint: "https://framecut.app".to_string(),
            auth: AuthContext::new(Some("fk_test".into()), None, None),
            ..StudioClientOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_is_capped_and_monotonic() {
        let mut previous = 0;
        for attempt in 0..=10 {
            let backoff = StudioClient::backoff_ms(attempt);
            assert_eq!(backoff, (2u64.pow(attempt) * 1000).min(8000));
            assert!(backoff >= previous);
            assert!(backoff <= 8000);
            previous = backoff;
        }
        assert_eq!(StudioClient::backoff_ms(0), 1000);
        assert_eq!(StudioClient::backoff_ms(3), 8000);
        assert_eq!(StudioClient::backoff_ms(10), 8000);
    }

    #[test]
    fn test_resolve_url_versions_relative_paths() {
        let client = client();
        assert_eq!(
            client.resolve_url("/credits").unwrap().as_str(),
            "https://framecut.app/api/v1/credits"
        );
        assert_eq!(
            client.resolve_url("credits").unwrap().as_str(),
            "https://framecut.app/api/v1/credits"
        );
    }

    #[test]
    fn test_resolve_url_keeps_unversioned_api_prefix() {
        let client = client();
        assert_eq!(
            client.resolve_url("/api/auth/socket").unwrap().as_str(),
            "https://framecut.app/api/auth/socket"
        );
    }

    #[test]
    fn test_resolve_url_passes_absolute_urls_through() {
        let client = client();
        assert_eq!(
            client
                .resolve_url("https://cdn.example.com/file.mp4?sig=abc")
                .unwrap()
                .as_str(),
            "https://cdn.example.com/file.mp4?sig=abc"
        );
    }

    #[test]
    fn test_auth_headers_prefer_api_key_with_basic() {
        let auth = AuthContext::new(
            Some("fk_live".into()),
            Some("tok".into()),
            Some("user:pass".into()),
        );
        let headers = auth.headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "Authorization");
        assert!(headers[0].1.starts_with("Basic "));
        assert_eq!(headers[1], ("X-API-Key".to_string(), "fk_live".to_string()));
    }

    #[test]
    fn test_auth_headers_bearer_excludes_basic() {
        let auth = AuthContext::new(None, Some("tok".into()), Some("user:pass".into()));
        let headers = auth.headers().unwrap();
        assert_eq!(
            headers,
            vec![("Authorization".to_string(), "Bearer tok".to_string())]
        );
    }

    #[test]
    fn test_auth_headers_missing_credentials() {
        let auth = AuthContext::new(None, None, Some("user:pass".into()));
        let err = auth.headers().unwrap_err();
        assert_eq!(err.code, "missing_auth");
        assert_eq!(err.status, 401);
    }

    #[test]
    fn test_auth_rotation_clears_opposite_credential() {
        let auth = AuthContext::new(None, Some("tok".into()), Some("u:p".into()));
        let rotated = auth.with_api_key(Some("fk_new".into()));
        let headers = rotated.headers().unwrap();
        assert!(headers.iter().any(|(k, _)| k == "X-API-Key"));
        assert!(!headers.iter().any(|(_, v)| v.starts_with("Bearer")));

        let back = rotated.with_bearer_token(Some("tok2".into()));
        assert_eq!(
            back.headers().unwrap(),
            vec![("Authorization".to_string(), "Bearer tok2".to_string())]
        );
    }

    #[test]
    fn test_build_headers_skips_auth_for_foreign_host() {
        let client = client();
        let foreign = Url::parse("https://cdn.example.com/file.mp4").unwrap();
        let map = client.build_headers(&foreign, &[]).unwrap();
        assert!(map.get("x-api-key").is_none());
        assert!(map.get("user-agent").is_some());

        let own = client.resolve_url("/credits").unwrap();
        let map = client.build_headers(&own, &[]).unwrap();
        assert!(map.get("x-api-key").is_some());
    }

    #[test]
    fn test_build_headers_caller_user_agent_wins() {
        let client = client();
        let url = client.resolve_url("/credits").unwrap();
        let map = client
            .build_headers(&url, &[("User-Agent".to_string(), "custom/2.0".to_string())])
            .unwrap();
        assert_eq!(map.get("user-agent").unwrap(), "custom/2.0");
    }

    #[test]
    fn test_parse_payload_shapes() {
        assert_eq!(parse_payload(""), Value::Null);
        assert_eq!(parse_payload("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_payload("plain text"), json!("plain text"));
    }

    #[test]
    fn test_unwrap_data_only_with_literal_key() {
        let enveloped = json!({"success": true, "data": {"x": 1}});
        assert_eq!(unwrap_data(enveloped), json!({"x": 1}));

        let bare = json!({"success": true, "status": "ok"});
        assert_eq!(unwrap_data(bare.clone()), bare);

        // Explicit null data still counts as present.
        let null_data = json!({"success": true, "data": null});
        assert_eq!(unwrap_data(null_data), Value::Null);
    }

    #[test]
    fn test_remote_error_passes_codes_through() {
        let payload = json!({
            "success": false,
            "error": {"code": "invalid_code", "message": "Bad code", "details": {"hint": 1}}
        });
        let err = remote_error(&payload, 400);
        assert_eq!(err.code, "invalid_code");
        assert_eq!(err.message, "Bad code");
        assert_eq!(err.details.unwrap()["hint"], 1);

        let err = remote_error(&Value::Null, 502);
        assert_eq!(err.code, "request_failed");
        assert_eq!(err.status, 502);
    }
}
