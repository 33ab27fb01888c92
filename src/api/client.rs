// Dashboard API HTTP client.
// JSON get/post/patch/delete against the versioned API root, plus unversioned root access.

use reqwest::{
    Client, Method, RequestBuilder, Response,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{Result, SyncError};

use super::paths::ApiPath;

const USER_AGENT_VALUE: &str = concat!("summary-sync/", env!("CARGO_PKG_VERSION"));

/// HTTP transport for the dashboard API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    /// Server root, used for unversioned paths such as health.
    root_url: Url,
    /// Root plus versioned prefix, used for every resource path.
    api_url: Url,
}

impl ApiClient {
    /// Build the client. The base URL must be an absolute http(s) URL.
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let root_url = parse_base_url(&settings.base_url)?;
        let prefix = ApiPath::from_slashed(&settings.api_prefix);
        let api_url = prefix.resolve(&root_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()
            .map_err(SyncError::Request)?;

        Ok(Self {
            client,
            root_url,
            api_url,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    /// GET a versioned path.
    pub async fn get<T: DeserializeOwned>(&self, path: &ApiPath) -> Result<T> {
        let request = self.request(Method::GET, &self.api_url, path)?;
        self.send(request).await
    }

    /// GET a versioned path with query parameters.
    pub async fn get_with_params<T, P>(&self, path: &ApiPath, params: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let request = self.request(Method::GET, &self.api_url, path)?.query(params);
        self.send(request).await
    }

    /// POST to a versioned path, with an optional JSON body.
    pub async fn post<T, B>(&self, path: &ApiPath, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.request(Method::POST, &self.api_url, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    /// PATCH a versioned path with a JSON body.
    pub async fn patch<T, B>(&self, path: &ApiPath, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PATCH, &self.api_url, path)?.json(body);
        self.send(request).await
    }

    /// DELETE a versioned path. Any response body is ignored.
    pub async fn delete(&self, path: &ApiPath) -> Result<()> {
        let request = self.request(Method::DELETE, &self.api_url, path)?;
        let response = request.send().await?;
        check_response(response).await?;
        Ok(())
    }

    /// GET a path relative to the unversioned server root.
    pub async fn get_root<T: DeserializeOwned>(&self, path: &ApiPath) -> Result<T> {
        let request = self.request(Method::GET, &self.root_url, path)?;
        self.send(request).await
    }

    fn request(&self, method: Method, base: &Url, path: &ApiPath) -> Result<RequestBuilder> {
        let url = path.resolve(base)?;
        debug!(method = %method, url = %url, "api request");
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check_response(response).await?;
        let body = response.text().await?;
        decode_body(&body)
    }
}

/// Parse the configured server root, rejecting anything that cannot carry API paths.
fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim())
        .map_err(|err| SyncError::Config(format!("invalid api.base_url '{}': {}", base_url, err)))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(SyncError::Config(format!(
            "api.base_url '{}' must be an http(s) URL",
            base_url
        )));
    }
    Ok(url)
}

/// Decode a JSON body; an empty body reads as `null`.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let body = body.trim();
    let value = if body.is_empty() {
        serde_json::from_str("null")?
    } else {
        serde_json::from_str(body)?
    };
    Ok(value)
}

/// Turn non-success responses into `SyncError::Http`.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "request failed".to_string());

    warn!(status = status.as_u16(), url = %url, message = %message, "api error response");
    Err(SyncError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Pull a human-readable message out of an error body.
/// Accepts `{"detail": "..."}`, `{"detail": {"message": "..."}}`, `{"message": "..."}`,
/// `{"error": "..."}`, or falls back to the raw text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.to_string());
    };

    let candidates = [
        json.get("detail").and_then(|d| d.as_str()),
        json.get("detail")
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str()),
        json.get("message").and_then(|m| m.as_str()),
        json.get("error").and_then(|e| e.as_str()),
    ];

    candidates
        .into_iter()
        .flatten()
        .next()
        .map(str::to_string)
        .or_else(|| Some(body.to_string()))
}
