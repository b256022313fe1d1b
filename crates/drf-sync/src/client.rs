//! # DRF API Client
//!
//! Thin wrapper over `reqwest` that knows the API's endpoints and turns every
//! response into either JSON or a classified [`SyncError`].
//!
//! ## Response Classification
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status / body             token endpoints        resource GETs         │
//! │  ───────────────────────   ────────────────────   ────────────────────  │
//! │  2xx, UTF-8, JSON          Ok(json)               Ok(json)              │
//! │  2xx, not UTF-8            Decoding               Decoding              │
//! │  2xx, not JSON             Payload (raw text)     Payload (raw text)    │
//! │  401                       Auth                   Unauthorized          │
//! │  403                       warn + Auth            warn + Permission     │
//! │  other / no response       Transport              Transport             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use drf_core::Token;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::auth::Credentials;
use crate::config::InventoryConfig;
use crate::error::{SyncError, SyncResult};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("drf-inventory/", env!("CARGO_PKG_VERSION"));

const TOKEN_PATH: &str = "token/";
const TOKEN_REFRESH_PATH: &str = "token/refresh/";

/// Which kind of endpoint a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Token,
    Resource,
}

/// HTTP access to `{base_url}/api/`.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_base: Url,
}

impl ApiClient {
    /// Builds a client from the inventory configuration.
    pub fn new(config: &InventoryConfig) -> SyncResult<Self> {
        Self::with_options(
            config.api_base()?,
            config.request_timeout(),
            config.validate_certs,
        )
    }

    /// Builds a client for an explicit API base (must end with `/`).
    pub fn with_options(api_base: Url, timeout: Duration, validate_certs: bool) -> SyncResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .danger_accept_invalid_certs(!validate_certs)
            .build()?;

        Ok(ApiClient { http, api_base })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Resolves a resource path such as `servers/?customer_id=1`.
    pub fn resolve(&self, path: &str) -> SyncResult<Url> {
        Ok(self.api_base.join(path.trim_start_matches('/'))?)
    }

    // =========================================================================
    // Token Endpoints
    // =========================================================================

    /// `POST token/` with username and password.
    pub async fn obtain_token(&self, credentials: &Credentials) -> SyncResult<Token> {
        let url = self.resolve(TOKEN_PATH)?;
        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
        });

        let value = self.post(&url, &body).await?;
        serde_json::from_value(value).map_err(|e| SyncError::Record {
            resource: "token".to_string(),
            message: e.to_string(),
        })
    }

    /// `POST token/refresh/` and return the new access token.
    ///
    /// No `Authorization` header is sent.
    pub async fn refresh_access(&self, refresh: &str) -> SyncResult<String> {
        let url = self.resolve(TOKEN_REFRESH_PATH)?;
        let value = self.post(&url, &json!({ "refresh": refresh })).await?;

        value
            .get("access")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::Record {
                resource: "token refresh".to_string(),
                message: "missing 'access' field".to_string(),
            })
    }

    async fn post(&self, url: &Url, body: &Value) -> SyncResult<Value> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url.clone())
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        read_json(url, response, Endpoint::Token).await
    }

    // =========================================================================
    // Resource Endpoints
    // =========================================================================

    /// Authenticated GET of a resource.
    pub async fn get(&self, url: &Url, access: &str) -> SyncResult<Value> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", access))
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;
        read_json(url, response, Endpoint::Resource).await
    }
}

// =============================================================================
// Classification
// =============================================================================

fn transport_error(url: &Url, err: reqwest::Error) -> SyncError {
    SyncError::Transport {
        url: url.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

/// Emits the user-visible permission warning.
fn permission_warning(url: &Url) {
    warn!(
        %url,
        "Permission denied: {}. This may impair functionality of the inventory plugin.",
        url
    );
}

async fn read_json(url: &Url, response: reqwest::Response, endpoint: Endpoint) -> SyncResult<Value> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| transport_error(url, e))?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).into_owned();
        return Err(classify_status(url, status, body, endpoint));
    }

    decode_body(url, &bytes)
}

fn classify_status(url: &Url, status: StatusCode, body: String, endpoint: Endpoint) -> SyncError {
    let url_text = url.to_string();
    match (status, endpoint) {
        (StatusCode::FORBIDDEN, Endpoint::Resource) => {
            permission_warning(url);
            SyncError::Permission { url: url_text, body }
        }
        (StatusCode::UNAUTHORIZED, Endpoint::Resource) => SyncError::Unauthorized { url: url_text, body },
        (StatusCode::FORBIDDEN, Endpoint::Token) | (StatusCode::UNAUTHORIZED, Endpoint::Token) => {
            if status == StatusCode::FORBIDDEN {
                permission_warning(url);
            }
            SyncError::Auth {
                url: url_text,
                status: status.as_u16(),
                body,
            }
        }
        _ => SyncError::Transport {
            url: url_text,
            status: Some(status.as_u16()),
            message: body,
        },
    }
}

/// UTF-8 check, then JSON parse.
pub(crate) fn decode_body(url: &Url, bytes: &[u8]) -> SyncResult<Value> {
    let text = std::str::from_utf8(bytes).map_err(|_| SyncError::Decoding {
        url: url.to_string(),
    })?;

    serde_json::from_str(text).map_err(|_| SyncError::Payload {
        url: url.to_string(),
        raw: text.to_string(),
    })
}
