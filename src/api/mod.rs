//! HTTP client for the media server and the trait the core is written against.

use std::io;
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::model::{ItemPage, MediaItem};

/// A readable byte stream for one item's media file.
pub struct ByteStream {
    /// Content length reported by the server, if any.
    pub len: Option<u64>,
    /// The chunks themselves.
    pub inner: BoxStream<'static, io::Result<Bytes>>,
}

/// The server operations the resolver and scheduler consume.
///
/// The concrete implementation is [`JellyfinClient`]; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Looks an item up by id. `Ok(None)` means the server has no such item.
    async fn item(&self, id: &str) -> Result<Option<MediaItem>>;

    /// Lists children of the given parent, optionally recursively.
    async fn children(&self, parent_id: &str, recursive: bool) -> Result<Vec<MediaItem>>;

    /// Opens the media file of an item as a byte stream.
    async fn open_stream(&self, id: &str) -> Result<ByteStream>;
}

/// Public system information returned before authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    /// Display name of the server.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Server version string.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthUser {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    access_token: String,
    #[serde(default)]
    user: Option<AuthUser>,
}

const CLIENT_NAME: &str = "jelly-dl";
const ITEM_FIELDS: &str = "MediaSources,Path,ParentId";

/// Builds a configured HTTP client for server requests.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// Client for a Jellyfin-compatible media server.
///
/// Construct once at startup from an explicit [`ServerConfig`]; the access
/// token obtained by [`authenticate`](Self::authenticate) is held for the
/// lifetime of the client.
pub struct JellyfinClient {
    http: reqwest::Client,
    base: String,
    config: ServerConfig,
    device_id: String,
    token: RwLock<Option<String>>,
}

impl JellyfinClient {
    /// Creates a client for the server named in `config`.
    #[must_use]
    pub fn new(http: reqwest::Client, config: ServerConfig) -> Self {
        let base = config
            .address
            .as_deref()
            .unwrap_or("http://localhost:8096")
            .trim_end_matches('/')
            .to_string();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.subsec_nanos());
        Self {
            http,
            base,
            config,
            device_id: format!("{}-{:08x}", std::process::id(), nanos),
            token: RwLock::new(None),
        }
    }

    /// Returns the normalized base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn auth_header(&self) -> String {
        let mut header = format!(
            "MediaBrowser Client=\"{CLIENT_NAME}\", Device=\"{CLIENT_NAME}\", \
             DeviceId=\"{}\", Version=\"{}\"",
            self.device_id,
            env!("CARGO_PKG_VERSION"),
        );
        if let Some(token) = self.token.read().ok().and_then(|t| t.clone()) {
            header.push_str(&format!(", Token=\"{token}\""));
        }
        header
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base))
            .header("Authorization", self.auth_header())
    }

    /// Validates that the configured address points at a media server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the server cannot be reached or does not
    /// answer the public system-info endpoint.
    pub async fn connect(&self) -> Result<ServerInfo> {
        let info = self
            .get("/System/Info/Public")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Connect(e.to_string()))?
            .json::<ServerInfo>()
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        Ok(info)
    }

    /// Authenticates with the configured username and password and stores
    /// the access token for subsequent requests.
    ///
    /// Returns the display name of the authenticated user, if the server
    /// reported one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the server rejects the credentials.
    pub async fn authenticate(&self) -> Result<Option<String>> {
        let body = serde_json::json!({
            "Username": self.config.username.as_deref().unwrap_or("admin"),
            "Pw": self.config.password.as_deref().unwrap_or(""),
        });
        let resp = self
            .http
            .post(format!("{}/Users/AuthenticateByName", self.base))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Auth(e.to_string()))?
            .json::<AuthResponse>()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        if let Ok(mut token) = self.token.write() {
            *token = Some(resp.access_token);
        }
        Ok(resp.user.and_then(|u| u.name))
    }

    /// Lists the library views available to the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn user_views(&self) -> Result<Vec<MediaItem>> {
        let page = self
            .get("/UserViews")
            .send()
            .await?
            .error_for_status()?
            .json::<ItemPage>()
            .await?;
        Ok(page.items)
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    async fn item(&self, id: &str) -> Result<Option<MediaItem>> {
        let resp = self
            .get(&format!("/Items/{id}"))
            .query(&[("Fields", ITEM_FIELDS)])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let item = resp.error_for_status()?.json::<MediaItem>().await?;
        Ok(Some(item))
    }

    async fn children(&self, parent_id: &str, recursive: bool) -> Result<Vec<MediaItem>> {
        let page = self
            .get("/Items")
            .query(&[
                ("ParentId", parent_id),
                ("Recursive", if recursive { "true" } else { "false" }),
                ("Fields", ITEM_FIELDS),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<ItemPage>()
            .await?;
        Ok(page.items)
    }

    async fn open_stream(&self, id: &str) -> Result<ByteStream> {
        let resp = self
            .get(&format!("/Items/{id}/File"))
            .send()
            .await?
            .error_for_status()?;
        let len = resp.content_length().filter(|&l| l > 0);
        let inner = resp.bytes_stream().map_err(io::Error::other).boxed();
        Ok(ByteStream { len, inner })
    }
}
