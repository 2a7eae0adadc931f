//! reqwest-backed transport

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, UiRequest};

const SAIL_CONTENT_TYPE: &str = "application/vnd.appian.tv+json";
const SAIL_ACCEPT: &str = "application/vnd.appian.tv.ui+json";

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Server root, e.g. `https://site.example.com`
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    pub user_agent: String,

    /// Talk to a public portal instead of a signed-in site
    pub portals_mode: bool,

    /// Extra headers sent with every request, e.g. feature flags
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            request_timeout_secs: 300,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            portals_mode: false,
            extra_headers: BTreeMap::new(),
        }
    }
}

impl HttpConfig {
    /// Load configuration from a TOML file, or defaults when it does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Absolute URL for `uri`, which may already be absolute
    pub fn resolve(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), uri)
        }
    }
}

/// [`Transport`] over a cookie-keeping reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn with_common_headers(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder = builder
            .header("Accept", SAIL_ACCEPT)
            .header("X-Appian-Ui-State", "stateful");
        if self.config.portals_mode {
            builder = builder.header("X-Client-Mode", "SERVERLESS");
        }
        for (name, value) in &self.config.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn read_json(url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned {}", url, status);
            return Err(Error::Transport {
                uri: url.to_string(),
                status: Some(status.as_u16()),
                message: body,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, request: UiRequest) -> Result<Value> {
        let url = self.config.resolve(&request.uri);
        debug!("POST {} [{}]", url, request.label);

        let mut builder = self
            .with_common_headers(self.client.post(&url))
            .header("Content-Type", SAIL_CONTENT_TYPE);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = serde_json::to_vec(&request.payload)?;
        let response = builder.body(body).send().await?;
        Self::read_json(&url, response).await
    }

    async fn get(&self, uri: &str, label: &str) -> Result<Value> {
        let url = self.config.resolve(uri);
        debug!("GET {} [{}]", url, label);
        let response = self.with_common_headers(self.client.get(&url)).send().await?;
        Self::read_json(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HttpConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.request_timeout_secs, 300);
        assert!(!config.portals_mode);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("http.toml");
        std::fs::write(
            &path,
            r#"
base_url = "https://site.example.com/"
portals_mode = true

[extra_headers]
X-Appian-Features = "7ffceebc"
"#,
        )
        .unwrap();
        let config = HttpConfig::load(&path).unwrap();
        assert!(config.portals_mode);
        assert_eq!(config.extra_headers["X-Appian-Features"], "7ffceebc");
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.resolve("/suite/rest/a"), "https://site.example.com/suite/rest/a");
        assert_eq!(config.resolve("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_transport_builds() {
        assert!(HttpTransport::new(HttpConfig::default()).is_ok());
    }
}
