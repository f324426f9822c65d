//! Shared HTTP client construction
//!
//! Scholar pages and the PDF mirror both reject obvious bot traffic, so every
//! client sends desktop-browser headers. An optional proxy applies to all
//! schemes.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Options shared by every outbound client
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            proxy: None,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl HttpOptions {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Check a proxy URL has the `http(s)://host:port` shape
pub fn validate_proxy_url(proxy: &str) -> Result<(), String> {
    let parsed = url::Url::parse(proxy).map_err(|e| format!("Invalid proxy {}: {}", proxy, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("Invalid proxy {}: scheme must be http or https", proxy));
    }
    if parsed.host_str().is_none() || parsed.port_or_known_default().is_none() {
        return Err(format!("Invalid proxy {}: expected host:port", proxy));
    }
    Ok(())
}

/// Build a client with the given options and extra default headers
pub fn build_client(options: &HttpOptions, headers: &[(&str, &str)]) -> Result<Client, String> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("Invalid header name {}: {}", name, e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("Invalid header value for {}: {}", name, e))?;
        default_headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .default_headers(default_headers)
        .redirect(reqwest::redirect::Policy::limited(5));

    if let Some(proxy_url) = &options.proxy {
        validate_proxy_url(proxy_url)?;
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| format!("Invalid proxy {}: {}", proxy_url, e))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))
}
