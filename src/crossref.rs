//! Crossref DOI lookup
//!
//! API docs: https://api.crossref.org/swagger-ui/index.html
//! Free access; including a contact email puts requests in the "polite" pool.

use crate::http::{build_client, HttpOptions};
use reqwest::Client;
use serde::Deserialize;

pub const CROSSREF_BASE_URL: &str = "https://api.crossref.org";

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    #[serde(default)]
    message: CrossrefMessage,
}

#[derive(Debug, Default, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefWork>,
}

#[derive(Debug, Deserialize)]
struct CrossrefWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

pub struct CrossrefClient {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefClient {
    pub fn new(options: &HttpOptions, mailto: Option<String>) -> Result<Self, String> {
        Ok(Self {
            client: build_client(options, &[("Accept", "application/json")])?,
            base_url: CROSSREF_BASE_URL.to_string(),
            mailto: mailto.filter(|m| !m.is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// DOI of the best bibliographic match for a title, if any
    pub async fn lookup_doi(&self, title: &str) -> Result<Option<String>, String> {
        let mut url = format!(
            "{}/works?query={}&rows=1",
            self.base_url,
            urlencoding::encode(title)
        );
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }

        let response = self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("Crossref request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Crossref API error {}: {}", status, body));
        }

        let parsed: CrossrefResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Crossref response: {}", e))?;

        Ok(parsed
            .message
            .items
            .into_iter()
            .next()
            .and_then(|w| w.doi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, MockResponse};

    fn client(url: &str) -> CrossrefClient {
        CrossrefClient::new(&HttpOptions::default(), None)
            .unwrap()
            .with_base_url(url)
    }

    #[tokio::test]
    async fn test_lookup_returns_first_doi() {
        let server = serve(vec![MockResponse::json(
            r#"{"status":"ok","message":{"items":[{"DOI":"10.1016/j.ins.2020.01.001"},{"DOI":"10.9/other"}]}}"#,
        )]);

        let doi = client(&server.url).lookup_doi("A review of metaheuristics").await.unwrap();

        assert_eq!(doi.as_deref(), Some("10.1016/j.ins.2020.01.001"));
        assert_eq!(server.paths(), vec!["/works?query=A%20review%20of%20metaheuristics&rows=1"]);
    }

    #[tokio::test]
    async fn test_lookup_no_items() {
        let server = serve(vec![MockResponse::json(r#"{"message":{"items":[]}}"#)]);
        assert_eq!(client(&server.url).lookup_doi("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_http_error() {
        let server = serve(vec![MockResponse::status(503, b"busy".to_vec())]);
        let err = client(&server.url).lookup_doi("x").await.unwrap_err();
        assert!(err.contains("503"));
    }

    #[tokio::test]
    async fn test_lookup_sends_mailto() {
        let server = serve(vec![MockResponse::json(r#"{"message":{"items":[]}}"#)]);
        let client = CrossrefClient::new(&HttpOptions::default(), Some("me@example.org".into()))
            .unwrap()
            .with_base_url(&server.url);
        client.lookup_doi("t").await.unwrap();
        assert_eq!(server.paths(), vec!["/works?query=t&rows=1&mailto=me%40example.org"]);
    }
}
