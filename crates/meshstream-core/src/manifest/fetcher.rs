//! HTTP manifest fetcher

use super::{manifest_url, ManifestFetcher};
use crate::{Error, Result, StreamConfig};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

/// Fetches manifests over HTTP(S). Never retries.
pub struct HttpManifestFetcher {
    client: Client,
}

impl HttpManifestFetcher {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, base_url: &str, manifest_name: &str) -> Result<String> {
        let url = manifest_url(base_url, manifest_name)?;
        debug!(url = %url, "Fetching manifest");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::network(&url, e))?;

        let content = response
            .text()
            .await
            .map_err(|e| Error::network(&url, e))?;

        debug!(url = %url, bytes = content.len(), "Manifest fetched");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpManifestFetcher {
        HttpManifestFetcher::new(&StreamConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vv/stream.mpd"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<MPD/>"))
            .mount(&server)
            .await;

        let base = format!("{}/vv", server.uri());
        let content = fetcher().fetch(&base, "stream.mpd").await.unwrap();
        assert_eq!(content, "<MPD/>");
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri(), "missing.mpd").await.unwrap_err();
        match err {
            Error::Network { url, detail } => {
                assert!(url.ends_with("/missing.mpd"));
                assert!(detail.contains("404"));
            }
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_location_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri(), "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
