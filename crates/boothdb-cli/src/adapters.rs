//! HTTP implementations of the page-fetching and agent-extraction ports.

use std::time::Duration;

use async_trait::async_trait;
use boothdb_core::{
    AgentError, AgentExtraction, AgentExtractor, AppConfig, FetchError, PageContent, PageFetcher,
    SourceConfig,
};
use serde::Serialize;

fn build_client(user_agent: &str, timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}

/// Fetches raw HTML with a plain GET.
pub(crate) struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub(crate) fn new(user_agent: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
        })
    }

    pub(crate) fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(&config.fetch_user_agent, config.fetch_timeout_secs)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent, FetchError> {
        let http_err = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await.map_err(http_err)?;
        if html.trim().is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        Ok(PageContent {
            url: url.to_string(),
            html,
            markdown: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct AgentSource<'a> {
    slug: &'a str,
    name: &'a str,
    source_type: &'a str,
}

#[derive(Debug, Serialize)]
struct AgentRequest<'a> {
    url: &'a str,
    content: &'a str,
    source: AgentSource<'a>,
}

/// Posts page content to the configured extraction service.
///
/// Without an endpoint every call returns [`AgentError::Unavailable`], which
/// the extraction engine reports without aborting the run.
pub(crate) struct HttpAgent {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpAgent {
    pub(crate) fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        user_agent: &str,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            endpoint,
            api_key,
        })
    }

    pub(crate) fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            config.agent_url.clone(),
            config.agent_api_key.clone(),
            &config.fetch_user_agent,
            config.agent_timeout_secs,
        )
    }
}

#[async_trait]
impl AgentExtractor for HttpAgent {
    async fn extract(
        &self,
        page: &PageContent,
        source: &SourceConfig,
    ) -> Result<AgentExtraction, AgentError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(AgentError::Unavailable);
        };

        let body = AgentRequest {
            url: &page.url,
            content: page.markdown.as_deref().unwrap_or(&page.html),
            source: AgentSource {
                slug: &source.slug,
                name: &source.name,
                source_type: source.source_type.as_str(),
            },
        };

        let mut request = self.client.post(endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let request_err = |reason: String| AgentError::Request {
            url: page.url.clone(),
            reason,
        };
        let response = request
            .send()
            .await
            .map_err(|e| request_err(e.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(request_err(format!("agent returned HTTP {status}")));
        }

        response
            .json::<AgentExtraction>()
            .await
            .map_err(|e| AgentError::Decode {
                url: page.url.clone(),
                reason: e.without_url().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boothdb_core::{ExtractionMode, PatternLearningStatus, SourceType};
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> SourceConfig {
        SourceConfig {
            id: Uuid::new_v4(),
            name: "Photobooth.net".to_string(),
            slug: "photobooth-net".to_string(),
            url: "https://photobooth.net/locations/".to_string(),
            source_type: SourceType::Directory,
            extraction_mode: ExtractionMode::Hybrid,
            pattern_learning_status: PatternLearningStatus::NotStarted,
            pattern_learned_at: None,
            enabled: true,
        }
    }

    fn page(url: &str) -> PageContent {
        PageContent {
            url: url.to_string(),
            html: "<h3>Photoworks</h3>".to_string(),
            markdown: None,
        }
    }

    #[tokio::test]
    async fn fetcher_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/locations"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul><li>booth</li></ul>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("test-agent", 5).unwrap();
        let url = format!("{}/locations", server.uri());
        let page = fetcher.fetch(&url).await.unwrap();

        assert_eq!(page.url, url);
        assert!(page.html.contains("booth"));
    }

    #[tokio::test]
    async fn fetcher_maps_status_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blank"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("test-agent", 5).unwrap();

        let err = fetcher
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedStatus { status: 404, .. }));

        let err = fetcher
            .fetch(&format!("{}/blank", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody { .. }));
    }

    #[tokio::test]
    async fn agent_without_endpoint_is_unavailable() {
        let agent = HttpAgent::new(None, None, "test-agent", 5).unwrap();
        let err = agent
            .extract(&page("https://photobooth.net/"), &source())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Unavailable));
    }

    #[tokio::test]
    async fn agent_posts_page_and_decodes_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/extract"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "source": { "slug": "photobooth-net", "source_type": "directory" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [{ "name": "Photoworks", "address": "2 Bedford Ave" }],
                "diagnostics": { "model": "extractor-v2", "duration_ms": 812 }
            })))
            .mount(&server)
            .await;

        let agent = HttpAgent::new(
            Some(format!("{}/extract", server.uri())),
            Some("secret".to_string()),
            "test-agent",
            5,
        )
        .unwrap();
        let extraction = agent
            .extract(&page("https://photobooth.net/"), &source())
            .await
            .unwrap();

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].name, "Photoworks");
        assert_eq!(extraction.diagnostics.duration_ms, Some(812));
    }

    #[tokio::test]
    async fn agent_error_status_and_bad_body_are_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let down = HttpAgent::new(Some(format!("{}/down", server.uri())), None, "ua", 5).unwrap();
        let err = down
            .extract(&page("https://photobooth.net/"), &source())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Request { ref reason, .. } if reason.contains("502")));

        let garbled =
            HttpAgent::new(Some(format!("{}/garbled", server.uri())), None, "ua", 5).unwrap();
        let err = garbled
            .extract(&page("https://photobooth.net/"), &source())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Decode { .. }));
    }
}
