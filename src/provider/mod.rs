use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::{multipart, Client, RequestBuilder, Url};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::attachment::content_type_for;
use crate::config::Config;
use crate::provider::model::{
    AncestorRef, PageBody, PageRequest, PageResponse, SearchResponse, SpaceRef, StorageBody,
    VersionRef,
};

pub mod model;
pub mod stub;

pub use stub::StubProvider;

/// Result of one successful publish call against a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub page_id: String,
    pub message: String,
}

/// Abstraction over the remote platform's page/attachment API.
///
/// `publish_page` must be idempotent at the remote level: publishing the same
/// title into the same space twice updates the existing page instead of
/// creating a duplicate.
#[async_trait]
pub trait PublishProvider: Send + Sync {
    /// Short token recorded in publish logs.
    fn name(&self) -> &'static str;

    async fn publish_page(
        &self,
        space_key: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
        attachment_paths: &[String],
    ) -> Result<ProviderResult>;

    /// Backend-defined status token for a published page. Lookup failures
    /// come back as the sentinel `"error"`, never as an `Err`.
    async fn get_status(&self, page_id: &str) -> String;
}

/// Resolve the configured provider token to a backend instance.
///
/// Recognized (case-insensitive): `confluence-server`/`server` for the live
/// client, `confluence-stub`/`stub` for the stub. Anything else, including an
/// empty token or a live client that cannot be constructed, yields the stub.
pub fn select_provider(cfg: &Config) -> Arc<dyn PublishProvider> {
    match cfg.confluence.provider.to_ascii_lowercase().as_str() {
        "confluence-server" | "server" => match ConfluenceClient::from_config(cfg) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                warn!(?err, "cannot construct Confluence client, using stub");
                Arc::new(StubProvider)
            }
        },
        "confluence-stub" | "stub" => Arc::new(StubProvider),
        other => {
            if !other.is_empty() {
                warn!(provider = other, "unknown provider token, using stub");
            }
            Arc::new(StubProvider)
        }
    }
}

/// Live Confluence Server/Cloud client over the content REST API.
pub struct ConfluenceClient {
    http: OnceCell<Client>,
    base_url: Url,
    base_display: String,
    username: String,
    api_token: String,
}

impl fmt::Debug for ConfluenceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceClient")
            .field("base_url", &self.base_display)
            .finish_non_exhaustive()
    }
}

/// Cloud API tokens are long; anything over 30 characters is sent as a
/// bearer token, shorter secrets as Basic credentials.
fn uses_bearer_auth(api_token: &str) -> bool {
    api_token.len() > 30
}

/// Search result order is not contractual; when several pages share the
/// title, take the lowest remote id (numeric ids first, then lexicographic).
fn pick_existing_page(results: Vec<PageResponse>) -> Option<PageResponse> {
    results
        .into_iter()
        .min_by_key(|p| (p.id.parse::<u64>().unwrap_or(u64::MAX), p.id.clone()))
}

fn build_page_request(
    space_key: &str,
    title: &str,
    content: &str,
    parent_page_id: Option<&str>,
    version: Option<i64>,
) -> PageRequest {
    PageRequest {
        content_type: "page".into(),
        title: title.into(),
        space: SpaceRef {
            key: space_key.into(),
        },
        body: PageBody {
            storage: StorageBody {
                value: content.into(),
                representation: "storage".into(),
            },
        },
        ancestors: parent_page_id
            .filter(|id| !id.is_empty())
            .map(|id| vec![AncestorRef { id: id.into() }]),
        version: version.map(|number| VersionRef { number }),
    }
}

impl ConfluenceClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_display = cfg.confluence.base_url.trim_end_matches('/').to_string();
        // Trailing slash so Url::join keeps the full path.
        let base_url =
            Url::parse(&format!("{base_display}/")).context("invalid Confluence base URL")?;
        Ok(Self {
            http: OnceCell::new(),
            base_url,
            base_display,
            username: cfg.confluence.username.clone(),
            api_token: cfg.confluence.api_token.clone(),
        })
    }

    /// The HTTP client is built on first use and reused for the process
    /// lifetime; `OnceCell` guarantees at most one construction even under
    /// concurrent first use.
    fn http(&self) -> Result<&Client> {
        self.http.get_or_try_init(|| {
            info!(base_url = %self.base_display, "initializing Confluence REST client");
            Client::builder()
                .user_agent("confluence-publisher/0.1")
                .build()
                .context("failed to build HTTP client")
        })
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        if uses_bearer_auth(&self.api_token) {
            rb.bearer_auth(&self.api_token)
        } else {
            rb.basic_auth(&self.username, Some(&self.api_token))
        }
    }

    async fn send_page_request(&self, rb: RequestBuilder) -> Result<PageResponse> {
        let res = rb.send().await.context("failed to reach Confluence")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("confluence error {}: {}", status, body));
        }
        res.json::<PageResponse>()
            .await
            .context("invalid Confluence response JSON")
    }

    /// Exact-title search scoped to a space. Any failure here is treated as
    /// "no existing page" so the publish proceeds with a create.
    async fn find_page_by_title(&self, space_key: &str, title: &str) -> Option<PageResponse> {
        let attempt = async {
            let endpoint = self.base_url.join("rest/api/content")?;
            let res = self
                .authorize(self.http()?.get(endpoint).query(&[
                    ("spaceKey", space_key),
                    ("title", title),
                    ("expand", "version"),
                ]))
                .send()
                .await
                .context("failed to reach Confluence")?;
            if !res.status().is_success() {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                return Err(anyhow!("confluence search error {}: {}", status, body));
            }
            let search: SearchResponse = res
                .json()
                .await
                .context("invalid Confluence search response")?;
            Ok::<_, anyhow::Error>(pick_existing_page(search.results))
        };
        match attempt.await {
            Ok(found) => found,
            Err(err) => {
                warn!(?err, title, space_key, "title search failed, assuming no match");
                None
            }
        }
    }

    async fn create_page(
        &self,
        space_key: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
    ) -> Result<PageResponse> {
        let endpoint = self.base_url.join("rest/api/content")?;
        let request = build_page_request(space_key, title, content, parent_page_id, None);
        self.send_page_request(self.authorize(self.http()?.post(endpoint).json(&request)))
            .await
    }

    async fn update_page(
        &self,
        page_id: &str,
        space_key: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
        next_version: i64,
    ) -> Result<PageResponse> {
        let endpoint = self
            .base_url
            .join(&format!("rest/api/content/{page_id}"))?;
        let request =
            build_page_request(space_key, title, content, parent_page_id, Some(next_version));
        self.send_page_request(self.authorize(self.http()?.put(endpoint).json(&request)))
            .await
    }

    async fn upload_attachment(&self, page_id: &str, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("invalid attachment file name"))?
            .to_string();
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("failed to read attachment: {}", path.display()))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(content_type_for(path))?;
        let form = multipart::Form::new().part("file", part);

        let endpoint = self
            .base_url
            .join(&format!("rest/api/content/{page_id}/child/attachment"))?;
        let res = self
            .authorize(self.http()?.post(endpoint))
            .header("X-Atlassian-Token", "nocheck")
            .multipart(form)
            .send()
            .await
            .context("failed to reach Confluence")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("attachment upload error {}: {}", status, body));
        }
        info!(page_id, file = %file_name, "uploaded attachment");
        Ok(())
    }

    async fn fetch_page(&self, page_id: &str) -> Result<PageResponse> {
        let endpoint = self
            .base_url
            .join(&format!("rest/api/content/{page_id}"))?;
        self.send_page_request(self.authorize(self.http()?.get(endpoint)))
            .await
    }

    fn web_url(&self, page: &PageResponse) -> Option<String> {
        page.links
            .as_ref()
            .and_then(|links| links.webui.as_deref())
            .map(|webui| format!("{}{}", self.base_display, webui))
    }
}

#[async_trait]
impl PublishProvider for ConfluenceClient {
    fn name(&self) -> &'static str {
        "confluence-server"
    }

    async fn publish_page(
        &self,
        space_key: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
        attachment_paths: &[String],
    ) -> Result<ProviderResult> {
        let page = match self.find_page_by_title(space_key, title).await {
            Some(existing) => {
                let current = existing.version.as_ref().map(|v| v.number).unwrap_or(1);
                info!(page_id = %existing.id, title, current, "updating existing page");
                self.update_page(
                    &existing.id,
                    space_key,
                    title,
                    content,
                    parent_page_id,
                    current + 1,
                )
                .await?
            }
            None => {
                info!(title, space_key, "creating new page");
                self.create_page(space_key, title, content, parent_page_id)
                    .await?
            }
        };

        // Page content wins over attachments: a failed upload is logged and
        // skipped, the remaining files are still attempted.
        for path in attachment_paths {
            if let Err(err) = self.upload_attachment(&page.id, Path::new(path)).await {
                warn!(?err, path = %path, "failed to upload attachment, skipping");
            }
        }

        let web_url = self
            .web_url(&page)
            .unwrap_or_else(|| "URL not available".to_string());
        Ok(ProviderResult {
            page_id: page.id,
            message: format!("Successfully published to Confluence: {web_url}"),
        })
    }

    async fn get_status(&self, page_id: &str) -> String {
        match self.fetch_page(page_id).await {
            Ok(page) => page.status.unwrap_or_else(|| "unknown".into()),
            Err(err) => {
                warn!(?err, page_id, "status lookup failed");
                "error".into()
            }
        }
    }
}
