//! Offline provider used for local testing and as the universal fallback.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::{ProviderResult, PublishProvider};

/// Synthetic remote ids carry this prefix so they are distinguishable from
/// real Confluence ids in logs and tests.
pub const STUB_ID_PREFIX: &str = "CONF-";

/// Performs no network I/O and always reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubProvider;

fn fake_page_id() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{STUB_ID_PREFIX}{}", &token[..8])
}

#[async_trait]
impl PublishProvider for StubProvider {
    fn name(&self) -> &'static str {
        "confluence-stub"
    }

    async fn publish_page(
        &self,
        space_key: &str,
        title: &str,
        content: &str,
        parent_page_id: Option<&str>,
        attachment_paths: &[String],
    ) -> Result<ProviderResult> {
        let page_id = fake_page_id();
        info!(
            space_key,
            title,
            content_len = content.len(),
            parent = ?parent_page_id,
            attachments = attachment_paths.len(),
            %page_id,
            "stub provider publishing page"
        );
        for path in attachment_paths {
            info!(path = %path, "stub provider skipping attachment upload");
        }
        Ok(ProviderResult {
            page_id,
            message: "Successfully published to stub provider (no real API call made)".into(),
        })
    }

    async fn get_status(&self, page_id: &str) -> String {
        info!(page_id, "stub provider status lookup");
        "current".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_returns_synthetic_id() {
        let result = StubProvider
            .publish_page("DEV", "Title", "content", None, &[])
            .await
            .unwrap();
        assert!(result.page_id.starts_with(STUB_ID_PREFIX));
        assert_eq!(result.page_id.len(), STUB_ID_PREFIX.len() + 8);
        assert!(result.message.contains("stub provider"));
    }

    #[tokio::test]
    async fn ids_are_unique_per_call() {
        let a = StubProvider
            .publish_page("DEV", "T", "c", None, &[])
            .await
            .unwrap();
        let b = StubProvider
            .publish_page("DEV", "T", "c", None, &[])
            .await
            .unwrap();
        assert_ne!(a.page_id, b.page_id);
    }

    #[tokio::test]
    async fn status_is_always_current() {
        assert_eq!(StubProvider.get_status("CONF-deadbeef").await, "current");
    }
}
