//! Database view models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! should live in higher layers.

/// One ordered attachment reference on a page. `storage_path` is `None` when
/// the referenced attachment row no longer exists; the orchestrator drops
/// such entries instead of failing the publish.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub attachment_id: i64,
    pub storage_path: Option<String>,
}

/// Page slice used by the orchestrator when publishing.
#[derive(Debug, Clone)]
pub struct PageForPublish {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub space_key: String,
    pub parent_page_id: Option<String>,
    pub attachments: Vec<AttachmentRef>,
}
