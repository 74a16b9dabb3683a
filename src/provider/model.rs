//! Wire types for the Confluence content REST API.

use serde::{Deserialize, Serialize};

/// Body of a page create (POST) or update (PUT) call.
#[derive(Debug, Clone, Serialize)]
pub struct PageRequest {
    #[serde(rename = "type")]
    pub content_type: String,
    pub title: String,
    pub space: SpaceRef,
    pub body: PageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<Vec<AncestorRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpaceRef {
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageBody {
    pub storage: StorageBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageBody {
    pub value: String,
    pub representation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AncestorRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionRef {
    pub number: i64,
}

/// Page representation returned by content GET/POST/PUT calls.
#[derive(Debug, Clone, Deserialize)]
pub struct PageResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<VersionInfo>,
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub webui: Option<String>,
}

/// Result list returned by the exact-title content search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<PageResponse>,
}
