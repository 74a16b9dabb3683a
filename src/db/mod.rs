//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: view models returned by repositories to the publish pipeline.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `confluence_publisher::db` — we
//! re-export the repository API and the view models for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{AttachmentRef, PageForPublish};
