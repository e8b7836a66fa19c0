//! Principal → visible-document resolution.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Principal;

/// Maps a principal to the ids of the documents it may see.
///
/// A document is visible when any of its permission rows
/// [`matches`](crate::models::Permission::matches) the principal. Ids are
/// distinct; order is unspecified.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    async fn permitted_document_ids(&self, principal: &Principal) -> Result<Vec<String>>;
}
