use async_trait::async_trait;

use crate::models::{MediaItem, MediaItemId};
use crate::resilience::ApiError;

/// Remote source of item metadata. Errors are classified so callers can
/// decide what to retry.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn get_item(&self, item_id: &MediaItemId) -> Result<MediaItem, ApiError>;
}
