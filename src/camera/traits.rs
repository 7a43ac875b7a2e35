use async_trait::async_trait;
use bytes::Bytes;

use crate::core::errors::FetchError;

/// Where a worker gets its snapshots from. The production implementation is
/// [`HttpSource`](crate::camera::http_source::HttpSource); tests substitute
/// their own.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}
