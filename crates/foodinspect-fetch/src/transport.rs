use std::sync::Arc;

use async_trait::async_trait;
use foodinspect_core::InspectionId;

use crate::FetchError;

/// One retrieval attempt for one identifier.
///
/// Implementations return the response body as-is; an empty body is a valid
/// answer that the fetcher classifies as dead.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, id: InspectionId) -> Result<Vec<u8>, FetchError>;
}

/// Share one transport between fetchers, or hand out a trait object.
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, id: InspectionId) -> Result<Vec<u8>, FetchError> {
        (**self).get(id).await
    }
}
