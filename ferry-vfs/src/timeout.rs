use std::{future::Future, time::Duration};

use crate::error::{VfsError, VfsResult};

pub async fn bounded<T, F>(limit: Duration, future: F) -> VfsResult<T>
where
    F: Future<Output = VfsResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("backend operation exceeded {:?}", limit);
            Err(VfsError::Timeout)
        }
    }
}
