use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::{AppError, AppResult};

/// Runs a batch of futures with a bound on how many are in flight
///
/// Each future holds a semaphore permit for its whole lifetime, so at most
/// `limit` of them make progress at once. Results come back in input order and
/// the first error ends the batch, dropping whatever is still pending.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> AppResult<Self> {
        if limit == 0 {
            return Err(AppError::configuration(
                "concurrency limit must be at least 1",
            ));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn run_all<I, F, T>(&self, tasks: I) -> AppResult<Vec<T>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = AppResult<T>>,
    {
        let guarded = tasks.into_iter().map(|task| {
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::internal(format!("limiter closed: {e}")))?;
                task.await
            }
        });
        try_join_all(guarded).await
    }
}
