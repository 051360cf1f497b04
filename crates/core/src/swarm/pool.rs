//! # Worker Pool
//!
//! Bounded fan-out for the parallel stage. Every job is spawned at once and
//! waits for one of `limit` semaphore permits, so at most `limit` jobs run
//! at any moment. Results come back in submission order after a full
//! fan-in; the first error aborts every job still running.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum PoolError<E> {
    #[error(transparent)]
    Job(E),

    #[error("worker task panicked: {0}")]
    Panicked(String),

    #[error("worker pool closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl WorkerPool {
    /// Pool running at most `limit` jobs at once (never fewer than one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every job and collect all results.
    ///
    /// Returns as soon as any job fails; the remaining jobs are aborted.
    pub async fn try_execute_all<T, E, Fut>(&self, jobs: Vec<Fut>) -> Result<Vec<T>, PoolError<E>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let total = jobs.len();
        let mut join_set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(PoolError::Closed));
                };
                (index, job.await.map_err(PoolError::Job))
            });
        }

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(value))) => slots[index] = Some(value),
                Ok((_, Err(e))) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    join_set.abort_all();
                    return Err(PoolError::Panicked(e.to_string()));
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
