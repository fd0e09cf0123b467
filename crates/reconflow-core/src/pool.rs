//! Bounded fan-out over independent units of work

use crate::error::{ReconcileError, Result};
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Default number of units processed concurrently
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Outcome of one unit
#[derive(Debug)]
pub struct UnitResult<R> {
    pub unit: String,
    pub result: Result<R>,
}

/// Runs per-unit futures with at most `size` in flight
///
/// Every call may be bounded by a timeout; an elapsed timeout fails only that
/// unit with [`ReconcileError::Timeout`].
#[derive(Debug, Clone)]
pub struct WorkerPool {
    size: usize,
    call_timeout: Option<Duration>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            call_timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Apply `f` to every unit; results come back in input order
    pub async fn run<T, R, F, Fut>(&self, units: Vec<(String, T)>, f: F) -> Vec<UnitResult<R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let call_timeout = self.call_timeout;
        let f = &f;

        stream::iter(units)
            .map(|(unit, item)| async move {
                let result = match call_timeout {
                    Some(after) => match tokio::time::timeout(after, f(item)).await {
                        Ok(result) => result,
                        Err(_) => Err(ReconcileError::Timeout {
                            unit: unit.clone(),
                            after,
                        }),
                    },
                    None => f(item).await,
                };
                UnitResult { unit, result }
            })
            .buffered(self.size)
            .collect()
            .await
    }
}
