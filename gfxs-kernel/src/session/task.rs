//! Deferred work returned by `Session::update`.
//!
//! A task is a set of futures, each resolving to the message that reports
//! its completion. The session loop spawns them and feeds the messages back
//! into `update`, so every remote call is a suspension point and nothing
//! else.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use gfxs_api::{BackendError, BackendResult};

use super::Message;

#[must_use = "tasks do nothing unless spawned or awaited"]
pub struct Task {
    futures: Vec<BoxFuture<'static, Message>>,
}

impl Task {
    pub fn none() -> Self {
        Self {
            futures: Vec::new(),
        }
    }

    pub fn batch(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            futures: tasks.into_iter().flat_map(|t| t.futures).collect(),
        }
    }

    /// Run a remote call and map its result to a message.
    ///
    /// The call is bounded by `timeout`, and a panic inside it is reported as
    /// a transport failure, so `map` always runs and the completion message
    /// always arrives.
    pub fn perform<T, F, M>(timeout: Duration, call: F, map: M) -> Self
    where
        T: Send + 'static,
        F: Future<Output = BackendResult<T>> + Send + 'static,
        M: FnOnce(BackendResult<T>) -> Message + Send + 'static,
    {
        let future = async move {
            let result = match AssertUnwindSafe(tokio::time::timeout(timeout, call))
                .catch_unwind()
                .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(_elapsed)) => Err(BackendError::Timeout(timeout)),
                Err(_panic) => Err(BackendError::Transport("request task panicked".into())),
            };
            map(result)
        };
        Self {
            futures: vec![future.boxed()],
        }
    }

    pub fn len(&self) -> usize {
        self.futures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }

    pub fn into_futures(self) -> Vec<BoxFuture<'static, Message>> {
        self.futures
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("futures", &self.futures.len()).finish()
    }
}
