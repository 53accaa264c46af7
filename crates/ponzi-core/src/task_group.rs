//! Fail-fast group of concurrent tasks.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::StockError;

/// Runs tasks concurrently under a token derived from the caller's.
///
/// The first task error cancels the group's token, aborts the remaining
/// tasks and is returned from [`TaskGroup::wait`]. Successful outputs are
/// returned in spawn order regardless of completion order.
#[derive(Debug)]
pub struct TaskGroup<T> {
    tasks: JoinSet<(usize, Result<T, StockError>)>,
    cancel: CancellationToken,
    spawned: usize,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// Group whose token is cancelled when `parent` is.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            cancel: parent.child_token(),
            spawned: 0,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn len(&self) -> usize {
        self.spawned
    }

    pub fn is_empty(&self) -> bool {
        self.spawned == 0
    }

    /// Start `task` with a clone of the group token.
    pub fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, StockError>> + Send + 'static,
    {
        let slot = self.spawned;
        self.spawned += 1;
        let run = task(self.cancel.clone());
        self.tasks.spawn(async move { (slot, run.await) });
    }

    /// Wait for every task, or for the first failure.
    pub async fn wait(mut self) -> Result<Vec<T>, StockError> {
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None)
            .take(self.spawned)
            .collect();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((slot, Ok(value))) => {
                    if let Some(entry) = slots.get_mut(slot) {
                        *entry = Some(value);
                    }
                }
                Ok((_, Err(error))) => {
                    self.cancel.cancel();
                    self.tasks.abort_all();
                    return Err(error);
                }
                Err(join_error) if join_error.is_panic() => {
                    self.cancel.cancel();
                    self.tasks.abort_all();
                    std::panic::resume_unwind(join_error.into_panic());
                }
                Err(_) => {
                    self.cancel.cancel();
                    self.tasks.abort_all();
                    return Err(StockError::cancelled());
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
