//! Fan-out of async units of work with a single join point.

use super::{Error, Result};
use std::future::Future;
use tokio::task::JoinHandle;

/// Collects spawned units of work and joins them together.
///
/// Units start running as soon as they are registered. [`TaskManager::await_tasks`]
/// waits until every unit settled and reports the first failure in
/// registration order. Failed siblings are neither cancelled nor rolled back.
///
/// # Examples
///
/// ```
/// use kodegen_bundler_package::bundler::TaskManager;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> kodegen_bundler_package::bundler::Result<()> {
/// let mut tasks = TaskManager::new();
/// tasks.add_task(async { Ok(()) });
/// tasks.add(|| async { Ok(()) });
/// tasks.await_tasks().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl TaskManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running unit of work.
    pub fn add_task<F>(&mut self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Invokes `f` and registers the future it returns.
    pub fn add<F, Fut>(&mut self, f: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_task(f());
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every unit and returns the first failure in registration
    /// order as [`Error::TaskBatch`].
    pub async fn await_tasks(self) -> Result<()> {
        let total = self.tasks.len();
        let mut failed = 0;
        let mut first = None;

        for handle in self.tasks {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(Error::GenericError(format!("task panicked: {join_error}"))),
            };
            if let Err(error) = outcome {
                failed += 1;
                if first.is_none() {
                    first = Some(error);
                } else {
                    log::debug!("additional task failure: {error}");
                }
            }
        }

        match first {
            None => Ok(()),
            Some(first) => Err(Error::TaskBatch {
                failed,
                total,
                first: Box::new(first),
            }),
        }
    }
}
