//! Long-running task hosting.
//!
//! The agent does not spawn its background work directly. It hands named
//! tasks to a [`TaskHost`], which decides where and how they run. A desktop
//! build would use [`TokioTaskHost`]; a platform with its own background
//! service facility can provide another implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Task name of the location watcher.
pub const LOCATION_WATCHER_TASK: &str = "location-watcher";

/// Task name of the reporting loop.
pub const REPORTING_LOOP_TASK: &str = "reporting-loop";

/// A task handed to a host.
pub type HostedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Task registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A live task is already registered under this name.
    #[error("Task '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No async runtime is available to run the task.
    #[error("No async runtime available to host tasks")]
    NoRuntime,
}

/// Facility that keeps named tasks running.
pub trait TaskHost: Send + Sync {
    /// Start `task` under `name`.
    fn register(&self, name: &str, task: HostedTask) -> Result<(), HostError>;

    /// Stop and forget the task registered under `name`, if any.
    fn unregister(&self, name: &str);

    /// Whether a live task is registered under `name`.
    fn is_registered(&self, name: &str) -> bool;
}

/// Runs hosted tasks on the current Tokio runtime.
///
/// Tasks are expected to stop on their own through cancellation; `unregister`
/// aborts whatever is still running.
#[derive(Default)]
pub struct TokioTaskHost {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioTaskHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        // A poisoned map is still consistent: entries are inserted or
        // removed whole.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TaskHost for TokioTaskHost {
    fn register(&self, name: &str, task: HostedTask) -> Result<(), HostError> {
        let handle = Handle::try_current().map_err(|_| HostError::NoRuntime)?;
        let mut tasks = self.tasks();

        if let Some(existing) = tasks.get(name) {
            if !existing.is_finished() {
                return Err(HostError::AlreadyRegistered(name.to_string()));
            }
        }

        tasks.insert(name.to_string(), handle.spawn(task));
        debug!(task = name, "Hosted task registered");
        Ok(())
    }

    fn unregister(&self, name: &str) {
        if let Some(handle) = self.tasks().remove(name) {
            if !handle.is_finished() {
                handle.abort();
            }
            debug!(task = name, "Hosted task unregistered");
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        self.tasks()
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TokioTaskHost {
    fn drop(&mut self) {
        for (_, handle) in self.tasks().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pending_task() -> HostedTask {
        Box::pin(std::future::pending::<()>())
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let host = TokioTaskHost::new();
        host.register("a", pending_task()).unwrap();
        assert!(host.is_registered("a"));

        host.unregister("a");
        assert!(!host.is_registered("a"));

        // Unknown names are ignored.
        host.unregister("missing");
    }

    #[tokio::test]
    async fn test_duplicate_live_task_rejected() {
        let host = TokioTaskHost::new();
        host.register("a", pending_task()).unwrap();
        assert_eq!(
            host.register("a", pending_task()),
            Err(HostError::AlreadyRegistered("a".to_string()))
        );
    }

    #[tokio::test]
    async fn test_finished_task_can_be_replaced() {
        let host = TokioTaskHost::new();
        host.register("a", Box::pin(async {})).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!host.is_registered("a"));
        host.register("a", pending_task()).unwrap();
        assert!(host.is_registered("a"));
    }

    #[test]
    fn test_register_outside_runtime_fails() {
        let host = TokioTaskHost::new();
        assert_eq!(host.register("a", pending_task()), Err(HostError::NoRuntime));
    }
}
