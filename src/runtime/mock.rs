//! Mock async spawner for testing
//!
//! Either runs a task to completion inside `spawn` or drops it, so a
//! spawned fetch is deterministically finished (or never finishes) before
//! the next tick polls it.

use super::{AsyncSpawner, JoinHandle};
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockSpawnBehavior {
    /// Drop tasks without running them
    Drop,
    /// Run tasks to completion on the calling thread
    BlockSync,
}

#[derive(Clone, Debug)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// Create a mock spawner that drops tasks
    pub fn new() -> Self {
        Self {
            behavior: MockSpawnBehavior::Drop,
        }
    }

    /// Create a mock spawner that runs tasks synchronously
    pub fn blocking() -> Self {
        Self {
            behavior: MockSpawnBehavior::BlockSync,
        }
    }
}

impl AsyncSpawner for MockSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.behavior {
            MockSpawnBehavior::Drop => drop(task),
            MockSpawnBehavior::BlockSync => futures::executor::block_on(task),
        }
        JoinHandle::new(())
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_mock_spawner_drop() {
        let spawner = MockSpawner::new();
        spawner.spawn(async {
            panic!("Should not run");
        });
        assert_eq!(spawner.runtime_name(), "Mock");
    }

    #[test]
    fn test_mock_spawner_blocking() {
        let spawner = MockSpawner::blocking();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        spawner.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(ran.load(Ordering::SeqCst));
    }
}
