//! Tokio async runtime implementation

use super::{AsyncSpawner, JoinHandle};
use std::future::Future;

/// Spawns fetch tasks on the ambient Tokio runtime
#[derive(Clone, Debug, Default, Copy)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        JoinHandle::new(tokio::spawn(task))
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tokio_spawner_runs_detached_task() {
        let spawner = TokioSpawner::new();
        assert_eq!(spawner.runtime_name(), "Tokio");

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        drop(spawner.spawn(async move {
            ran_clone.store(true, Ordering::SeqCst);
        }));

        for _ in 0..100 {
            if ran.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ran.load(Ordering::SeqCst));
    }
}
