//! Async runtime abstraction for background fetches
//!
//! The tick driver never awaits anything. Transports that are naturally
//! async run on an [`AsyncSpawner`] and publish their result into a slot the
//! driver polls (see [`crate::fetch::spawned`]).

pub mod mock;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::fmt::Debug;
use std::future::Future;

/// Handle to a spawned async task
///
/// Type-erased so each runtime can keep its own native handle. Dropping it
/// detaches the task.
#[derive(Debug)]
pub struct JoinHandle {
    _inner: Box<dyn std::any::Any + Send + Sync>,
}

impl JoinHandle {
    pub fn new<T: Send + Sync + 'static>(handle: T) -> Self {
        Self {
            _inner: Box::new(handle),
        }
    }
}

/// Async task spawner
///
/// # Example
/// ```ignore
/// let spawner = TokioSpawner::new();
/// spawner.spawn(async {
///     // fetch bytes here
/// });
/// ```
pub trait AsyncSpawner: Send + Sync + Clone + Debug + 'static {
    /// Spawn a detached task
    fn spawn<F>(&self, task: F) -> JoinHandle
    where
        F: Future<Output = ()> + Send + 'static;

    /// Name of this runtime (for debugging)
    fn runtime_name(&self) -> &'static str;
}

pub use mock::MockSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;
