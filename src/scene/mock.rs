//! Mock scene loader for testing

use super::{LoadSceneMode, SceneLoader, SceneRequest};
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::Poll;

/// Records every scene load and completes each after a fixed number of polls
#[derive(Clone, Debug, Default)]
pub struct MockSceneLoader {
    loaded: Arc<Mutex<Vec<(String, LoadSceneMode)>>>,
    latency: u32,
}

impl MockSceneLoader {
    /// Create a scene loader whose requests finish on their first poll
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    /// Scenes requested so far, in order
    pub fn loaded_scenes(&self) -> Vec<(String, LoadSceneMode)> {
        self.loaded.lock().clone()
    }
}

impl SceneLoader for MockSceneLoader {
    fn load_scene_async(&self, scene: &str, mode: LoadSceneMode) -> Box<dyn SceneRequest> {
        self.loaded.lock().push((scene.to_string(), mode));
        Box::new(MockSceneRequest {
            remaining: self.latency,
        })
    }
}

struct MockSceneRequest {
    remaining: u32,
}

impl SceneRequest for MockSceneRequest {
    fn poll(&mut self) -> Poll<()> {
        if self.remaining > 0 {
            self.remaining -= 1;
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}
