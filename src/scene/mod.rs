//! Scene materialization abstraction
//!
//! Scene bundles are not decoded item by item. Once the bundle and its
//! dependencies are resident the host engine is asked to load the scene by
//! name, and the request is polled until it finishes.

pub mod mock;

use std::task::Poll;

/// How a loaded scene combines with what is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadSceneMode {
    /// Replace all currently loaded scenes
    Single,
    /// Add to the currently loaded scenes
    Additive,
}

impl LoadSceneMode {
    pub fn from_additive(additive: bool) -> Self {
        if additive {
            Self::Additive
        } else {
            Self::Single
        }
    }
}

/// An in-flight scene load
pub trait SceneRequest: Send + Sync {
    fn poll(&mut self) -> Poll<()>;
}

/// Host engine primitive that begins loading a scene
pub trait SceneLoader: Send + Sync {
    fn load_scene_async(&self, scene: &str, mode: LoadSceneMode) -> Box<dyn SceneRequest>;
}

pub use mock::MockSceneLoader;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_additive() {
        assert_eq!(LoadSceneMode::from_additive(true), LoadSceneMode::Additive);
        assert_eq!(LoadSceneMode::from_additive(false), LoadSceneMode::Single);
    }
}
