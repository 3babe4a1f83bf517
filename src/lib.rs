//! archetype_bundle - Dependency-aware, reference-counted bundle loading
//!
//! # Features
//! - Variant resolution against a prioritized tag list
//! - Deduplicated fetches with reference-counted residency
//! - Dependency records so unloading releases exactly what loading acquired
//! - Polled manifest, asset and scene operations driven by one `tick()` per frame
//! - Transport abstraction (mock, file, any async runtime via spawner)
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_bundle::{BundleManager, MockFetcher, MockSceneLoader};
//!
//! let mut manager = BundleManager::new(MockFetcher::new(), MockSceneLoader::new());
//! let manifest = manager.initialize_manifest()?;
//! while !manifest.is_done() {
//!     manager.tick();
//! }
//! let hero = manager.load_asset::<String>("heroes", "knight")?;
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Enable the Tokio spawner for async transports

/// Log at info level unless the log mode restricts output to errors
macro_rules! bundle_info {
    ($mode:expr, $($arg:tt)+) => {
        if $mode == $crate::config::LogMode::All {
            log::info!($($arg)+)
        }
    };
}

// Core modules
pub mod fetch;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod operation;
pub mod registry;
pub mod scene;
pub mod variant;

// Support modules
pub mod config;
pub mod metrics;
pub mod runtime;

mod error;
pub use error::{BundleError, Result};

pub use config::{platform_name, BundleConfig, DependencyFailurePolicy, LogMode, MANIFEST_ITEM_NAME};
pub use fetch::mock::{MockBundle, MockFetcher};
#[cfg(feature = "runtime-tokio")]
pub use fetch::spawned::TokioFileFetch;
pub use fetch::spawned::{decode_with, AsyncFetch, BundleDecoder, FileFetch, SpawnedFetcher};
pub use fetch::{
    BundleContent, BundleFetcher, FetchHandle, FetchRequest, FetchStatus, ItemRequest, ItemType, LoadedItem, ReadyItem,
};
pub use loader::{BundleLoader, BundleRequest};
pub use manager::BundleManager;
pub use manifest::{BundleHash, Manifest, ManifestBuilder, ManifestEntry};
pub use metrics::{BundleMetrics, BundleMetricsHandle};
pub use operation::{AssetLoadOperation, ManifestLoadOperation, OperationState, SceneLoadOperation};
pub use registry::{BundleStatus, FetchOutcome, FetchRegistry, LoadedBundle};
pub use scene::{LoadSceneMode, MockSceneLoader, SceneLoader, SceneRequest};
pub use variant::{VariantChoice, VariantResolver};

pub use runtime::mock::MockSpawner;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioSpawner;
pub use runtime::{AsyncSpawner, JoinHandle};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_log_mode_gate() {
        let mut logged = false;
        let mode = LogMode::JustErrors;
        bundle_info!(mode, "{}", {
            logged = true;
            "hidden"
        });
        assert!(!logged);
    }
}
