//! Public entry point: load requests and the per-tick driver
//!
//! [`BundleManager`] owns the loader, the scene primitive and every
//! in-flight operation. The host calls [`BundleManager::tick`] once per
//! frame; nothing else ever advances a fetch or an operation.
//!
//! # Example
//! ```
//! use archetype_bundle::{BundleManager, MockBundle, MockFetcher, MockSceneLoader, Manifest, MANIFEST_ITEM_NAME};
//!
//! let manifest = Manifest::builder().bundle("heroes", MockBundle::new().hash()).build();
//! let fetcher = MockFetcher::new()
//!     .with_bundle("Linux", MockBundle::new().with_item(MANIFEST_ITEM_NAME, manifest))
//!     .with_bundle("heroes", MockBundle::new().with_item("knight", String::from("knight prefab")));
//!
//! let mut manager = BundleManager::new(fetcher, MockSceneLoader::new());
//! manager.config_mut().manifest_bundle = "Linux".to_string();
//!
//! let manifest_op = manager.initialize_manifest().unwrap();
//! while !manifest_op.is_done() {
//!     manager.tick();
//! }
//!
//! let knight = manager.load_asset::<String>("heroes", "knight").unwrap();
//! while !knight.is_done() {
//!     manager.tick();
//! }
//! assert_eq!(knight.asset().as_deref().map(String::as_str), Some("knight prefab"));
//! ```

use std::any::Any;

use crate::config::{BundleConfig, DependencyFailurePolicy, LogMode};
use crate::error::Result;
use crate::fetch::mock::MockFetcher;
use crate::fetch::BundleFetcher;
use crate::loader::{BundleLoader, BundleRequest};
use crate::manifest::Manifest;
use crate::metrics::BundleMetricsHandle;
use crate::operation::{ActiveOperation, AssetLoadOperation, ManifestLoadOperation, SceneLoadOperation};
use crate::registry::{BundleStatus, FetchRegistry};
use crate::scene::{LoadSceneMode, MockSceneLoader, SceneLoader};
use std::sync::Arc;

/// Bundle manager generic over the transport and the scene primitive
///
/// Defaults to the mock implementations for testing.
pub struct BundleManager<F: BundleFetcher = MockFetcher, S: SceneLoader = MockSceneLoader> {
    loader: BundleLoader<F>,
    scenes: S,
    operations: Vec<ActiveOperation>,
    manifest_operation: Option<ManifestLoadOperation>,
}

impl<F: BundleFetcher, S: SceneLoader> BundleManager<F, S> {
    /// Create a manager with the default configuration
    pub fn new(fetcher: F, scenes: S) -> Self {
        Self::with_config(fetcher, scenes, BundleConfig::default())
    }

    pub fn with_config(fetcher: F, scenes: S, config: BundleConfig) -> Self {
        log::debug!("BundleManager using {} transport", fetcher.transport_name());
        Self {
            loader: BundleLoader::new(fetcher, config),
            scenes,
            operations: Vec::new(),
            manifest_operation: None,
        }
    }

    /// Start loading the manifest bundle
    ///
    /// Returns the in-flight operation when one already exists, or a
    /// completed one once the manifest is published.
    pub fn initialize_manifest(&mut self) -> Result<ManifestLoadOperation> {
        if let Some(operation) = &self.manifest_operation {
            if !operation.is_failed() {
                return Ok(operation.clone());
            }
        }

        let bundle = self.loader.config().manifest_bundle.clone();
        if let Some(manifest) = self.loader.manifest() {
            let operation = ManifestLoadOperation::completed(&bundle, Arc::clone(manifest));
            self.manifest_operation = Some(operation.clone());
            return Ok(operation);
        }

        let request = self.loader.load_bundle(&bundle, true)?;
        let item = self.loader.config().manifest_item.clone();
        let (active, operation) = ActiveOperation::manifest(&request.name, &item);
        self.operations.push(active);
        self.manifest_operation = Some(operation.clone());
        Ok(operation)
    }

    /// Load `bundle` with its dependencies and decode `asset` as `T`
    ///
    /// Fails when the manifest is not initialized.
    pub fn load_asset<T: Any + Send + Sync>(&mut self, bundle: &str, asset: &str) -> Result<AssetLoadOperation<T>> {
        let request = self.loader.load_bundle(bundle, false)?;
        let (active, operation) = ActiveOperation::asset::<T>(&request.name, asset);
        self.operations.push(active);
        Ok(operation)
    }

    /// Load `bundle` with its dependencies and then the scene it carries
    pub fn load_scene(&mut self, bundle: &str, scene: &str, additive: bool) -> Result<SceneLoadOperation> {
        let request = self.loader.load_bundle(bundle, false)?;
        let (active, operation) =
            ActiveOperation::scene(&request.name, scene, LoadSceneMode::from_additive(additive));
        self.operations.push(active);
        Ok(operation)
    }

    /// Start fetching a bundle and its dependencies without an operation
    ///
    /// The bundle is held like any other load; release it with
    /// [`unload`](Self::unload) using the returned resolved name.
    pub fn preload_bundle(&mut self, bundle: &str) -> Result<BundleRequest> {
        self.loader.load_bundle(bundle, false)
    }

    /// Release a bundle by its resolved name, along with its recorded dependencies
    pub fn unload(&mut self, bundle: &str) {
        self.loader.unload_bundle(bundle);
    }

    /// Clear a recorded fetch error and fetch the bundle again
    ///
    /// Retrying the manifest bundle also restarts the manifest operation.
    /// Returns `false` when `bundle` had no error.
    pub fn retry(&mut self, bundle: &str) -> Result<bool> {
        if !self.loader.retry(bundle)? {
            return Ok(false);
        }

        let restart_manifest = bundle == self.loader.config().manifest_bundle
            && self.loader.manifest().is_none()
            && self
                .manifest_operation
                .as_ref()
                .map_or(true, ManifestLoadOperation::is_failed);
        if restart_manifest {
            let item = self.loader.config().manifest_item.clone();
            let (active, operation) = ActiveOperation::manifest(bundle, &item);
            self.operations.push(active);
            self.manifest_operation = Some(operation);
        }
        Ok(true)
    }

    /// Advance every pending fetch, then every in-flight operation, once
    pub fn tick(&mut self) {
        let Self {
            loader,
            scenes,
            operations,
            ..
        } = self;

        for completion in loader.advance() {
            if let Some(error) = completion.error {
                log::debug!("Fetch of {} finished with error: {error}", completion.name);
            }
        }

        operations.retain_mut(|operation| {
            let running = operation.update(loader, scenes);
            if !running {
                operation.notify();
            }
            running
        });
    }

    /// Availability of a resolved bundle and its recorded dependencies
    pub fn status(&self, bundle: &str) -> BundleStatus {
        self.loader.status(bundle)
    }

    /// Transport progress of a bundle; 1.0 once resident
    pub fn fetch_progress(&self, bundle: &str) -> Option<f32> {
        self.loader.registry().progress(bundle)
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.loader.config_mut().base_url = base_url.into();
    }

    /// Variant tags in priority order, most preferred first
    pub fn set_active_variants<I, V>(&mut self, variants: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.loader.config_mut().active_variants = variants.into_iter().map(Into::into).collect();
    }

    pub fn set_log_mode(&mut self, log_mode: LogMode) {
        self.loader.config_mut().log_mode = log_mode;
    }

    pub fn set_dependency_failure_policy(&mut self, policy: DependencyFailurePolicy) {
        self.loader.config_mut().dependency_failure_policy = policy;
    }

    pub fn set_source_directory(&mut self, relative_path: &str) -> Result<()> {
        self.loader.config_mut().set_source_directory(relative_path)
    }

    pub fn set_source_url(&mut self, absolute_path: &str) -> Result<()> {
        self.loader.config_mut().set_source_url(absolute_path)
    }

    pub fn set_development_server<P: AsRef<std::path::Path>>(&mut self, url_file: P) -> Result<()> {
        self.loader.config_mut().set_development_server(url_file)
    }

    pub fn config(&self) -> &BundleConfig {
        self.loader.config()
    }

    pub fn config_mut(&mut self) -> &mut BundleConfig {
        self.loader.config_mut()
    }

    pub fn loader(&self) -> &BundleLoader<F> {
        &self.loader
    }

    pub fn registry(&self) -> &FetchRegistry {
        self.loader.registry()
    }

    /// The published manifest, once initialized
    pub fn manifest(&self) -> Option<&Arc<Manifest>> {
        self.loader.manifest()
    }

    pub fn metrics(&self) -> &BundleMetricsHandle {
        self.loader.metrics()
    }

    pub fn fetcher(&self) -> &F {
        self.loader.fetcher()
    }

    pub fn scenes(&self) -> &S {
        &self.scenes
    }

    /// Number of operations not yet terminal
    pub fn active_operations(&self) -> usize {
        self.operations.len()
    }
}
