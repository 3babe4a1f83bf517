//! Dependency-aware bundle loading and unloading
//!
//! [`BundleLoader`] resolves variants, starts fetches for a bundle and the
//! dependency closure the manifest lists for it, and records that closure so
//! unloading the bundle later releases exactly what loading it acquired.

use std::sync::Arc;

use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::fetch::BundleFetcher;
use crate::manifest::Manifest;
use crate::metrics::BundleMetricsHandle;
use crate::registry::{BundleStatus, FetchCompletion, FetchOutcome, FetchRegistry, FetchSource};
use crate::variant::VariantResolver;

/// A load request after variant resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    /// Resolved physical bundle name; pass this to `unload_bundle`
    pub name: String,
    pub outcome: FetchOutcome,
}

/// Loads bundles with their dependencies and releases them by reference count
pub struct BundleLoader<F: BundleFetcher> {
    fetcher: F,
    registry: FetchRegistry,
    manifest: Option<Arc<Manifest>>,
    config: BundleConfig,
    metrics: BundleMetricsHandle,
}

impl<F: BundleFetcher> BundleLoader<F> {
    /// Creates a loader with the given transport and configuration
    pub fn new(fetcher: F, config: BundleConfig) -> Self {
        Self {
            fetcher,
            registry: FetchRegistry::new(),
            manifest: None,
            config,
            metrics: BundleMetricsHandle::new(),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn registry(&self) -> &FetchRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BundleConfig {
        &mut self.config
    }

    pub fn metrics(&self) -> &BundleMetricsHandle {
        &self.metrics
    }

    pub fn manifest(&self) -> Option<&Arc<Manifest>> {
        self.manifest.as_ref()
    }

    /// Install the decoded manifest. Only the first call has an effect.
    pub fn publish_manifest(&mut self, manifest: Arc<Manifest>) -> bool {
        if self.manifest.is_some() {
            log::warn!("Manifest is already initialized, ignoring a second manifest");
            return false;
        }
        bundle_info!(
            self.config.log_mode,
            "Manifest initialized with {} bundles",
            manifest.len()
        );
        self.manifest = Some(manifest);
        true
    }

    /// Resolve a requested name to the physical bundle for the active variants
    pub fn resolve(&self, name: &str) -> Result<String> {
        let manifest = self.manifest.as_deref().ok_or(BundleError::ManifestNotInitialized)?;
        Ok(VariantResolver::new(manifest, &self.config.active_variants).resolve(name))
    }

    /// Load a bundle and, on its first load, the dependencies the manifest lists
    ///
    /// Content bundles are resolved to their active variant first; the
    /// manifest bundle is loaded by its literal name since variant
    /// resolution needs the manifest.
    pub fn load_bundle(&mut self, name: &str, is_manifest: bool) -> Result<BundleRequest> {
        bundle_info!(
            self.config.log_mode,
            "Loading bundle {}{name}",
            if is_manifest { "manifest: " } else { ": " }
        );

        let manifest = if is_manifest {
            None
        } else {
            match &self.manifest {
                Some(manifest) => Some(Arc::clone(manifest)),
                None => {
                    log::error!("Manifest not initialized; call initialize_manifest() before loading {name}");
                    return Err(BundleError::ManifestNotInitialized);
                }
            }
        };

        let resolved = match manifest.as_deref() {
            Some(manifest) => VariantResolver::new(manifest, &self.config.active_variants).resolve(name),
            None => name.to_string(),
        };

        let outcome = self.registry.begin_fetch(
            &resolved,
            is_manifest,
            FetchSource {
                fetcher: &self.fetcher,
                base_url: &self.config.base_url,
                manifest: manifest.as_deref(),
            },
            &self.metrics,
        )?;

        // A failed root is still held, so its dependencies are loaded as for a new fetch
        if let Some(manifest) = manifest.as_deref() {
            if matches!(outcome, FetchOutcome::Started | FetchOutcome::AlreadyFailed) {
                self.load_dependencies(&resolved, manifest)?;
            }
        }

        Ok(BundleRequest {
            name: resolved,
            outcome,
        })
    }

    fn load_dependencies(&mut self, root: &str, manifest: &Manifest) -> Result<()> {
        // A record survives a failed root fetch; the dependencies it lists are still held
        if self.registry.recorded_dependencies(root).is_some() {
            return Ok(());
        }

        let dependencies = manifest.dependencies(root);
        if dependencies.is_empty() {
            return Ok(());
        }

        let resolver = VariantResolver::new(manifest, &self.config.active_variants);
        let resolved: Vec<String> = dependencies
            .iter()
            .map(|dependency| resolver.resolve(dependency))
            .collect();

        self.registry.record_dependencies(root, resolved.clone());

        let source = FetchSource {
            fetcher: &self.fetcher,
            base_url: &self.config.base_url,
            manifest: Some(manifest),
        };
        for dependency in &resolved {
            self.registry
                .begin_fetch(dependency, false, source, &self.metrics)?;
        }

        Ok(())
    }

    /// Release one reference to `name` and one to each dependency recorded for it
    ///
    /// `name` must be the resolved name returned at load time. Unloading a
    /// name that is neither resident nor recorded does nothing.
    pub fn unload_bundle(&mut self, name: &str) {
        self.release(name);

        if let Some(dependencies) = self.registry.take_dependencies(name) {
            for dependency in &dependencies {
                self.release(dependency);
            }
        }
    }

    fn release(&mut self, name: &str) {
        let was_resident = self.registry.is_resident(name);
        if self.registry.release(name, &self.metrics) == Some(0) && was_resident {
            bundle_info!(self.config.log_mode, "{name} has been unloaded successfully");
        }
    }

    /// Advance every pending fetch once
    pub fn advance(&mut self) -> Vec<FetchCompletion> {
        self.registry.advance(&self.metrics)
    }

    /// Availability of a resolved bundle and its recorded dependencies
    pub fn status(&self, name: &str) -> BundleStatus {
        self.registry.status(name)
    }

    /// Clear the permanent fetch error for `name` and fetch it again
    ///
    /// `name` is the physical name that failed; it is refetched as is and
    /// keeps the references of every load that joined it. Dependencies are
    /// never loaded here since every load holding `name` already did.
    /// Returns `false` when no error was recorded.
    pub fn retry(&mut self, name: &str) -> Result<bool> {
        let is_manifest = name == self.config.manifest_bundle;
        let manifest = if is_manifest {
            None
        } else {
            match &self.manifest {
                Some(manifest) => Some(Arc::clone(manifest)),
                None => return Ok(false),
            }
        };

        let source = FetchSource {
            fetcher: &self.fetcher,
            base_url: &self.config.base_url,
            manifest: manifest.as_deref(),
        };
        let Some(previous) = self.registry.retry(name, is_manifest, source, &self.metrics)? else {
            return Ok(false);
        };
        log::warn!("Retrying bundle {name} after error: {previous}");
        Ok(true)
    }
}
