//! Fetch bookkeeping: pending fetches, resident bundles, fetch errors and
//! recorded dependency sets
//!
//! All four maps live in one [`FetchRegistry`] so that the mutual exclusion
//! between pending, resident and failed is maintained in one place: a
//! bundle name is in at most one of those three sets at any time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{BundleError, Result};
use crate::fetch::{BundleContent, BundleFetcher, FetchHandle, FetchRequest, FetchStatus};
use crate::manifest::{BundleHash, Manifest};
use crate::metrics::BundleMetrics;

/// A resident bundle and the number of outstanding loads holding it
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    content: Arc<dyn BundleContent>,
    reference_count: u32,
}

impl LoadedBundle {
    fn new(content: Arc<dyn BundleContent>, reference_count: u32) -> Self {
        Self {
            content,
            reference_count,
        }
    }

    pub fn content(&self) -> &Arc<dyn BundleContent> {
        &self.content
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }
}

struct PendingFetch {
    handle: Box<dyn FetchHandle>,
    // Loads that joined this fetch minus unloads issued while it was in flight
    requests: u32,
    started: Instant,
}

/// A permanent fetch error and the loads still holding the failed name
struct FailedFetch {
    error: String,
    requests: u32,
}

/// What `begin_fetch` did for a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new transport fetch was started
    Started,
    /// The bundle was resident; its reference count was incremented
    AlreadyResident,
    /// A fetch was in flight; the request joined it
    AlreadyPending,
    /// A permanent fetch error is recorded; the request is held by it and nothing was started
    AlreadyFailed,
}

impl FetchOutcome {
    /// True when no new fetch was needed
    pub fn already_satisfied(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// Where and how to fetch
#[derive(Clone, Copy)]
pub struct FetchSource<'a> {
    pub fetcher: &'a dyn BundleFetcher,
    pub base_url: &'a str,
    pub manifest: Option<&'a Manifest>,
}

/// A fetch that finished during [`FetchRegistry::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub name: String,
    /// Recorded fetch error, or `None` when the bundle became resident
    pub error: Option<String>,
}

/// Availability of a bundle together with its recorded dependencies
#[derive(Debug, Clone)]
pub enum BundleStatus {
    /// Not resident yet, or a recorded dependency is still being fetched
    Pending,
    /// The bundle itself failed to fetch
    Failed(String),
    /// The bundle is resident but a recorded dependency failed
    Degraded {
        bundle: Arc<dyn BundleContent>,
        error: String,
    },
    /// The bundle and every recorded dependency are resident
    Ready(Arc<dyn BundleContent>),
}

impl BundleStatus {
    /// The bundle reference, present for `Ready` and `Degraded`
    pub fn bundle(&self) -> Option<&Arc<dyn BundleContent>> {
        match self {
            Self::Ready(bundle) | Self::Degraded { bundle, .. } => Some(bundle),
            Self::Pending | Self::Failed(_) => None,
        }
    }

    /// The reported error, present for `Failed` and `Degraded`
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(error) | Self::Degraded { error, .. } => Some(error),
            Self::Pending | Self::Ready(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Tracks in-flight fetches, resident bundles, fetch errors and dependency records
#[derive(Default)]
pub struct FetchRegistry {
    pending: HashMap<String, PendingFetch>,
    resident: HashMap<String, LoadedBundle>,
    errors: HashMap<String, FailedFetch>,
    dependencies: HashMap<String, Vec<String>>,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `name` is resident or being fetched
    ///
    /// The manifest bundle is fetched without a hash; every other bundle is
    /// fetched with the hash the manifest records for it, which requires the
    /// manifest to be loaded.
    pub fn begin_fetch(
        &mut self,
        name: &str,
        is_manifest: bool,
        source: FetchSource<'_>,
        metrics: &BundleMetrics,
    ) -> Result<FetchOutcome> {
        let hash = Self::content_hash(name, is_manifest, source)?;

        if let Some(bundle) = self.resident.get_mut(name) {
            bundle.reference_count += 1;
            metrics.record_dedup_hit();
            return Ok(FetchOutcome::AlreadyResident);
        }

        if let Some(pending) = self.pending.get_mut(name) {
            pending.requests += 1;
            metrics.record_dedup_hit();
            return Ok(FetchOutcome::AlreadyPending);
        }

        if let Some(failed) = self.errors.get_mut(name) {
            failed.requests += 1;
            return Ok(FetchOutcome::AlreadyFailed);
        }

        self.start_fetch(name, is_manifest, hash, 1, source, metrics);
        Ok(FetchOutcome::Started)
    }

    /// Clear the permanent error for `name` and fetch it again for the loads still holding it
    ///
    /// Returns the cleared error, or `None` when `name` had no error. When
    /// every load of the failed name has been unloaded the error is cleared
    /// without starting a fetch.
    pub fn retry(
        &mut self,
        name: &str,
        is_manifest: bool,
        source: FetchSource<'_>,
        metrics: &BundleMetrics,
    ) -> Result<Option<String>> {
        if !self.errors.contains_key(name) {
            return Ok(None);
        }
        let hash = Self::content_hash(name, is_manifest, source)?;

        let Some(failed) = self.errors.remove(name) else {
            return Ok(None);
        };
        if failed.requests > 0 {
            self.start_fetch(name, is_manifest, hash, failed.requests, source, metrics);
        }
        Ok(Some(failed.error))
    }

    fn content_hash(name: &str, is_manifest: bool, source: FetchSource<'_>) -> Result<Option<BundleHash>> {
        if is_manifest {
            return Ok(None);
        }
        let manifest = source.manifest.ok_or(BundleError::ManifestNotInitialized)?;
        Ok(manifest.hash(name))
    }

    fn start_fetch(
        &mut self,
        name: &str,
        is_manifest: bool,
        hash: Option<BundleHash>,
        requests: u32,
        source: FetchSource<'_>,
        metrics: &BundleMetrics,
    ) {
        if !is_manifest && hash.is_none() {
            log::warn!("Bundle {name} is not listed in the manifest, fetching without a content hash");
        }

        let request = FetchRequest {
            name: name.to_string(),
            url: format!("{}{}", source.base_url, name),
            hash,
        };
        let handle = source.fetcher.fetch(request);
        metrics.record_fetch_started(name);
        self.pending.insert(
            name.to_string(),
            PendingFetch {
                handle,
                requests,
                started: Instant::now(),
            },
        );
    }

    /// Poll every pending fetch once, moving finished ones to resident or failed
    pub fn advance(&mut self, metrics: &BundleMetrics) -> Vec<FetchCompletion> {
        let mut finished = Vec::new();
        for (name, pending) in self.pending.iter_mut() {
            match pending.handle.poll() {
                FetchStatus::Pending => {}
                FetchStatus::Failed(error) => {
                    let message = format!(
                        "Failed downloading bundle {name} from {}: {error}",
                        pending.handle.url()
                    );
                    finished.push((name.clone(), Err(message)));
                }
                FetchStatus::Done(None) => {
                    finished.push((name.clone(), Err(format!("{name} is not a valid bundle."))));
                }
                FetchStatus::Done(Some(content)) => {
                    finished.push((name.clone(), Ok(content)));
                }
            }
        }

        let mut completions = Vec::with_capacity(finished.len());
        for (name, result) in finished {
            let Some(pending) = self.pending.remove(&name) else {
                continue;
            };

            let error = match result {
                Ok(content) => {
                    metrics.record_fetch_time(&name, pending.started.elapsed());
                    if pending.requests == 0 {
                        log::debug!("Bundle {name} was unloaded while fetching, releasing it");
                        content.unload();
                        metrics.record_release();
                    } else {
                        log::debug!("Bundle {name} is resident ({} references)", pending.requests);
                        self.resident
                            .insert(name.clone(), LoadedBundle::new(content, pending.requests));
                    }
                    None
                }
                Err(message) => {
                    metrics.record_fetch_failure();
                    log::error!("{message}");
                    self.errors.insert(
                        name.clone(),
                        FailedFetch {
                            error: message.clone(),
                            requests: pending.requests,
                        },
                    );
                    Some(message)
                }
            };

            pending.handle.dispose();
            completions.push(FetchCompletion { name, error });
        }

        completions
    }

    /// Availability of `name` and its recorded dependencies
    pub fn status(&self, name: &str) -> BundleStatus {
        if let Some(failed) = self.errors.get(name) {
            return BundleStatus::Failed(failed.error.clone());
        }

        let Some(bundle) = self.resident.get(name) else {
            return BundleStatus::Pending;
        };
        let bundle = Arc::clone(&bundle.content);

        let Some(dependencies) = self.dependencies.get(name) else {
            return BundleStatus::Ready(bundle);
        };

        for dependency in dependencies {
            if let Some(failed) = self.errors.get(dependency) {
                return BundleStatus::Degraded {
                    bundle,
                    error: failed.error.clone(),
                };
            }
            if !self.resident.contains_key(dependency) {
                return BundleStatus::Pending;
            }
        }

        BundleStatus::Ready(bundle)
    }

    /// Drop one reference; the bundle is unloaded and removed when none remain
    ///
    /// A pending or failed name loses one of the loads holding it, so a
    /// fetch that completes with none left is released immediately. Returns
    /// the remaining count, or `None` if `name` is not tracked.
    pub fn release(&mut self, name: &str, metrics: &BundleMetrics) -> Option<u32> {
        if let Some(pending) = self.pending.get_mut(name) {
            pending.requests = pending.requests.saturating_sub(1);
            return Some(pending.requests);
        }
        if let Some(failed) = self.errors.get_mut(name) {
            failed.requests = failed.requests.saturating_sub(1);
            return Some(failed.requests);
        }

        let bundle = self.resident.get_mut(name)?;
        bundle.reference_count = bundle.reference_count.saturating_sub(1);
        let remaining = bundle.reference_count;

        if remaining == 0 {
            if let Some(bundle) = self.resident.remove(name) {
                bundle.content.unload();
            }
            metrics.record_release();
        }

        Some(remaining)
    }

    /// Record the resolved dependencies of a root; refuses to overwrite an existing record
    pub fn record_dependencies(&mut self, root: &str, dependencies: Vec<String>) -> bool {
        if self.dependencies.contains_key(root) {
            log::warn!("Dependencies of {root} are already recorded");
            return false;
        }
        self.dependencies.insert(root.to_string(), dependencies);
        true
    }

    pub fn take_dependencies(&mut self, root: &str) -> Option<Vec<String>> {
        self.dependencies.remove(root)
    }

    pub fn recorded_dependencies(&self, root: &str) -> Option<&[String]> {
        self.dependencies.get(root).map(Vec::as_slice)
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(|failed| failed.error.as_str())
    }

    pub fn reference_count(&self, name: &str) -> Option<u32> {
        self.resident.get(name).map(LoadedBundle::reference_count)
    }

    /// Loads holding `name` whether it is resident, pending or failed
    pub fn held_requests(&self, name: &str) -> Option<u32> {
        self.resident
            .get(name)
            .map(LoadedBundle::reference_count)
            .or_else(|| self.pending.get(name).map(|pending| pending.requests))
            .or_else(|| self.errors.get(name).map(|failed| failed.requests))
    }

    pub fn loaded_bundle(&self, name: &str) -> Option<&LoadedBundle> {
        self.resident.get(name)
    }

    pub fn is_resident(&self, name: &str) -> bool {
        self.resident.contains_key(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Transport progress of a pending fetch; 1.0 once resident
    pub fn progress(&self, name: &str) -> Option<f32> {
        if self.resident.contains_key(name) {
            return Some(1.0);
        }
        self.pending.get(name).map(|pending| pending.handle.progress())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn resident_count(&self) -> usize {
        self.resident.len()
    }

    /// Names of resident bundles, sorted
    pub fn resident_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.resident.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of pending fetches, sorted
    pub fn pending_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.pending.keys().cloned().collect();
        names.sort();
        names
    }
}
