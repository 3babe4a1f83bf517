//! Polled load operations
//!
//! Every operation waits until its bundle (and the dependencies recorded for
//! it) are resident, then issues one engine-level request and polls it to
//! completion. Callers hold a cloneable handle that shares state with the
//! operation the driver advances.
//!
//! ```text
//! WaitingForBundle --bundle ready--> Dispatched --request done--> Done
//!        |                                |
//!        +--------fetch error-------------+-------> Failed
//! ```

use parking_lot::RwLock;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::Poll;

use crate::config::DependencyFailurePolicy;
use crate::fetch::{BundleContent, BundleFetcher, ItemRequest, ItemType, LoadedItem};
use crate::loader::BundleLoader;
use crate::manifest::Manifest;
use crate::registry::BundleStatus;
use crate::scene::{LoadSceneMode, SceneLoader, SceneRequest};

/// Lifecycle of a load operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    /// Waiting for the bundle and its dependencies to become resident
    WaitingForBundle,
    /// The engine-level request was issued and is being polled
    Dispatched,
    /// Completed successfully
    Done,
    /// Failed with an error message
    Failed(String),
}

impl OperationState {
    /// Done or failed; terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

type Completion = Box<dyn FnOnce(Option<LoadedItem>, Option<&str>) + Send + Sync>;

struct OperationShared {
    state: OperationState,
    item: Option<LoadedItem>,
    on_complete: Option<Completion>,
}

/// State shared between a caller handle and the driven operation
#[derive(Clone)]
struct OperationCell(Arc<RwLock<OperationShared>>);

impl OperationCell {
    fn new(state: OperationState) -> Self {
        Self(Arc::new(RwLock::new(OperationShared {
            state,
            item: None,
            on_complete: None,
        })))
    }

    fn state(&self) -> OperationState {
        self.0.read().state.clone()
    }

    fn is_terminal(&self) -> bool {
        self.0.read().state.is_terminal()
    }

    fn item(&self) -> Option<LoadedItem> {
        self.0.read().item.clone()
    }

    fn transition(&self, state: OperationState) {
        let mut shared = self.0.write();
        if !shared.state.is_terminal() {
            shared.state = state;
        }
    }

    fn complete(&self, item: Option<LoadedItem>) {
        let mut shared = self.0.write();
        if !shared.state.is_terminal() {
            shared.state = OperationState::Done;
            shared.item = item;
        }
    }

    fn fail(&self, error: String) {
        let mut shared = self.0.write();
        if !shared.state.is_terminal() {
            log::error!("{error}");
            shared.state = OperationState::Failed(error);
        }
    }

    /// Run the completion callback if the operation is terminal; at most once
    fn notify(&self) {
        let (callback, item, error) = {
            let mut shared = self.0.write();
            if !shared.state.is_terminal() {
                return;
            }
            let error = match &shared.state {
                OperationState::Failed(error) => Some(error.clone()),
                _ => None,
            };
            (shared.on_complete.take(), shared.item.clone(), error)
        };

        if let Some(callback) = callback {
            callback(item, error.as_deref());
        }
    }

    fn on_complete(&self, callback: Completion) {
        self.0.write().on_complete = Some(callback);
        // Already finished: fire now instead of waiting for a tick that never comes
        self.notify();
    }

    fn progress(&self) -> f32 {
        match &self.0.read().state {
            OperationState::WaitingForBundle | OperationState::Failed(_) => 0.0,
            OperationState::Dispatched => 0.5,
            OperationState::Done => 1.0,
        }
    }
}

macro_rules! operation_accessors {
    () => {
        /// Current state
        pub fn state(&self) -> OperationState {
            self.cell.state()
        }

        /// True once done or failed
        pub fn is_done(&self) -> bool {
            self.cell.is_terminal()
        }

        pub fn is_failed(&self) -> bool {
            matches!(self.cell.state(), OperationState::Failed(_))
        }

        /// Failure message, if the operation failed
        pub fn error(&self) -> Option<String> {
            match self.cell.state() {
                OperationState::Failed(error) => Some(error),
                _ => None,
            }
        }

        /// Coarse progress (0.0 to 1.0)
        pub fn progress(&self) -> f32 {
            self.cell.progress()
        }

        /// Resolved name of the bundle this operation waits on
        pub fn bundle_name(&self) -> &str {
            &self.bundle
        }
    };
}

/// Handle to an asset load
pub struct AssetLoadOperation<T> {
    bundle: String,
    asset: String,
    cell: OperationCell,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for AssetLoadOperation<T> {
    fn clone(&self) -> Self {
        Self {
            bundle: self.bundle.clone(),
            asset: self.asset.clone(),
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Any + Send + Sync> AssetLoadOperation<T> {
    operation_accessors!();

    pub fn asset_name(&self) -> &str {
        &self.asset
    }

    /// The decoded asset once the operation is done
    pub fn asset(&self) -> Option<Arc<T>> {
        self.cell.item().and_then(|item| item.downcast::<T>().ok())
    }

    /// Call `callback` once with the asset (or `None` on failure) when the operation finishes
    pub fn on_complete(&self, callback: impl FnOnce(Option<Arc<T>>) + Send + Sync + 'static) {
        self.cell.on_complete(Box::new(move |item, _| {
            callback(item.and_then(|item| item.downcast::<T>().ok()))
        }));
    }
}

/// Handle to a scene load
#[derive(Clone)]
pub struct SceneLoadOperation {
    bundle: String,
    scene: String,
    mode: LoadSceneMode,
    cell: OperationCell,
}

impl SceneLoadOperation {
    operation_accessors!();

    pub fn scene_name(&self) -> &str {
        &self.scene
    }

    pub fn mode(&self) -> LoadSceneMode {
        self.mode
    }

    /// Call `callback` once with `true` on success when the operation finishes
    pub fn on_complete(&self, callback: impl FnOnce(bool) + Send + Sync + 'static) {
        self.cell
            .on_complete(Box::new(move |_, error| callback(error.is_none())));
    }
}

/// Handle to the manifest load
#[derive(Clone)]
pub struct ManifestLoadOperation {
    bundle: String,
    cell: OperationCell,
}

impl ManifestLoadOperation {
    operation_accessors!();

    /// An operation for a manifest that is already published
    pub(crate) fn completed(bundle: &str, manifest: Arc<Manifest>) -> Self {
        let cell = OperationCell::new(OperationState::WaitingForBundle);
        cell.complete(Some(manifest));
        Self {
            bundle: bundle.to_string(),
            cell,
        }
    }

    /// The decoded manifest once the operation is done
    pub fn manifest(&self) -> Option<Arc<Manifest>> {
        self.cell.item().and_then(|item| item.downcast::<Manifest>().ok())
    }

    pub fn on_complete(&self, callback: impl FnOnce(Option<Arc<Manifest>>) + Send + Sync + 'static) {
        self.cell.on_complete(Box::new(move |item, _| {
            callback(item.and_then(|item| item.downcast::<Manifest>().ok()))
        }));
    }
}

/// Waits on a bundle, then decodes one named item from it
pub(crate) struct ItemLoad {
    bundle: String,
    item: String,
    item_type: ItemType,
    request: Option<Box<dyn ItemRequest>>,
    cell: OperationCell,
}

impl ItemLoad {
    fn new(bundle: &str, item: &str, item_type: ItemType) -> Self {
        Self {
            bundle: bundle.to_string(),
            item: item.to_string(),
            item_type,
            request: None,
            cell: OperationCell::new(OperationState::WaitingForBundle),
        }
    }

    /// Advance once; returns the decoded item when the request finishes this tick
    fn update<F: BundleFetcher>(&mut self, loader: &BundleLoader<F>) -> Option<LoadedItem> {
        match self.request.as_mut() {
            None => {
                let content = wait_for_bundle(&self.bundle, loader, &self.cell)?;
                if !content.contains(&self.item) {
                    self.cell.fail(format!(
                        "There is no asset with name \"{}\" in {}",
                        self.item, self.bundle
                    ));
                    return None;
                }
                self.request = Some(content.load_item_async(&self.item, self.item_type));
                self.cell.transition(OperationState::Dispatched);
                None
            }
            Some(request) => match request.poll() {
                Poll::Pending => None,
                Poll::Ready(Some(item)) => Some(item),
                Poll::Ready(None) => {
                    self.cell.fail(format!(
                        "Asset \"{}\" in {} could not be decoded as {}",
                        self.item, self.bundle, self.item_type.name
                    ));
                    None
                }
            },
        }
    }
}

/// Waits on a scene bundle, then asks the engine to load the scene
pub(crate) struct SceneLoad {
    bundle: String,
    scene: String,
    mode: LoadSceneMode,
    request: Option<Box<dyn SceneRequest>>,
    cell: OperationCell,
}

impl SceneLoad {
    fn update<F: BundleFetcher, S: SceneLoader>(&mut self, loader: &BundleLoader<F>, scenes: &S) {
        match self.request.as_mut() {
            None => {
                if wait_for_bundle(&self.bundle, loader, &self.cell).is_some() {
                    self.request = Some(scenes.load_scene_async(&self.scene, self.mode));
                    self.cell.transition(OperationState::Dispatched);
                }
            }
            Some(request) => {
                if request.poll().is_ready() {
                    self.cell.complete(None);
                }
            }
        }
    }
}

/// The operation kinds the driver advances
pub(crate) enum ActiveOperation {
    Manifest(ItemLoad),
    Asset(ItemLoad),
    Scene(SceneLoad),
}

impl ActiveOperation {
    pub(crate) fn manifest(bundle: &str, item: &str) -> (Self, ManifestLoadOperation) {
        let load = ItemLoad::new(bundle, item, ItemType::of::<Manifest>());
        let handle = ManifestLoadOperation {
            bundle: bundle.to_string(),
            cell: load.cell.clone(),
        };
        (Self::Manifest(load), handle)
    }

    pub(crate) fn asset<T: Any + Send + Sync>(bundle: &str, asset: &str) -> (Self, AssetLoadOperation<T>) {
        let load = ItemLoad::new(bundle, asset, ItemType::of::<T>());
        let handle = AssetLoadOperation {
            bundle: bundle.to_string(),
            asset: asset.to_string(),
            cell: load.cell.clone(),
            _marker: PhantomData,
        };
        (Self::Asset(load), handle)
    }

    pub(crate) fn scene(bundle: &str, scene: &str, mode: LoadSceneMode) -> (Self, SceneLoadOperation) {
        let load = SceneLoad {
            bundle: bundle.to_string(),
            scene: scene.to_string(),
            mode,
            request: None,
            cell: OperationCell::new(OperationState::WaitingForBundle),
        };
        let handle = SceneLoadOperation {
            bundle: bundle.to_string(),
            scene: scene.to_string(),
            mode,
            cell: load.cell.clone(),
        };
        (Self::Scene(load), handle)
    }

    fn cell(&self) -> &OperationCell {
        match self {
            Self::Manifest(load) | Self::Asset(load) => &load.cell,
            Self::Scene(load) => &load.cell,
        }
    }

    /// Advance once. Returns true while further updates are needed.
    pub(crate) fn update<F: BundleFetcher, S: SceneLoader>(
        &mut self,
        loader: &mut BundleLoader<F>,
        scenes: &S,
    ) -> bool {
        if self.cell().is_terminal() {
            return false;
        }

        match self {
            Self::Asset(load) => {
                if let Some(item) = load.update(loader) {
                    load.cell.complete(Some(item));
                }
            }
            Self::Manifest(load) => {
                if let Some(item) = load.update(loader) {
                    match item.clone().downcast::<Manifest>() {
                        Ok(manifest) => {
                            loader.publish_manifest(manifest);
                            load.cell.complete(Some(item));
                        }
                        Err(_) => load.cell.fail(format!(
                            "Item \"{}\" in {} is not a manifest",
                            load.item, load.bundle
                        )),
                    }
                }
            }
            Self::Scene(load) => load.update(loader, scenes),
        }

        !self.cell().is_terminal()
    }

    /// Fire the completion callback of a terminal operation
    pub(crate) fn notify(&self) {
        self.cell().notify();
    }
}

/// Query bundle availability for an operation still waiting on it
///
/// Returns the content once the request may be issued. A fetch error on the
/// bundle fails the operation; a failed dependency follows the configured
/// [`DependencyFailurePolicy`].
fn wait_for_bundle<F: BundleFetcher>(
    bundle: &str,
    loader: &BundleLoader<F>,
    cell: &OperationCell,
) -> Option<Arc<dyn BundleContent>> {
    match loader.status(bundle) {
        BundleStatus::Pending => None,
        BundleStatus::Failed(error) => {
            cell.fail(error);
            None
        }
        BundleStatus::Degraded { bundle: content, error } => {
            match loader.config().dependency_failure_policy {
                DependencyFailurePolicy::Dispatch => {
                    log::warn!("Dispatching {bundle} with a failed dependency: {error}");
                    Some(content)
                }
                DependencyFailurePolicy::Fail => {
                    cell.fail(error);
                    None
                }
            }
        }
        BundleStatus::Ready(content) => Some(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_terminal_state_is_absorbing() {
        let cell = OperationCell::new(OperationState::WaitingForBundle);
        cell.fail("boom".to_string());
        cell.transition(OperationState::Dispatched);
        cell.complete(None);
        assert_eq!(cell.state(), OperationState::Failed("boom".to_string()));
    }

    #[test]
    fn test_callback_fires_once() {
        let (_, handle) = ActiveOperation::asset::<u32>("b", "x");
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        handle.on_complete(move |asset| {
            assert_eq!(asset.as_deref(), Some(&5));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.cell.complete(Some(Arc::new(5u32)));
        handle.cell.notify();
        handle.cell.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_registered_after_completion_fires_immediately() {
        let (_, handle) = ActiveOperation::scene("b", "level", LoadSceneMode::Single);
        handle.cell.fail("boom".to_string());

        let result = Arc::new(RwLock::new(None));
        let slot = Arc::clone(&result);
        handle.on_complete(move |success| *slot.write() = Some(success));
        assert_eq!(*result.read(), Some(false));
    }

    #[test]
    fn test_asset_downcast_mismatch_is_none() {
        let (_, handle) = ActiveOperation::asset::<String>("b", "x");
        handle.cell.complete(Some(Arc::new(1u8)));
        assert!(handle.is_done());
        assert!(handle.asset().is_none());
    }

    #[test]
    fn test_progress_and_accessors() {
        let (_, handle) = ActiveOperation::asset::<u8>("bundle", "item");
        assert_eq!(handle.progress(), 0.0);
        assert_eq!(handle.bundle_name(), "bundle");
        assert_eq!(handle.asset_name(), "item");
        handle.cell.transition(OperationState::Dispatched);
        assert_eq!(handle.progress(), 0.5);
        assert!(!handle.is_done());
        assert!(handle.error().is_none());
    }

    #[test]
    fn test_completed_manifest_operation() {
        let op = ManifestLoadOperation::completed("Linux", Arc::new(Manifest::default()));
        assert!(op.is_done());
        assert!(op.manifest().is_some());
        assert_eq!(op.bundle_name(), "Linux");
    }
}
