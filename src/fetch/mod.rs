//! Transport abstraction for fetching bundles
//!
//! The loader never blocks on a fetch. It starts one through a
//! [`BundleFetcher`] and polls the returned [`FetchHandle`] once per tick
//! until it reports success or failure. Decoded bundles are exposed as
//! [`BundleContent`], which in turn hands out polled [`ItemRequest`]s.

pub mod mock;
pub mod spawned;

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::sync::Arc;
use std::task::Poll;

use crate::manifest::BundleHash;

/// A decoded item taken out of a bundle
pub type LoadedItem = Arc<dyn Any + Send + Sync>;

/// The type an item request expects to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ItemType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// Parameters of a single bundle fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Bundle name the fetch is for
    pub name: String,
    /// Full download URL (base URL + bundle name)
    pub url: String,
    /// Content hash for cache validation; absent for the manifest bundle
    pub hash: Option<BundleHash>,
}

/// Status reported by a polled fetch
pub enum FetchStatus {
    /// Still transferring
    Pending,
    /// Transport error text
    Failed(String),
    /// Transfer finished; `None` means the payload is not a valid bundle
    Done(Option<Arc<dyn BundleContent>>),
}

impl Debug for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Done(content) => f.debug_tuple("Done").field(&content.is_some()).finish(),
        }
    }
}

/// An in-flight fetch
pub trait FetchHandle: Send + Sync {
    /// Advance and report status. Called at most once per tick.
    fn poll(&mut self) -> FetchStatus;

    /// Source location, used in error messages
    fn url(&self) -> &str;

    /// Transfer progress in `0.0..=1.0`
    fn progress(&self) -> f32 {
        0.0
    }

    /// Release transport resources once the fetch has finished
    fn dispose(self: Box<Self>) {}
}

/// Fetch-by-URL primitive with optional content-hash validation
pub trait BundleFetcher: Send + Sync {
    /// Start a fetch. Errors are reported through the handle, never here.
    fn fetch(&self, request: FetchRequest) -> Box<dyn FetchHandle>;

    /// Name of this transport (for debugging)
    fn transport_name(&self) -> &'static str;
}

/// Decoded bundle content held while the bundle is resident
pub trait BundleContent: Send + Sync + Debug {
    /// Synchronous item lookup
    fn contains(&self, item: &str) -> bool;

    fn item_names(&self) -> Vec<String>;

    /// Begin decoding a named item as the expected type
    fn load_item_async(&self, item: &str, item_type: ItemType) -> Box<dyn ItemRequest>;

    /// Release the decoded content. Called once, when the last reference goes away.
    fn unload(&self) {}
}

/// An in-flight item decode
pub trait ItemRequest: Send + Sync {
    /// `Ready(None)` when the item is missing or not of the expected type
    fn poll(&mut self) -> Poll<Option<LoadedItem>>;
}

/// An item request that is already resolved
#[derive(Default)]
pub struct ReadyItem(Option<LoadedItem>);

impl ReadyItem {
    pub fn new(item: Option<LoadedItem>) -> Self {
        Self(item)
    }
}

impl ItemRequest for ReadyItem {
    fn poll(&mut self) -> Poll<Option<LoadedItem>> {
        Poll::Ready(self.0.take())
    }
}
