//! Mock transport for testing
//!
//! Serves in-memory bundles with a configurable number of polls before a
//! fetch completes, so tests can step the tick driver deterministically.

use super::{
    BundleContent, BundleFetcher, FetchHandle, FetchRequest, FetchStatus, ItemRequest, ItemType, LoadedItem, ReadyItem,
};
use crate::manifest::BundleHash;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::Poll;

/// In-memory bundle served by [`MockFetcher`]
#[derive(Clone, Debug, Default)]
pub struct MockBundle {
    payload: Vec<u8>,
    items: HashMap<String, LoadedItem>,
    item_latency: u32,
    unloads: Arc<AtomicU32>,
}

impl MockBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw payload the content hash is computed from
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Add a decodable item
    pub fn with_item<T: Any + Send + Sync>(mut self, name: impl Into<String>, item: T) -> Self {
        self.items.insert(name.into(), Arc::new(item));
        self
    }

    /// Number of polls an item decode stays pending
    pub fn with_item_latency(mut self, polls: u32) -> Self {
        self.item_latency = polls;
        self
    }

    /// Content hash of the payload, as a manifest would record it
    pub fn hash(&self) -> BundleHash {
        BundleHash::of(&self.payload)
    }

    /// How many times the content has been released, across all fetched copies
    pub fn unload_count(&self) -> u32 {
        self.unloads.load(Ordering::SeqCst)
    }
}

impl BundleContent for MockBundle {
    fn contains(&self, item: &str) -> bool {
        self.items.contains_key(item)
    }

    fn item_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.items.keys().cloned().collect();
        names.sort();
        names
    }

    fn load_item_async(&self, item: &str, item_type: ItemType) -> Box<dyn ItemRequest> {
        let item = self.items.get(item).cloned();
        if self.item_latency == 0 {
            return Box::new(ReadyItem::new(item.filter(|item| has_type(item, item_type))));
        }
        Box::new(MockItemRequest {
            item,
            item_type,
            remaining: self.item_latency,
        })
    }

    fn unload(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockItemRequest {
    item: Option<LoadedItem>,
    item_type: ItemType,
    remaining: u32,
}

impl ItemRequest for MockItemRequest {
    fn poll(&mut self) -> Poll<Option<LoadedItem>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Poll::Pending;
        }

        let item_type = self.item_type;
        Poll::Ready(self.item.take().filter(|item| has_type(item, item_type)))
    }
}

fn has_type(item: &LoadedItem, item_type: ItemType) -> bool {
    let any: &(dyn Any + Send + Sync) = &**item;
    any.type_id() == item_type.id
}

#[derive(Clone, Debug)]
enum MockEntry {
    Bundle(MockBundle),
    Invalid,
    Fail(String),
}

#[derive(Debug, Default)]
struct MockFetcherState {
    entries: HashMap<String, MockEntry>,
    latency: u32,
    requests: Vec<FetchRequest>,
}

/// Mock transport keyed by bundle name
///
/// Outcomes are looked up when a fetch completes, not when it starts, so a
/// test may change what a bundle resolves to while its fetch is in flight.
#[derive(Clone, Debug, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockFetcherState>>,
}

impl MockFetcher {
    /// Create a mock transport with no bundles
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(self, name: impl Into<String>, bundle: MockBundle) -> Self {
        self.insert_bundle(name, bundle);
        self
    }

    pub fn with_failure(self, name: impl Into<String>, error: impl Into<String>) -> Self {
        self.fail_bundle(name, error);
        self
    }

    /// Serve a payload that does not decode as a bundle
    pub fn with_invalid_payload(self, name: impl Into<String>) -> Self {
        self.state.lock().entries.insert(name.into(), MockEntry::Invalid);
        self
    }

    /// Number of polls every fetch stays pending before completing
    pub fn with_latency(self, polls: u32) -> Self {
        self.state.lock().latency = polls;
        self
    }

    pub fn insert_bundle(&self, name: impl Into<String>, bundle: MockBundle) {
        self.state.lock().entries.insert(name.into(), MockEntry::Bundle(bundle));
    }

    pub fn fail_bundle(&self, name: impl Into<String>, error: impl Into<String>) {
        self.state
            .lock()
            .entries
            .insert(name.into(), MockEntry::Fail(error.into()));
    }

    /// Every fetch started so far, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of fetches started for a bundle name
    pub fn fetch_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.name == name)
            .count()
    }
}

impl BundleFetcher for MockFetcher {
    fn fetch(&self, request: FetchRequest) -> Box<dyn FetchHandle> {
        let mut state = self.state.lock();
        let latency = state.latency;
        state.requests.push(request.clone());

        Box::new(MockFetchHandle {
            request,
            latency,
            remaining: latency,
            state: Arc::clone(&self.state),
        })
    }

    fn transport_name(&self) -> &'static str {
        "Mock"
    }
}

struct MockFetchHandle {
    request: FetchRequest,
    latency: u32,
    remaining: u32,
    state: Arc<Mutex<MockFetcherState>>,
}

impl FetchHandle for MockFetchHandle {
    fn poll(&mut self) -> FetchStatus {
        if self.remaining > 0 {
            self.remaining -= 1;
            return FetchStatus::Pending;
        }

        let entry = self.state.lock().entries.get(&self.request.name).cloned();
        match entry {
            None => FetchStatus::Failed("404 Not Found".to_string()),
            Some(MockEntry::Fail(error)) => FetchStatus::Failed(error),
            Some(MockEntry::Invalid) => FetchStatus::Done(None),
            Some(MockEntry::Bundle(bundle)) => match self.request.hash {
                Some(expected) if expected != bundle.hash() => FetchStatus::Failed(format!(
                    "content hash mismatch: expected {expected}, got {}",
                    bundle.hash()
                )),
                _ => FetchStatus::Done(Some(Arc::new(bundle))),
            },
        }
    }

    fn url(&self) -> &str {
        &self.request.url
    }

    fn progress(&self) -> f32 {
        if self.latency == 0 {
            return 0.0;
        }
        1.0 - self.remaining as f32 / self.latency as f32
    }
}
