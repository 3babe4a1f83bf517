//! Polled adapter over async transports
//!
//! [`SpawnedFetcher`] runs an [`AsyncFetch`] on an [`AsyncSpawner`] and
//! exposes the result through the polled [`BundleFetcher`] contract. The
//! spawned task writes its outcome into a shared slot; the tick driver only
//! ever reads that slot.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use super::{BundleContent, BundleFetcher, FetchHandle, FetchRequest, FetchStatus};
use crate::manifest::BundleHash;
use crate::runtime::{AsyncSpawner, JoinHandle};

/// Async fetch-by-URL primitive
#[async_trait]
pub trait AsyncFetch: Send + Sync + 'static {
    /// Download the raw payload at `url`
    async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>>;

    fn transport_name(&self) -> &'static str;
}

/// Turns a downloaded payload into bundle content
pub trait BundleDecoder: Send + Sync + 'static {
    /// `None` when the payload is not a valid bundle
    fn decode(&self, name: &str, bytes: Vec<u8>) -> Option<Arc<dyn BundleContent>>;
}

/// [`BundleDecoder`] backed by a closure; see [`decode_with`]
pub struct FnDecoder<F>(F);

impl<F> BundleDecoder for FnDecoder<F>
where
    F: Fn(&str, Vec<u8>) -> Option<Arc<dyn BundleContent>> + Send + Sync + 'static,
{
    fn decode(&self, name: &str, bytes: Vec<u8>) -> Option<Arc<dyn BundleContent>> {
        (self.0)(name, bytes)
    }
}

/// Build a decoder from a closure
pub fn decode_with<F>(decode: F) -> FnDecoder<F>
where
    F: Fn(&str, Vec<u8>) -> Option<Arc<dyn BundleContent>> + Send + Sync + 'static,
{
    FnDecoder(decode)
}

type Outcome = std::result::Result<Option<Arc<dyn BundleContent>>, String>;

/// [`BundleFetcher`] that runs an async transport on a spawner
pub struct SpawnedFetcher<S: AsyncSpawner, A: AsyncFetch, D: BundleDecoder> {
    spawner: S,
    transport: Arc<A>,
    decoder: Arc<D>,
}

impl<S: AsyncSpawner, A: AsyncFetch, D: BundleDecoder> SpawnedFetcher<S, A, D> {
    pub fn new(spawner: S, transport: A, decoder: D) -> Self {
        Self {
            spawner,
            transport: Arc::new(transport),
            decoder: Arc::new(decoder),
        }
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }
}

impl<S: AsyncSpawner, A: AsyncFetch, D: BundleDecoder> BundleFetcher for SpawnedFetcher<S, A, D> {
    fn fetch(&self, request: FetchRequest) -> Box<dyn FetchHandle> {
        let slot: Arc<Mutex<Option<Outcome>>> = Arc::new(Mutex::new(None));

        let transport = Arc::clone(&self.transport);
        let decoder = Arc::clone(&self.decoder);
        let task_slot = Arc::clone(&slot);
        let FetchRequest { name, url, hash } = request.clone();

        let task = async move {
            let outcome = match transport.fetch_bytes(&url).await {
                Ok(bytes) => validate(hash, &bytes).map(|()| decoder.decode(&name, bytes)),
                Err(err) => Err(format!("{err:#}")),
            };
            *task_slot.lock() = Some(outcome);
        };

        log::debug!(
            "Spawning {} fetch of {} on {}",
            self.transport.transport_name(),
            request.url,
            self.spawner.runtime_name()
        );
        let task = self.spawner.spawn(task);

        Box::new(SpawnedFetchHandle {
            url: request.url,
            slot,
            task: Some(task),
        })
    }

    fn transport_name(&self) -> &'static str {
        self.transport.transport_name()
    }
}

fn validate(expected: Option<BundleHash>, bytes: &[u8]) -> std::result::Result<(), String> {
    match expected {
        Some(expected) => {
            let actual = BundleHash::of(bytes);
            if actual == expected {
                Ok(())
            } else {
                Err(format!("content hash mismatch: expected {expected}, got {actual}"))
            }
        }
        None => Ok(()),
    }
}

struct SpawnedFetchHandle {
    url: String,
    slot: Arc<Mutex<Option<Outcome>>>,
    task: Option<JoinHandle>,
}

impl FetchHandle for SpawnedFetchHandle {
    fn poll(&mut self) -> FetchStatus {
        match self.slot.lock().clone() {
            None => FetchStatus::Pending,
            Some(Ok(content)) => FetchStatus::Done(content),
            Some(Err(error)) => FetchStatus::Failed(error),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn progress(&self) -> f32 {
        if self.slot.lock().is_some() {
            1.0
        } else {
            0.0
        }
    }

    fn dispose(mut self: Box<Self>) {
        self.task.take();
    }
}

/// Reads `file://` URLs from the local filesystem
///
/// The read is a blocking `std::fs::read` inside the spawned task, so it
/// stalls a worker of an async runtime for the duration of the read. Use
/// `TokioFileFetch` on Tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetch;

fn file_path(url: &str) -> anyhow::Result<PathBuf> {
    let path = url
        .strip_prefix("file://")
        .ok_or_else(|| anyhow::anyhow!("unsupported URL scheme in {url}"))?;
    Ok(PathBuf::from(path))
}

#[async_trait]
impl AsyncFetch for FileFetch {
    async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        use anyhow::Context;

        let path = file_path(url)?;
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn transport_name(&self) -> &'static str {
        "File"
    }
}

/// Reads `file://` URLs through `tokio::fs` without blocking the runtime
#[cfg(feature = "runtime-tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileFetch;

#[cfg(feature = "runtime-tokio")]
#[async_trait]
impl AsyncFetch for TokioFileFetch {
    async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        use anyhow::Context;

        let path = file_path(url)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    fn transport_name(&self) -> &'static str {
        "TokioFile"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockBundle;
    use crate::runtime::MockSpawner;
    use std::collections::HashMap;

    struct MemoryFetch(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl AsyncFetch for MemoryFetch {
        async fn fetch_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
        }

        fn transport_name(&self) -> &'static str {
            "Memory"
        }
    }

    fn decoder() -> impl BundleDecoder {
        decode_with(|_, bytes| {
            if bytes.is_empty() {
                None
            } else {
                Some(Arc::new(MockBundle::new().with_payload(bytes)))
            }
        })
    }

    fn request(url: &str, hash: Option<BundleHash>) -> FetchRequest {
        FetchRequest {
            name: "a".to_string(),
            url: url.to_string(),
            hash,
        }
    }

    fn memory() -> MemoryFetch {
        let mut payloads = HashMap::new();
        payloads.insert("mem://a".to_string(), b"payload".to_vec());
        payloads.insert("mem://empty".to_string(), Vec::new());
        MemoryFetch(payloads)
    }

    #[test]
    fn test_blocking_spawn_completes_before_poll() {
        let fetcher = SpawnedFetcher::new(MockSpawner::blocking(), memory(), decoder());
        assert_eq!(fetcher.transport_name(), "Memory");

        let mut handle = fetcher.fetch(request("mem://a", Some(BundleHash::of(b"payload"))));
        assert_eq!(handle.progress(), 1.0);
        assert!(matches!(handle.poll(), FetchStatus::Done(Some(_))));
        handle.dispose();
    }

    #[test]
    fn test_transport_error_and_invalid_payload() {
        let fetcher = SpawnedFetcher::new(MockSpawner::blocking(), memory(), decoder());

        match fetcher.fetch(request("mem://gone", None)).poll() {
            FetchStatus::Failed(error) => assert!(error.contains("404")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(matches!(
            fetcher.fetch(request("mem://empty", None)).poll(),
            FetchStatus::Done(None)
        ));
    }

    #[test]
    fn test_hash_mismatch_fails() {
        let fetcher = SpawnedFetcher::new(MockSpawner::blocking(), memory(), decoder());
        let mut handle = fetcher.fetch(request("mem://a", Some(BundleHash(1))));
        assert!(matches!(handle.poll(), FetchStatus::Failed(error) if error.contains("hash mismatch")));
    }

    #[test]
    fn test_dropped_task_stays_pending() {
        let fetcher = SpawnedFetcher::new(MockSpawner::new(), memory(), decoder());
        let mut handle = fetcher.fetch(request("mem://a", None));
        assert!(matches!(handle.poll(), FetchStatus::Pending));
        assert_eq!(handle.progress(), 0.0);
    }

    #[test]
    fn test_file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, b"on disk").unwrap();

        let fetcher = SpawnedFetcher::new(MockSpawner::blocking(), FileFetch, decoder());
        let url = format!("file://{}", path.display());
        assert!(matches!(fetcher.fetch(request(&url, None)).poll(), FetchStatus::Done(Some(_))));

        let missing = format!("file://{}", dir.path().join("b").display());
        assert!(matches!(fetcher.fetch(request(&missing, None)).poll(), FetchStatus::Failed(_)));
        assert!(matches!(
            fetcher.fetch(request("http://cdn/a", None)).poll(),
            FetchStatus::Failed(error) if error.contains("unsupported URL scheme")
        ));
    }

    #[cfg(feature = "runtime-tokio")]
    #[tokio::test]
    async fn test_tokio_file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, b"on disk").unwrap();

        let bytes = TokioFileFetch.fetch_bytes(&format!("file://{}", path.display())).await.unwrap();
        assert_eq!(bytes, b"on disk");

        let missing = TokioFileFetch
            .fetch_bytes(&format!("file://{}", dir.path().join("b").display()))
            .await
            .unwrap_err();
        assert!(missing.to_string().contains("reading"));
    }
}
