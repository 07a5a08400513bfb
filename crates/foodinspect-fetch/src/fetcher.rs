//! Cache-first resolution of one identifier.

use std::sync::Arc;
use std::time::Duration;

use foodinspect_core::InspectionId;
use foodinspect_store::{DocumentCache, StoreError};
use tracing::debug;

use crate::{FetchError, Transport};

/// Where live bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Live {
        bytes: Vec<u8>,
        source: Source,
        /// This call created the cache slot.
        newly_cached: bool,
    },
    Dead,
}

impl Resolution {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// Resolves identifiers against a document cache, falling back to a
/// transport. Nothing is cached for dead identifiers.
pub struct Fetcher<T, C> {
    transport: T,
    cache: Arc<C>,
    timeout: Duration,
}

impl<T: Transport, C: DocumentCache + 'static> Fetcher<T, C> {
    pub fn new(transport: T, cache: Arc<C>, timeout: Duration) -> Self {
        Self {
            transport,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Resolve `id` to live bytes or dead.
    ///
    /// A cached document never touches the network. A single network attempt
    /// is made otherwise, bounded by the fetcher's timeout; failure, timeout,
    /// and an empty body all classify the identifier dead. Only cache errors
    /// are returned as `Err`: `Unreadable` when an existing slot cannot be
    /// read, `Storage` when a new document cannot be stored.
    pub async fn resolve(&self, id: InspectionId) -> Result<Resolution, FetchError> {
        let cached = self
            .with_cache(move |cache| cache.get(id))
            .await
            .map_err(FetchError::Unreadable)?;
        if let Some(bytes) = cached {
            debug!(%id, "cache hit");
            return Ok(Resolution::Live {
                bytes,
                source: Source::Cache,
                newly_cached: false,
            });
        }

        let attempt = match tokio::time::timeout(self.timeout, self.transport.get(id)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };
        let bytes = match attempt {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!(%id, "empty body, classified dead");
                return Ok(Resolution::Dead);
            }
            Err(e) if e.is_storage() => return Err(e),
            Err(e) => {
                debug!(%id, error = %e, "retrieval failed, classified dead");
                return Ok(Resolution::Dead);
            }
        };

        let (bytes, newly_cached) = self
            .with_cache(move |cache| {
                if cache.put(id, &bytes)? {
                    return Ok((bytes, true));
                }
                // Lost a race for the slot: the stored copy is the authoritative one.
                let stored = cache.get(id)?.unwrap_or(bytes);
                Ok((stored, false))
            })
            .await?;
        Ok(Resolution::Live {
            bytes,
            source: Source::Network,
            newly_cached,
        })
    }

    /// Run a cache operation on the blocking pool; filesystem caches block.
    async fn with_cache<R, F>(&self, op: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(&C) -> Result<R, StoreError> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        tokio::task::spawn_blocking(move || op(&cache))
            .await
            .map_err(|e| StoreError::Other(format!("cache task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use foodinspect_store::{FsDocumentCache, MemoryDocumentCache};
    use tempfile::TempDir;

    /// Serves fixed bodies; unknown ids fail like a refused connection.
    struct StubTransport {
        bodies: HashMap<u64, Vec<u8>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubTransport {
        fn new(bodies: &[(u64, &str)]) -> Self {
            Self {
                bodies: bodies.iter().map(|(k, v)| (*k, v.as_bytes().to_vec())).collect(),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, id: InspectionId) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies
                .get(&id.get())
                .cloned()
                .ok_or_else(|| FetchError::Transport("connection refused".into()))
        }
    }

    fn id(n: u64) -> InspectionId {
        InspectionId::new(n).unwrap()
    }

    #[tokio::test]
    async fn network_body_is_live_and_cached() {
        let cache = Arc::new(MemoryDocumentCache::new());
        let fetcher = Fetcher::new(
            StubTransport::new(&[(100, "<html>report</html>")]),
            cache.clone(),
            Duration::from_secs(5),
        );

        let res = fetcher.resolve(id(100)).await.unwrap();
        assert_eq!(
            res,
            Resolution::Live {
                bytes: b"<html>report</html>".to_vec(),
                source: Source::Network,
                newly_cached: true,
            }
        );
        assert!(cache.has(id(100)));
    }

    #[tokio::test]
    async fn cached_identifier_never_hits_network() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(FsDocumentCache::open(tmp.path()).unwrap());
        cache.put(id(7), b"cached copy").unwrap();
        let transport = Arc::new(StubTransport::new(&[(7, "fresh copy")]));
        let fetcher = Fetcher::new(transport.clone(), cache, Duration::from_secs(5));

        let res = fetcher.resolve(id(7)).await.unwrap();
        assert_eq!(
            res,
            Resolution::Live {
                bytes: b"cached copy".to_vec(),
                source: Source::Cache,
                newly_cached: false,
            }
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn empty_body_and_failure_are_dead_and_not_cached() {
        let cache = Arc::new(MemoryDocumentCache::new());
        let fetcher = Fetcher::new(
            StubTransport::new(&[(101, "")]),
            cache.clone(),
            Duration::from_secs(5),
        );

        assert_eq!(fetcher.resolve(id(101)).await.unwrap(), Resolution::Dead);
        assert_eq!(fetcher.resolve(id(999)).await.unwrap(), Resolution::Dead);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn slow_transport_times_out_as_dead() {
        let cache = Arc::new(MemoryDocumentCache::new());
        let mut transport = StubTransport::new(&[(5, "late")]);
        transport.delay = Some(Duration::from_secs(10));
        let fetcher = Fetcher::new(transport, cache.clone(), Duration::from_millis(20));

        assert_eq!(fetcher.resolve(id(5)).await.unwrap(), Resolution::Dead);
        assert!(!cache.has(id(5)));
    }

    #[tokio::test]
    async fn resolving_twice_fetches_once() {
        let cache = Arc::new(MemoryDocumentCache::new());
        let transport = Arc::new(StubTransport::new(&[(3, "doc")]));
        let fetcher = Fetcher::new(transport.clone(), cache, Duration::from_secs(5));

        assert!(fetcher.resolve(id(3)).await.unwrap().is_live());
        let second = fetcher.resolve(id(3)).await.unwrap();
        assert!(matches!(
            second,
            Resolution::Live {
                source: Source::Cache,
                ..
            }
        ));
        assert_eq!(transport.calls(), 1);
    }

    /// Records the thread each cache call runs on.
    #[derive(Default)]
    struct ThreadRecordingCache {
        inner: MemoryDocumentCache,
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ThreadRecordingCache {
        fn note(&self) {
            self.threads.lock().unwrap().push(std::thread::current().id());
        }
    }

    impl DocumentCache for ThreadRecordingCache {
        fn put(&self, id: InspectionId, bytes: &[u8]) -> Result<bool, StoreError> {
            self.note();
            self.inner.put(id, bytes)
        }

        fn get(&self, id: InspectionId) -> Result<Option<Vec<u8>>, StoreError> {
            self.note();
            self.inner.get(id)
        }

        fn has(&self, id: InspectionId) -> bool {
            self.inner.has(id)
        }
    }

    #[tokio::test]
    async fn cache_io_runs_off_the_async_thread() {
        let cache = Arc::new(ThreadRecordingCache::default());
        let fetcher = Fetcher::new(
            StubTransport::new(&[(8, "doc")]),
            cache.clone(),
            Duration::from_secs(5),
        );

        assert!(fetcher.resolve(id(8)).await.unwrap().is_live());
        let here = std::thread::current().id();
        let threads = cache.threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| *t != here));
    }
}
