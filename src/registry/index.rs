//! TTL-gated snapshot of the compatibility cache and search index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CACHE_TTL;
use crate::data::package::{Package, PackageName};
use crate::data::version::Version;
use crate::registry::cache::CompatibilityCache;
use crate::registry::error::StorageError;
use crate::registry::repository::Repository;
use crate::registry::search::SearchIndex;
use crate::registry::store::ObjectStore;

struct Snapshot {
    cache: CompatibilityCache,
    search: SearchIndex,
    built_at: Instant,
}

/// Process-scoped read path over the searchable corpus.
///
/// Lookups serve from the last published snapshot. Once the TTL lapses, the
/// first caller to take the rebuild lock re-downloads the corpus, rebuilds
/// both structures, and publishes them with a single atomic swap; callers
/// that lose the race keep reading the stale snapshot instead of waiting.
/// A failed rebuild leaves the old snapshot published and is retried on
/// the next lookup past the TTL.
pub struct RegistryIndex<S> {
    repository: Arc<Repository<S>>,
    snapshot: ArcSwap<Snapshot>,
    rebuild: Mutex<()>,
    ttl: Duration,
}

impl<S: ObjectStore> RegistryIndex<S> {
    /// Builds the initial snapshot; fails if the corpus cannot be read.
    pub async fn init(repository: Arc<Repository<S>>) -> Result<Self, StorageError> {
        Self::init_with_ttl(repository, CACHE_TTL).await
    }

    pub async fn init_with_ttl(
        repository: Arc<Repository<S>>,
        ttl: Duration,
    ) -> Result<Self, StorageError> {
        let snapshot = Self::build_snapshot(&repository).await?;
        Ok(Self {
            repository,
            snapshot: ArcSwap::from_pointee(snapshot),
            rebuild: Mutex::new(()),
            ttl,
        })
    }

    async fn build_snapshot(repository: &Repository<S>) -> Result<Snapshot, StorageError> {
        let infos = repository.searchable_packages().await?;
        debug!("Building cache and search index from {} releases", infos.len());
        Ok(Snapshot {
            cache: CompatibilityCache::build(&infos),
            search: SearchIndex::build(&infos),
            built_at: Instant::now(),
        })
    }

    async fn refresh_if_stale(&self) {
        if self.snapshot.load().built_at.elapsed() <= self.ttl {
            return;
        }
        // One rebuild in flight at a time; losers serve the stale snapshot.
        let Ok(_guard) = self.rebuild.try_lock() else {
            return;
        };
        // Another caller may have published between the staleness check and
        // taking the lock.
        if self.snapshot.load().built_at.elapsed() <= self.ttl {
            return;
        }
        match Self::build_snapshot(&self.repository).await {
            Ok(snapshot) => {
                self.snapshot.store(Arc::new(snapshot));
                info!("Published refreshed package index");
            }
            Err(e) => warn!("Keeping stale package index, rebuild failed: {}", e),
        }
    }

    /// Versions of `name` compatible with `compiler`, ascending.
    pub async fn versions_for(&self, name: &PackageName, compiler: Version) -> Vec<Version> {
        self.refresh_if_stale().await;
        let snapshot = self.snapshot.load();
        snapshot.cache.versions_for(name, compiler).to_vec()
    }

    /// Fuzzy search over the packages indexed for `compiler`.
    pub async fn search(&self, compiler: Version, raw_query: &str) -> Vec<Package> {
        self.refresh_if_stale().await;
        let snapshot = self.snapshot.load();
        snapshot.search.query(compiler, raw_query)
    }
}
