//! Read/write access to the persisted registry state.

#[cfg(test)]
use mockall::automock;

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::warn;

use crate::config::{KNOWN_FAILURES_KEY, SEARCHABLE_KEY};
use crate::data::package::PackageInfo;
use crate::data::project_id::ProjectId;
use crate::data::revision::{Revision, RevisionId};
use crate::data::version::Version;
use crate::registry::error::StorageError;
use crate::registry::store::ObjectStore;

/// Resolves the set of projects a caller owns from its raw session cookie.
///
/// Cookie verification is cryptographic and lives outside this crate; the
/// repository only consumes the resolved set.
#[cfg_attr(test, automock)]
pub trait OwnershipResolver: Send + Sync {
    fn owned_project_ids(&self, raw_cookie: &str) -> HashSet<ProjectId>;
}

/// Repository over the durable blob store: the two persisted package sets,
/// per-release blobs, and stored revisions.
pub struct Repository<S> {
    store: S,
}

impl<S: ObjectStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All successfully harvested releases.
    pub async fn searchable_packages(&self) -> Result<Vec<PackageInfo>, StorageError> {
        self.load_package_set(SEARCHABLE_KEY).await
    }

    /// Releases that already failed harvesting; these are never retried.
    pub async fn failed_packages(&self) -> Result<Vec<PackageInfo>, StorageError> {
        self.load_package_set(KNOWN_FAILURES_KEY).await
    }

    async fn load_package_set(&self, key: &str) -> Result<Vec<PackageInfo>, StorageError> {
        let bytes = match self.store.get(key).await {
            Ok(bytes) => bytes,
            // Fresh deployments have no persisted sets yet.
            Err(StorageError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
        // Entries that no longer decode are dropped, not fatal.
        Ok(entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    pub async fn save_searchable_packages(
        &self,
        infos: &[PackageInfo],
    ) -> Result<(), StorageError> {
        self.save_package_set(SEARCHABLE_KEY, infos).await
    }

    pub async fn save_failed_packages(&self, infos: &[PackageInfo]) -> Result<(), StorageError> {
        self.save_package_set(KNOWN_FAILURES_KEY, infos).await
    }

    async fn save_package_set(
        &self,
        key: &str,
        infos: &[PackageInfo],
    ) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(infos)?;
        self.store.put(key, bytes, "application/json").await
    }

    /// Persists the manifest, source map and optional artifact map for one
    /// harvested release. The three puts are independent; a re-run of the
    /// harvest repairs any partial state.
    pub async fn save_package_data(
        &self,
        info: &PackageInfo,
        manifest: &serde_json::Value,
        sources: &IndexMap<String, String>,
        artifacts: Option<&IndexMap<String, String>>,
        compiler: Version,
    ) -> Result<(), StorageError> {
        if let Some(artifacts) = artifacts {
            self.store
                .put(
                    &info.artifacts_key(compiler),
                    serde_json::to_vec(artifacts)?,
                    "application/json",
                )
                .await?;
        }
        self.store
            .put(
                &info.manifest_key(),
                serde_json::to_vec(manifest)?,
                "application/json",
            )
            .await?;
        self.store
            .put(
                &info.source_key(),
                serde_json::to_vec(sources)?,
                "application/json",
            )
            .await?;
        Ok(())
    }

    pub async fn revision_exists(&self, id: &RevisionId) -> Result<bool, StorageError> {
        self.store.head(&id.storage_key()).await
    }

    /// Loads a revision and stamps ownership from the resolved session set.
    /// Missing revisions are `None`, as are stored ones that fail to decode.
    pub async fn revision(
        &self,
        id: &RevisionId,
        owned: &HashSet<ProjectId>,
    ) -> Result<Option<Revision>, StorageError> {
        let key = id.storage_key();
        let bytes = match self.store.get(&key).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice::<Revision>(&bytes) {
            Ok(mut revision) => {
                revision.owned = owned.contains(&id.project_id);
                Ok(Some(revision))
            }
            Err(e) => {
                warn!("Discarding undecodable revision at {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Variant of [`Repository::revision`] that resolves ownership from the
    /// caller's raw session cookie, when one was presented.
    pub async fn revision_for_session(
        &self,
        id: &RevisionId,
        ownership: &dyn OwnershipResolver,
        raw_cookie: Option<&str>,
    ) -> Result<Option<Revision>, StorageError> {
        let owned = raw_cookie
            .map(|cookie| ownership.owned_project_ids(cookie))
            .unwrap_or_default();
        self.revision(id, &owned).await
    }
}
