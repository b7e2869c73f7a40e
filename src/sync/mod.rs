//! Periodic reconciliation of upstream releases into durable storage.
//!
//! A pass discovers everything published upstream, drops candidates with a
//! recorded outcome, harvests the rest in bounded batches, and persists the
//! updated searchable and known-failures sets wholesale.
//!
//! # Modules
//!
//! - [`compiler`]: external compiler subprocess wrapper
//! - [`harvest`]: per-candidate download/validate/persist pipeline

pub mod compiler;
pub mod harvest;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::data::package::PackageInfo;
use crate::registry::error::{StorageError, UpstreamError};
use crate::registry::repository::Repository;
use crate::registry::store::ObjectStore;
use crate::registry::upstream::UpstreamDirectory;
use crate::sync::compiler::Compiler;
use crate::sync::harvest::{Harvester, HarvestOutcome};

/// Errors that abort a whole pass. Nothing is persisted when one of these
/// fires, so the previously recorded sets stay intact.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Upstream discovery failed: {0}")]
    Discovery(#[from] UpstreamError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Counts for one completed pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives one sync pass end to end.
pub struct SyncOrchestrator<S, U> {
    repository: Arc<Repository<S>>,
    upstream: Arc<U>,
    harvester: Harvester<S, U>,
    batch_size: usize,
}

impl<S: ObjectStore, U: UpstreamDirectory> SyncOrchestrator<S, U> {
    pub fn new(repository: Arc<Repository<S>>, upstream: Arc<U>, config: &SyncConfig) -> Self {
        let harvester = Harvester::new(
            Arc::clone(&repository),
            Arc::clone(&upstream),
            Compiler::new(&config.compiler_path),
            config.trusted_namespaces.clone(),
        );
        Self {
            repository,
            upstream,
            harvester,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Runs one full pass.
    ///
    /// Candidates already present in either persisted set are skipped, so a
    /// re-run after a partial failure only attempts what has no recorded
    /// outcome yet. Batches run sequentially; candidates within a batch run
    /// concurrently and each failure is recorded without stopping the pass.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        info!("sync: downloading upstream package directory");
        let upstream_packages = self.upstream.list_all_packages().await?;

        let mut searchable: HashSet<PackageInfo> =
            self.repository.searchable_packages().await?.into_iter().collect();
        let known_failures = self.repository.failed_packages().await?;

        let candidates: Vec<PackageInfo> = {
            let recorded: HashSet<&PackageInfo> =
                searchable.iter().chain(known_failures.iter()).collect();
            upstream_packages
                .into_iter()
                .filter(|candidate| !recorded.contains(candidate))
                .collect()
        };

        let total = candidates.len();
        info!("sync: {} of the upstream releases are new", total);

        let mut report = SyncReport {
            attempted: total,
            ..SyncReport::default()
        };
        let mut new_failures = Vec::new();
        let mut processed = 0usize;

        for batch in candidates.chunks(self.batch_size) {
            let outcomes = join_all(
                batch
                    .iter()
                    .cloned()
                    .map(|candidate| self.harvester.harvest(candidate)),
            )
            .await;
            processed += batch.len();

            for outcome in outcomes {
                match outcome {
                    HarvestOutcome::Success(validated) => {
                        report.succeeded += 1;
                        searchable.insert(validated);
                    }
                    HarvestOutcome::Failure(candidate, reason) => {
                        warn!("sync: {} failed: {}", candidate, reason);
                        report.failed += 1;
                        new_failures.push(candidate);
                    }
                }
            }

            if total > 0 {
                info!("sync: {}%", processed * 100 / total);
            }
        }

        let mut all_failures = new_failures;
        all_failures.extend(known_failures);

        // Stable ordering keeps successive passes byte-identical.
        let mut searchable: Vec<PackageInfo> = searchable.into_iter().collect();
        searchable.sort_by(|a, b| {
            (&a.namespace, &a.name, a.version).cmp(&(&b.namespace, &b.name, b.version))
        });
        all_failures.sort_by(|a, b| {
            (&a.namespace, &a.name, a.version).cmp(&(&b.namespace, &b.name, b.version))
        });

        self.repository.save_searchable_packages(&searchable).await?;
        self.repository.save_failed_packages(&all_failures).await?;

        info!(
            "sync: finished, {} harvested, {} failed",
            report.succeeded, report.failed
        );
        Ok(report)
    }
}
