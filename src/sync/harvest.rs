//! Per-candidate harvest pipeline: download, validate, persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{
    ARTIFACTS_DIR, BINARY_ARTIFACT_EXT, MANIFEST_COMPILER_FIELD, MANIFEST_FILE,
    MANIFEST_SOURCE_DIRS_FIELD, MIN_SUPPORTED_COMPILER, SOURCE_EXTENSIONS, TEXT_ARTIFACT_EXT,
};
use crate::data::constraint::Constraint;
use crate::data::package::PackageInfo;
use crate::data::version::Version;
use crate::registry::error::{StorageError, UpstreamError};
use crate::registry::repository::Repository;
use crate::registry::store::ObjectStore;
use crate::registry::upstream::UpstreamDirectory;
use crate::sync::compiler::{CompileError, Compiler};

/// Why one candidate failed to harvest. A failure never aborts the pass; it
/// lands the candidate in the known-failures set instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Upstream fetch failed: {0}")]
    Fetch(#[from] UpstreamError),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest problem: {0}")]
    Manifest(String),

    #[error("Declared compiler range does not admit {0}")]
    UnsupportedCompiler(Version),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Storage write failed: {0}")]
    Storage(#[from] StorageError),
}

/// Result of harvesting one candidate. Outcomes, not errors, cross the
/// batch boundary; the orchestrator aggregates them after each batch.
#[derive(Debug)]
pub enum HarvestOutcome {
    /// Validated and persisted; carries the constraint-bearing info.
    Success(PackageInfo),
    /// Failed; recorded so the candidate is never attempted again.
    Failure(PackageInfo, HarvestError),
}

/// Downloads, validates and persists individual release candidates.
pub struct Harvester<S, U> {
    repository: Arc<Repository<S>>,
    upstream: Arc<U>,
    compiler: Compiler,
    trusted_namespaces: Vec<String>,
}

impl<S: ObjectStore, U: UpstreamDirectory> Harvester<S, U> {
    pub fn new(
        repository: Arc<Repository<S>>,
        upstream: Arc<U>,
        compiler: Compiler,
        trusted_namespaces: Vec<String>,
    ) -> Self {
        Self {
            repository,
            upstream,
            compiler,
            trusted_namespaces,
        }
    }

    /// Runs the whole pipeline for one candidate. Every failure folds into
    /// the returned outcome, and the temporary extraction directory is
    /// removed when its `TempDir` drops, success or not.
    pub async fn harvest(&self, info: PackageInfo) -> HarvestOutcome {
        match self.try_harvest(&info).await {
            Ok(validated) => HarvestOutcome::Success(validated),
            Err(reason) => {
                debug!("Harvest of {} failed: {}", info, reason);
                HarvestOutcome::Failure(info, reason)
            }
        }
    }

    async fn try_harvest(&self, info: &PackageInfo) -> Result<PackageInfo, HarvestError> {
        let archive = self.upstream.fetch_archive(info).await?;

        let workspace = tempfile::Builder::new()
            .prefix("package-mirror-")
            .tempdir()?;
        extract_archive(&archive, workspace.path())?;

        // Archives unpack into a single `{name}-{version}` directory.
        let package_dir = workspace
            .path()
            .join(format!("{}-{}", info.name, info.version));
        let manifest = read_manifest(&package_dir)?;

        let constraint = manifest
            .get(MANIFEST_COMPILER_FIELD)
            .and_then(serde_json::Value::as_str)
            .and_then(Constraint::parse)
            .ok_or_else(|| {
                HarvestError::Manifest(format!("missing or unparsable {MANIFEST_COMPILER_FIELD}"))
            })?;

        if !constraint.is_satisfied(MIN_SUPPORTED_COMPILER) {
            return Err(HarvestError::UnsupportedCompiler(MIN_SUPPORTED_COMPILER));
        }

        let mut validated = info.clone();
        validated.compiler_constraint = Some(constraint);

        let artifacts = if self.trusted_namespaces.contains(&info.namespace) {
            self.compiler.compile(&package_dir).await?;
            Some(read_artifacts(&package_dir, &validated)?)
        } else {
            None
        };

        let sources = read_sources(&package_dir, &manifest)?;

        self.repository
            .save_package_data(
                &validated,
                &manifest,
                &sources,
                artifacts.as_ref(),
                MIN_SUPPORTED_COMPILER,
            )
            .await?;

        Ok(validated)
    }
}

fn extract_archive(bytes: &[u8], target: &Path) -> Result<(), HarvestError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;
    archive.extract(target)?;
    Ok(())
}

fn read_manifest(package_dir: &Path) -> Result<serde_json::Value, HarvestError> {
    let path = package_dir.join(MANIFEST_FILE);
    let raw = std::fs::read(&path)
        .map_err(|e| HarvestError::Manifest(format!("{MANIFEST_FILE}: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| HarvestError::Manifest(format!("{MANIFEST_FILE}: {e}")))
}

/// Collects source files under the manifest's declared source directories,
/// keyed by package-relative path. Declared directories that do not exist
/// in the archive contribute nothing.
fn read_sources(
    package_dir: &Path,
    manifest: &serde_json::Value,
) -> Result<IndexMap<String, String>, HarvestError> {
    let declared: Vec<&str> = manifest
        .get(MANIFEST_SOURCE_DIRS_FIELD)
        .and_then(serde_json::Value::as_array)
        .map(|dirs| dirs.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();

    let mut sources = IndexMap::new();
    for dir in declared {
        let root = package_dir.join(dir);
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| HarvestError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(extension) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !SOURCE_EXTENSIONS.contains(&extension) {
                continue;
            }
            let relative = entry.path().strip_prefix(package_dir).unwrap_or(entry.path());
            sources.insert(
                relative.to_string_lossy().replace('\\', "/"),
                std::fs::read_to_string(entry.path())?,
            );
        }
    }
    Ok(sources)
}

/// Reads compiler output from the fixed artifacts directory. Interface
/// files are binary and get base64-encoded; output files are stored as-is.
fn read_artifacts(
    package_dir: &Path,
    info: &PackageInfo,
) -> Result<IndexMap<String, String>, HarvestError> {
    let dir = package_dir
        .join(ARTIFACTS_DIR)
        .join(MIN_SUPPORTED_COMPILER.to_string())
        .join(&info.namespace)
        .join(&info.name)
        .join(info.version.to_string());

    let mut artifacts = IndexMap::new();
    if !dir.is_dir() {
        return Ok(artifacts);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if extension == BINARY_ARTIFACT_EXT {
            artifacts.insert(name.to_string(), BASE64.encode(std::fs::read(&path)?));
        } else if extension == TEXT_ARTIFACT_EXT {
            artifacts.insert(name.to_string(), std::fs::read_to_string(&path)?);
        }
    }
    Ok(artifacts)
}
