use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::data::version::Version;

// =============================================================================
// Compiler versions
// =============================================================================

/// Compiler releases the compatibility cache is built for.
pub const KNOWN_COMPILER_VERSIONS: &[Version] = &[
    Version::new(0, 18, 0),
    Version::new(0, 17, 1),
    Version::new(0, 17, 0),
    Version::new(0, 16, 0),
    Version::new(0, 15, 0),
];

/// Compiler releases that get a full-text search index (the latest only).
pub const SEARCHABLE_COMPILER_VERSIONS: &[Version] = &[Version::new(0, 18, 0)];

/// Oldest compiler release a harvested package must declare support for.
pub const MIN_SUPPORTED_COMPILER: Version = Version::new(0, 18, 0);

// =============================================================================
// Storage and cache
// =============================================================================

/// How long a published cache/index snapshot stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Key of the persisted set of successfully harvested releases.
pub const SEARCHABLE_KEY: &str = "package-artifacts/searchable.json";

/// Key of the persisted set of releases that failed harvesting.
pub const KNOWN_FAILURES_KEY: &str = "package-artifacts/known_failures.json";

// =============================================================================
// Upstream package layout
// =============================================================================

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "http://package.elm-lang.org";
pub const DEFAULT_ARCHIVE_BASE_URL: &str = "http://github.com";

/// Manifest file at the root of every package archive.
pub const MANIFEST_FILE: &str = "elm-package.json";

/// Manifest field holding the declared compiler constraint.
pub const MANIFEST_COMPILER_FIELD: &str = "elm-version";

/// Manifest field listing the package's source directories.
pub const MANIFEST_SOURCE_DIRS_FIELD: &str = "source-directories";

/// File extensions collected from the declared source directories.
pub const SOURCE_EXTENSIONS: &[&str] = &["elm", "js"];

/// Where the compiler leaves its output, relative to the package root.
pub const ARTIFACTS_DIR: &str = "elm-stuff/build-artifacts";

/// Compiler output files that are plain text.
pub const TEXT_ARTIFACT_EXT: &str = "elmo";

/// Compiler interface files; binary, stored base64-encoded.
pub const BINARY_ARTIFACT_EXT: &str = "elmi";

// =============================================================================
// Deployment
// =============================================================================

/// Reads the deployment ordinal baked into generated identifiers. Release
/// tags look like `v123`, so a leading `v` is accepted; absent or
/// malformed values fall back to 0.
pub fn release_ordinal() -> u64 {
    release_ordinal_from(std::env::var("RELEASE_ORDINAL").ok())
}

fn release_ordinal_from(raw: Option<String>) -> u64 {
    raw.and_then(|value| value.trim_start_matches('v').parse().ok())
        .unwrap_or(0)
}

/// Sync job configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Base URL of the upstream package directory.
    pub upstream_base_url: String,
    /// Base URL archives are downloaded from.
    pub archive_base_url: String,
    /// Namespaces whose packages are additionally compiled during harvest.
    pub trusted_namespaces: Vec<String>,
    /// Path to the external compiler binary.
    pub compiler_path: PathBuf,
    /// Candidates processed concurrently within one batch.
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            archive_base_url: DEFAULT_ARCHIVE_BASE_URL.to_string(),
            trusted_namespaces: vec!["elm-lang".to_string()],
            compiler_path: PathBuf::from("elm-make"),
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}
