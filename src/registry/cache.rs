//! Compatibility cache: which package versions work with which compiler.

use std::collections::HashMap;

use crate::config::KNOWN_COMPILER_VERSIONS;
use crate::data::package::{PackageInfo, PackageName};
use crate::data::version::Version;

/// Maps `(package name, compiler version)` to the ascending list of package
/// versions whose declared constraint admits that compiler.
///
/// Built wholesale from the searchable corpus and read-only afterwards; a
/// refresh builds a new cache and swaps it in, it never mutates this one.
#[derive(Debug, Default)]
pub struct CompatibilityCache {
    buckets: HashMap<PackageName, HashMap<Version, Vec<Version>>>,
}

impl CompatibilityCache {
    /// Builds the cache from the full searchable corpus. Releases that were
    /// never validated (no attached constraint) contribute nothing.
    pub fn build(infos: &[PackageInfo]) -> Self {
        let mut buckets: HashMap<PackageName, HashMap<Version, Vec<Version>>> = HashMap::new();
        for info in infos {
            let Some(constraint) = info.compiler_constraint else {
                continue;
            };
            let name = info.package_name();
            for &compiler in KNOWN_COMPILER_VERSIONS {
                if constraint.is_satisfied(compiler) {
                    buckets
                        .entry(name.clone())
                        .or_default()
                        .entry(compiler)
                        .or_default()
                        .push(info.version);
                }
            }
        }
        for versions in buckets
            .values_mut()
            .flat_map(|by_compiler| by_compiler.values_mut())
        {
            versions.sort_unstable();
        }
        Self { buckets }
    }

    /// Versions of `name` compatible with `compiler`, ascending. Unknown
    /// packages and compiler versions yield an empty list.
    pub fn versions_for(&self, name: &PackageName, compiler: Version) -> &[Version] {
        self.buckets
            .get(name)
            .and_then(|by_compiler| by_compiler.get(&compiler))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
