//! Upstream package directory: the source of truth being mirrored.

#[cfg(test)]
use mockall::automock;

use serde::Deserialize;
use tracing::warn;

use crate::data::package::PackageInfo;
use crate::data::version::Version;
use crate::registry::error::UpstreamError;

/// Remote directory of every published package and its releases.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait UpstreamDirectory: Send + Sync {
    /// Lists every release published upstream. The returned candidates
    /// carry no constraints yet; harvesting attaches them.
    async fn list_all_packages(&self) -> Result<Vec<PackageInfo>, UpstreamError>;

    /// Downloads the zip archive for one release.
    async fn fetch_archive(&self, info: &PackageInfo) -> Result<Vec<u8>, UpstreamError>;
}

/// Entry in the upstream `all-packages` listing.
#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    name: String,
    versions: Vec<String>,
}

/// HTTP implementation speaking the upstream directory's JSON API.
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    archive_base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: &str, archive_base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("package-mirror")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            archive_base_url: archive_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl UpstreamDirectory for HttpUpstream {
    async fn list_all_packages(&self) -> Result<Vec<PackageInfo>, UpstreamError> {
        let url = format!("{}/all-packages", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upstream directory returned status {}: {}", status, url);
            return Err(UpstreamError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let entries: Vec<DirectoryEntry> = response.json().await.map_err(|e| {
            warn!("Failed to parse upstream directory response: {}", e);
            UpstreamError::InvalidResponse(e.to_string())
        })?;

        let mut output = Vec::new();
        for entry in entries {
            let Some((namespace, name)) = entry.name.split_once('/') else {
                warn!("Skipping upstream entry with malformed name: {}", entry.name);
                continue;
            };
            for version in &entry.versions {
                // Releases with unparsable versions are skipped, not fatal.
                if let Some(version) = Version::parse(version) {
                    output.push(PackageInfo::new(namespace, name, version));
                }
            }
        }
        Ok(output)
    }

    async fn fetch_archive(&self, info: &PackageInfo) -> Result<Vec<u8>, UpstreamError> {
        let url = format!(
            "{}/{}/{}/archive/{}.zip",
            self.archive_base_url, info.namespace, info.name, info.version
        );
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Archive download returned status {}: {}", status, url);
            return Err(UpstreamError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
