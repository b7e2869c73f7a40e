use serde::{Deserialize, Serialize};

use crate::data::package::Package;
use crate::data::project_id::ProjectId;
use crate::data::version::Version;

/// Address of a stored revision: which project, and which revision of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionId {
    pub project_id: ProjectId,
    pub revision_number: u32,
}

impl RevisionId {
    pub fn new(project_id: ProjectId, revision_number: u32) -> Self {
        Self {
            project_id,
            revision_number,
        }
    }

    /// `revisions/{projectId}/{revisionNumber}.json`
    pub fn storage_key(&self) -> String {
        format!(
            "revisions/{}/{}.json",
            self.project_id, self.revision_number
        )
    }
}

/// A stored editor revision.
///
/// `owned` is derived from the caller's session at read time and is never
/// trusted from storage. Records predating the compiler version field
/// default to the release that was current when they were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub title: String,
    pub description: String,
    pub source_code: String,
    pub html_code: String,
    pub packages: Vec<Package>,
    pub id: Option<RevisionId>,
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub snapshot: serde_json::Value,
    #[serde(default = "default_compiler_version")]
    pub compiler_version: Version,
    #[serde(default)]
    pub accepted_terms: Option<u32>,
}

fn default_compiler_version() -> Version {
    Version::new(0, 18, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::package::PackageName;
    use crate::data::project_id::Encoding;
    use serde_json::json;

    #[test]
    fn storage_key_uses_the_textual_project_id() {
        let id = RevisionId::new(ProjectId::new(0, Encoding::V1), 3);
        assert_eq!(id.storage_key(), "revisions/a1/3.json");
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let revision: Revision = serde_json::from_value(json!({
            "title": "Counter",
            "description": "A counter",
            "sourceCode": "main = text \"hi\"",
            "htmlCode": "<html></html>",
            "packages": [["elm-lang/core", "5.0.0"]],
            "id": {"projectId": "a1", "revisionNumber": 0},
        }))
        .unwrap();

        assert!(!revision.owned);
        assert_eq!(revision.compiler_version, Version::new(0, 18, 0));
        assert_eq!(revision.accepted_terms, None);
        assert_eq!(
            revision.packages,
            vec![Package::new(
                PackageName::new("elm-lang", "core"),
                Version::new(5, 0, 0)
            )]
        );
    }

    #[test]
    fn round_trips_through_json() {
        let revision = Revision {
            title: "Demo".to_string(),
            description: "".to_string(),
            source_code: "main = 1".to_string(),
            html_code: "<body></body>".to_string(),
            packages: vec![],
            id: Some(RevisionId::new(ProjectId::new(99, Encoding::V1), 1)),
            owned: true,
            snapshot: json!({"state": 1}),
            compiler_version: Version::new(0, 17, 1),
            accepted_terms: Some(1),
        };

        let json = serde_json::to_value(&revision).unwrap();
        let back: Revision = serde_json::from_value(json).unwrap();
        assert_eq!(back, revision);
    }
}
