use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::data::constraint::Constraint;
use crate::data::version::Version;

/// Owning namespace plus package name, written `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName {
    pub namespace: String,
    pub name: String,
}

impl PackageName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses `namespace/name`; any other shape is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let (namespace, name) = input.split_once('/')?;
        if name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A concrete release of a package, the unit search results are returned in.
///
/// The wire form is a two-element array, `["namespace/name", "version"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: PackageName,
    pub version: Version,
}

impl Package {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self { name, version }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl Serialize for Package {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.name.to_string(), self.version).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Package {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (name, version) = <(String, Version)>::deserialize(deserializer)?;
        let name = PackageName::parse(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid package name: {name}")))?;
        Ok(Package::new(name, version))
    }
}

/// One upstream release, plus the compiler range it declares once a harvest
/// pass has validated it.
///
/// Identity, equality and hashing cover the namespace/name/version triple
/// only; the constraint is derived state attached after validation.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub namespace: String,
    pub name: String,
    pub version: Version,
    pub compiler_constraint: Option<Constraint>,
}

impl PackageInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
            compiler_constraint: None,
        }
    }

    pub fn package_name(&self) -> PackageName {
        PackageName::new(self.namespace.clone(), self.name.clone())
    }

    pub fn to_package(&self) -> Package {
        Package::new(self.package_name(), self.version)
    }

    /// `package-artifacts/{namespace}/{name}/{version}/manifest.json`
    pub fn manifest_key(&self) -> String {
        format!(
            "package-artifacts/{}/{}/{}/manifest.json",
            self.namespace, self.name, self.version
        )
    }

    /// `package-artifacts/{namespace}/{name}/{version}/source.json`
    pub fn source_key(&self) -> String {
        format!(
            "package-artifacts/{}/{}/{}/source.json",
            self.namespace, self.name, self.version
        )
    }

    /// `package-artifacts/{namespace}/{name}/{version}/artifacts/{compiler}.json`
    pub fn artifacts_key(&self, compiler: Version) -> String {
        format!(
            "package-artifacts/{}/{}/{}/artifacts/{}.json",
            self.namespace, self.name, self.version, compiler
        )
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.namespace, self.name, self.version)
    }
}

impl PartialEq for PackageInfo {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.version == other.version
    }
}

impl Eq for PackageInfo {}

impl Hash for PackageInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
        self.version.hash(state);
    }
}

/// Stored JSON shape. Older records carry the constraint as a packed
/// integer pair instead of text; both decode, only text is written.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackageInfo {
    namespace: String,
    name: String,
    version: Version,
    #[serde(default)]
    compiler_constraint: Option<String>,
    #[serde(default, skip_serializing)]
    min_compiler_version: Option<u32>,
    #[serde(default, skip_serializing)]
    max_compiler_version: Option<u32>,
}

impl Serialize for PackageInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawPackageInfo {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            version: self.version,
            compiler_constraint: self.compiler_constraint.map(|c| c.to_string()),
            min_compiler_version: None,
            max_compiler_version: None,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPackageInfo::deserialize(deserializer)?;
        let compiler_constraint = match (raw.min_compiler_version, raw.max_compiler_version) {
            (Some(min), Some(max)) => Some(Constraint::from_ints(min, max)),
            // Unparsable constraint text degrades to "never validated"
            // rather than rejecting the whole record.
            _ => raw
                .compiler_constraint
                .as_deref()
                .and_then(Constraint::parse),
        };
        Ok(PackageInfo {
            namespace: raw.namespace,
            name: raw.name,
            version: raw.version,
            compiler_constraint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("elm-lang/core", Some(("elm-lang", "core")))]
    #[case("solo", None)]
    #[case("a/b/c", None)]
    fn package_name_parses_exactly_one_slash(
        #[case] input: &str,
        #[case] expected: Option<(&str, &str)>,
    ) {
        let expected = expected.map(|(namespace, name)| PackageName::new(namespace, name));
        assert_eq!(PackageName::parse(input), expected);
    }

    #[test]
    fn package_serializes_as_a_name_version_pair() {
        let package = Package::new(
            PackageName::new("elm-lang", "core"),
            Version::new(5, 1, 1),
        );
        let json = serde_json::to_value(&package).unwrap();
        assert_eq!(json, json!(["elm-lang/core", "5.1.1"]));

        let back: Package = serde_json::from_value(json).unwrap();
        assert_eq!(back, package);
    }

    #[test]
    fn identity_ignores_the_attached_constraint() {
        let plain = PackageInfo::new("elm-lang", "core", Version::new(5, 0, 0));
        let mut validated = plain.clone();
        validated.compiler_constraint = Constraint::parse("0.17.0 <= v <= 0.18.0");

        assert_eq!(plain, validated);

        let mut set = std::collections::HashSet::new();
        set.insert(plain);
        assert!(set.contains(&validated));
    }

    #[test]
    fn storage_keys_embed_the_release_triple() {
        let info = PackageInfo::new("elm-lang", "core", Version::new(5, 0, 0));
        assert_eq!(
            info.manifest_key(),
            "package-artifacts/elm-lang/core/5.0.0/manifest.json"
        );
        assert_eq!(
            info.source_key(),
            "package-artifacts/elm-lang/core/5.0.0/source.json"
        );
        assert_eq!(
            info.artifacts_key(Version::new(0, 18, 0)),
            "package-artifacts/elm-lang/core/5.0.0/artifacts/0.18.0.json"
        );
    }

    #[test]
    fn round_trips_through_json_with_constraint() {
        let mut info = PackageInfo::new("elm-lang", "core", Version::new(5, 0, 0));
        info.compiler_constraint = Constraint::parse("0.17.0 <= v <= 0.18.0");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            json!({
                "namespace": "elm-lang",
                "name": "core",
                "version": "5.0.0",
                "compilerConstraint": "0.17.0 <= v <= 0.18.0",
            })
        );

        let back: PackageInfo = serde_json::from_value(json).unwrap();
        assert_eq!(
            back.compiler_constraint,
            Constraint::parse("0.17.0 <= v <= 0.18.0")
        );
    }

    #[test]
    fn never_validated_records_have_a_null_constraint() {
        let info = PackageInfo::new("user", "widget", Version::new(1, 0, 0));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["compilerConstraint"], serde_json::Value::Null);

        let back: PackageInfo = serde_json::from_value(json).unwrap();
        assert!(back.compiler_constraint.is_none());
    }

    #[test]
    fn decodes_the_legacy_packed_integer_pair() {
        let back: PackageInfo = serde_json::from_value(json!({
            "namespace": "user",
            "name": "widget",
            "version": "1.0.0",
            "compilerConstraint": null,
            "minCompilerVersion": 0x12 << 20,
            "maxCompilerVersion": 0x13 << 20,
        }))
        .unwrap();

        let constraint = back.compiler_constraint.unwrap();
        assert_eq!(constraint.min_version(), Version::new(0x12, 0, 0));
        assert_eq!(constraint.max_version(), Version::new(0x13, 0, 0));
    }

    #[test]
    fn unparsable_constraint_text_degrades_to_none() {
        let back: PackageInfo = serde_json::from_value(json!({
            "namespace": "user",
            "name": "widget",
            "version": "1.0.0",
            "compilerConstraint": "not a range",
        }))
        .unwrap();
        assert!(back.compiler_constraint.is_none());
    }
}
