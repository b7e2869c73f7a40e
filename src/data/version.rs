use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A three-part package or compiler version.
///
/// Versions pack into a single 30-bit integer,
/// `(major << 20) | (minor << 10) | patch`, so that integer comparison is
/// semantic-version comparison. Each field carries 10 bits of information;
/// packing a field larger than 1023 is outside the encoding's contract and
/// is not truncated here.
#[derive(Debug, Clone, Copy)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Packs into the ordered integer form.
    pub fn to_int(self) -> u32 {
        (self.major << 20) | (self.minor << 10) | self.patch
    }

    /// Inverse of [`Version::to_int`].
    pub fn from_int(value: u32) -> Self {
        Self::new(value >> 20, (value >> 10) & 0x3ff, value & 0x3ff)
    }

    /// `1.2.3` -> `1.2.4`
    pub fn next_patch(self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// `1.2.3` -> `2.0.0`
    pub fn next_major(self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// Parses exactly three dot-separated non-negative integers.
    /// Any other shape is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let major = parts[0].parse().ok()?;
        let minor = parts[1].parse().ok()?;
        let patch = parts[2].parse().ok()?;
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// Identity and ordering both go through the packed form.

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.to_int() == other.to_int()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_int().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_int().cmp(&other.to_int())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid version: {text}")))
    }
}
