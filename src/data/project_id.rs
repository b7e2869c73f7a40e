use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Digit alphabet shared by both identifier encodings. The order is
/// load-bearing: identifiers issued years ago decode against exactly this
/// string, so it must never change.
const ALPHABET: &str = "23456789bcdfghjkmnpqrstvwxyzBCDFGHJKLMNPQRSTVWXYZ";

const BASE: u64 = ALPHABET.len() as u64;

/// Marker appended to every identifier minted under the current scheme.
const V1_SUFFIX: &str = "a1";

fn digit_value(c: char) -> Option<u64> {
    // The alphabet is ASCII, so the byte offset is the digit value.
    ALPHABET.find(c).map(|index| index as u64)
}

/// Which textual scheme a [`ProjectId`] was read from.
///
/// `V0` survives only so identifiers minted by the previous scheme keep
/// decoding; new identifiers are always written as `V1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    V0,
    V1,
}

/// Sortable, collision-resistant project identifier.
///
/// Identity is the numeric value alone; the encoding records which textual
/// scheme the id arrived in and does not affect equality or hashing.
#[derive(Debug, Clone, Copy)]
pub struct ProjectId {
    value: u64,
    encoding: Encoding,
}

impl ProjectId {
    pub fn new(value: u64, encoding: Encoding) -> Self {
        Self { value, encoding }
    }

    pub fn value(self) -> u64 {
        self.value
    }

    pub fn encoding(self) -> Encoding {
        self.encoding
    }

    /// Parses either textual scheme.
    ///
    /// Dispatch order matters: a string of plain decimal digits is a raw
    /// numeric value under the current scheme, an `a1` suffix marks the
    /// current base-alphabet form, anything else is read as the legacy
    /// form. Characters outside the alphabet reject the input.
    pub fn parse(input: &str) -> Option<Self> {
        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            return input.parse().ok().map(|value| Self::new(value, Encoding::V1));
        }
        match input.strip_suffix(V1_SUFFIX) {
            Some(digits) => Self::decode_v1(digits),
            None => Self::decode_v0(input),
        }
    }

    fn decode_v1(digits: &str) -> Option<Self> {
        let mut value: u64 = 0;
        for c in digits.chars() {
            value = value * BASE + digit_value(c)?;
        }
        Some(Self::new(value, Encoding::V1))
    }

    // The legacy scheme stored digits off by one from the alphabet index.
    fn decode_v0(digits: &str) -> Option<Self> {
        let mut value: u64 = 0;
        for c in digits.chars() {
            value = value * BASE + digit_value(c)? + 1;
        }
        Some(Self::new(value, Encoding::V0))
    }
}

impl fmt::Display for ProjectId {
    /// Always writes the current scheme, whatever the id was parsed from.
    /// A zero value has no digits and renders as the bare suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = Vec::new();
        let mut tracker = self.value;
        while tracker > 0 {
            digits.push(ALPHABET.as_bytes()[(tracker % BASE) as usize] as char);
            tracker /= BASE;
        }
        for c in digits.iter().rev() {
            write!(f, "{c}")?;
        }
        write!(f, "{V1_SUFFIX}")
    }
}

impl PartialEq for ProjectId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for ProjectId {}

impl Hash for ProjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Serialize for ProjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ProjectId::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid project id: {text}")))
    }
}

/// Process-scoped identifier mint in the snowflake family.
///
/// Bit layout: `(millis since the generator was built) << 23 |
/// release_ordinal << 10 | sequence`. The sequence wraps at 1024, so more
/// than 1024 ids minted by one process within a single millisecond can
/// collide; that bound is accepted rather than guarded against.
#[derive(Debug)]
pub struct ProjectIdGenerator {
    epoch_ms: u64,
    release_ordinal: u64,
    counter: AtomicU64,
}

impl ProjectIdGenerator {
    /// Captures the current wall clock as the generator epoch.
    pub fn new(release_ordinal: u64) -> Self {
        Self {
            epoch_ms: now_ms(),
            release_ordinal,
            counter: AtomicU64::new(0),
        }
    }

    pub fn generate(&self) -> ProjectId {
        let sequence = (self.counter.fetch_add(1, Ordering::Relaxed) + 1) % 1024;
        let elapsed = now_ms().saturating_sub(self.epoch_ms);
        let value = (elapsed << 23) | (self.release_ordinal << 10) | sequence;
        ProjectId::new(value, Encoding::V1)
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
