use std::fmt;

use crate::data::version::Version;

/// Relational operator on a constraint bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,
    LessEq,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Less => "<",
            Relation::LessEq => "<=",
        }
    }
}

/// A half-open compiler version range, e.g. `1.0.0 <= v < 2.0.0`.
///
/// Two constraints are equal when their normalized `[min, max)` ranges are
/// equal, regardless of how the bounds were spelled.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub lower: Version,
    pub lower_op: Relation,
    pub upper_op: Relation,
    pub upper: Version,
}

impl Constraint {
    pub fn new(lower: Version, lower_op: Relation, upper_op: Relation, upper: Version) -> Self {
        Self {
            lower,
            lower_op,
            upper_op,
            upper,
        }
    }

    /// Builds a `<= v <` constraint from two packed version integers, the
    /// form older metadata stores bounds in.
    pub fn from_ints(lower: u32, upper: u32) -> Self {
        Self::new(
            Version::from_int(lower),
            Relation::LessEq,
            Relation::Less,
            Version::from_int(upper),
        )
    }

    /// Inclusive minimum of the range.
    pub fn min_version(&self) -> Version {
        match self.lower_op {
            Relation::LessEq => self.lower,
            Relation::Less => self.lower.next_patch(),
        }
    }

    /// Exclusive maximum of the range.
    pub fn max_version(&self) -> Version {
        match self.upper_op {
            Relation::Less => self.upper,
            Relation::LessEq => self.upper.next_patch(),
        }
    }

    pub fn is_satisfied(&self, version: Version) -> bool {
        self.min_version() <= version && version < self.max_version()
    }

    /// Parses the canonical form. Lenient about whitespace and operator
    /// placement around the bounds, strict about the single `v` separator;
    /// a bound with no explicit operator reads as `<`.
    pub fn parse(input: &str) -> Option<Self> {
        let mut sides = input.split('v');
        let left = sides.next()?.trim();
        let right = sides.next()?.trim();
        if sides.next().is_some() {
            return None;
        }

        let lower_op = if left.ends_with("<=") {
            Relation::LessEq
        } else {
            Relation::Less
        };
        let upper_op = if right.starts_with("<=") {
            Relation::LessEq
        } else {
            Relation::Less
        };

        let lower = Version::parse(left.trim_end_matches(['<', '=', ' ']))?;
        let upper = Version::parse(right.trim_start_matches(['<', '=', ' ']))?;

        Some(Self::new(lower, lower_op, upper_op, upper))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} v {} {}",
            self.lower,
            self.lower_op.as_str(),
            self.upper_op.as_str(),
            self.upper
        )
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.min_version() == other.min_version() && self.max_version() == other.max_version()
    }
}

impl Eq for Constraint {}
