//! Value types shared across the mirror.
//!
//! # Modules
//!
//! - [`version`]: three-part versions with a packed integer form
//! - [`constraint`]: half-open compiler version ranges
//! - [`package`]: package names, releases and harvested metadata
//! - [`project_id`]: dual-encoding project identifiers and their generator
//! - [`revision`]: stored editor revisions

pub mod constraint;
pub mod package;
pub mod project_id;
pub mod revision;
pub mod version;
