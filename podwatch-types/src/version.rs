//! Registry document schema versions.

use core::fmt;

use crate::SCHEMA_VERSION;

/// The schema version a registry document declares in its `version` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// The only version this build reads.
    pub const CURRENT: Self = Self(SCHEMA_VERSION);

    /// The version a document targets. Documents without a `version` key
    /// are read as the current schema.
    pub fn declared(version: Option<u32>) -> Self {
        version.map_or(Self::CURRENT, Self)
    }

    /// Accept the current version, reject anything else.
    pub fn check(self) -> Result<Self, UnsupportedSchema> {
        if self == Self::CURRENT {
            Ok(self)
        } else {
            Err(UnsupportedSchema { found: self })
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A registry document written for a schema this build cannot read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedSchema {
    pub found: SchemaVersion,
}

impl UnsupportedSchema {
    pub fn supported(&self) -> SchemaVersion {
        SchemaVersion::CURRENT
    }
}

impl fmt::Display for UnsupportedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "registry schema {} is not supported (this build reads {})",
            self.found,
            self.supported()
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnsupportedSchema {}
