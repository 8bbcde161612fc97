use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A store schema version, `(major, minor)`.
///
/// The major version gates compatibility: a client refuses to talk to a
/// store whose major version is newer than its own. The minor version is
/// informational and used only to pick which upgrade steps still need to
/// run (Component C).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct StoreVersion {
    pub major: u16,
    pub minor: u16,
}

impl StoreVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Zero version; a freshly-provisioned store reports this before any
    /// upgrade script has run.
    pub const ZERO: Self = Self::new(0, 0);
}

impl Display for StoreVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Client version for the global store (GSM).
///
/// Bump this when adding a global upgrade step to `shardmgr`'s schema
/// module.
pub const GLOBAL_CLIENT_VERSION: StoreVersion = StoreVersion::new(1, 3);

/// Client version for a local store (LSM). Local and global schemas
/// version independently (spec.md §4.C).
pub const LOCAL_CLIENT_VERSION: StoreVersion = StoreVersion::new(1, 2);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(StoreVersion::new(1, 0) > StoreVersion::new(0, 9));
        assert!(StoreVersion::new(1, 2) < StoreVersion::new(1, 3));
        assert_eq!(StoreVersion::ZERO, StoreVersion::new(0, 0));
    }

    #[test]
    fn test_display() {
        assert_eq!(StoreVersion::new(1, 3).to_string(), "1.3");
    }
}
