use serde::{Deserialize, Serialize};

/// The result taxonomy every stored operation returns (spec.md §6).
/// Numeric values match the 3-digit codes callers are expected to log
/// and branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResultCode {
    Success = 1,
    MissingParameters = 50,
    StoreVersionMismatch = 51,
    ShardPendingOperation = 52,
    UnexpectedStoreError = 53,
    ShardMapAlreadyExists = 101,
    ShardMapDoesNotExist = 102,
    ShardMapHasShards = 103,
    ShardExists = 201,
    ShardDoesNotExist = 202,
    ShardHasMappings = 203,
    ShardVersionMismatch = 204,
    ShardLocationAlreadyExists = 205,
    MappingDoesNotExist = 301,
    RangeAlreadyMapped = 302,
    PointAlreadyMapped = 303,
    MappingNotFoundForKey = 304,
    UnableToKillSessions = 305,
    MappingIsNotOffline = 306,
    MappingLockOwnerIdMismatch = 307,
    MappingAlreadyLocked = 308,
    MappingIsOffline = 309,
    SchemaInfoNameDoesNotExist = 401,
    SchemaInfoNameConflict = 402,
}

impl ResultCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Evicting the mapping cache entry responsible is the right response
    /// to exactly these four codes (spec.md §7).
    pub fn invalidates_cache(self) -> bool {
        matches!(
            self,
            Self::ShardMapDoesNotExist
                | Self::ShardDoesNotExist
                | Self::MappingDoesNotExist
                | Self::ShardVersionMismatch
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_codes_match_spec() {
        assert_eq!(ResultCode::Success.code(), 1);
        assert_eq!(ResultCode::MappingLockOwnerIdMismatch.code(), 307);
        assert_eq!(ResultCode::SchemaInfoNameConflict.code(), 402);
    }

    #[test]
    fn test_invalidates_cache_set() {
        assert!(ResultCode::ShardDoesNotExist.invalidates_cache());
        assert!(ResultCode::ShardVersionMismatch.invalidates_cache());
        assert!(!ResultCode::MappingLockOwnerIdMismatch.invalidates_cache());
        assert!(!ResultCode::Success.invalidates_cache());
    }
}
