/// Where a two-phase operation is in its do/undo lifecycle (spec.md §3
/// "Lifecycle", §4.E). Forward states are numbered from 0; undo states
/// start at 100 so an `OperationLogEntry::undo_start_state` byte
/// unambiguously says "resume in the undo chain" without overlapping the
/// forward range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum OperationState {
    Init = 0,
    DoGlobalPreLocal = 1,
    DoLocalSource = 2,
    DoLocalTarget = 3,
    DoGlobalPostLocal = 4,
    Succeeded = 5,

    UndoLocalTarget = 100,
    UndoLocalSource = 101,
    UndoGlobalPreLocal = 102,
    Failed = 103,
}

impl OperationState {
    pub fn is_undo(self) -> bool {
        (self as u8) >= (Self::UndoLocalTarget as u8)
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Init,
            1 => Self::DoGlobalPreLocal,
            2 => Self::DoLocalSource,
            3 => Self::DoLocalTarget,
            4 => Self::DoGlobalPostLocal,
            5 => Self::Succeeded,
            100 => Self::UndoLocalTarget,
            101 => Self::UndoLocalSource,
            102 => Self::UndoGlobalPreLocal,
            103 => Self::Failed,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_undo_states_start_at_100() {
        assert!(!OperationState::DoGlobalPostLocal.is_undo());
        assert!(OperationState::UndoLocalTarget.is_undo());
    }

    #[test]
    fn test_round_trips_through_code() {
        for state in [
            OperationState::Init,
            OperationState::DoGlobalPreLocal,
            OperationState::DoLocalSource,
            OperationState::DoLocalTarget,
            OperationState::DoGlobalPostLocal,
            OperationState::Succeeded,
            OperationState::UndoLocalTarget,
            OperationState::UndoLocalSource,
            OperationState::UndoGlobalPreLocal,
            OperationState::Failed,
        ] {
            assert_eq!(OperationState::from_code(state as u8), Some(state));
        }
    }
}
