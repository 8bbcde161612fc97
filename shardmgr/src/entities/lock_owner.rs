use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies who holds the cooperative lock on a mapping, or that it is
/// unlocked. Two sentinel values carry protocol meaning (spec.md §4.E
/// "Lock protocol"): the zero id means unlocked, and the all-ones id is a
/// distinguished "force" owner that can override any other lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockOwnerId(Uuid);

impl LockOwnerId {
    pub const NONE: Self = Self(Uuid::nil());
    pub const FORCE: Self = Self(Uuid::from_bytes([0xFF; 16]));

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn is_locked(&self) -> bool {
        *self != Self::NONE
    }

    pub fn is_force(&self) -> bool {
        *self == Self::FORCE
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Whether `presented` is allowed to mutate a mapping currently owned
    /// by `self`: the same owner, or the force sentinel (spec.md §3
    /// invariant 7).
    pub fn permits(&self, presented: LockOwnerId) -> bool {
        !self.is_locked() || *self == presented || presented.is_force()
    }
}

impl Default for LockOwnerId {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unlocked_permits_anyone() {
        assert!(LockOwnerId::NONE.permits(LockOwnerId::generate()));
    }

    #[test]
    fn test_locked_requires_matching_owner() {
        let owner = LockOwnerId::generate();
        assert!(owner.permits(owner));
        assert!(!owner.permits(LockOwnerId::generate()));
    }

    #[test]
    fn test_force_always_permitted() {
        let owner = LockOwnerId::generate();
        assert!(owner.permits(LockOwnerId::FORCE));
    }
}
