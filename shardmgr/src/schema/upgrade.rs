use shardmgr_config::StoreVersion;

/// One forward step of the schema upgrade pipeline: bring a store from
/// `from` to `to`. Never skips a version — each step names the exact
/// version it leaves the store in, so a partial client version (one
/// that doesn't cover every step) still ends on a well-defined version
/// rather than an interpolated one (spec.md §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeStep {
    pub from: StoreVersion,
    pub to: StoreVersion,
}

const fn step(from_major: u16, from_minor: u16, to_major: u16, to_minor: u16) -> UpgradeStep {
    UpgradeStep {
        from: StoreVersion::new(from_major, from_minor),
        to: StoreVersion::new(to_major, to_minor),
    }
}

/// Ordered upgrade steps for the GSM. The 1.2 step is the one spec.md §9
/// calls out: it introduces `LockOrUnlockShardMappingsGlobal` operation
/// codes `2` (all mappings in a shard map) and `3` (all mappings for one
/// owner) on top of the original single-mapping lock/unlock.
pub const GLOBAL_UPGRADE_STEPS: &[UpgradeStep] = &[
    step(0, 0, 1, 0),
    step(1, 0, 1, 1),
    step(1, 1, 1, 2),
    step(1, 2, 1, 3),
];

/// Ordered upgrade steps for an LSM. Local and global schemas version
/// independently (spec.md §4.C); the LSM has no lock-scope concept so it
/// has one fewer step than the GSM.
pub const LOCAL_UPGRADE_STEPS: &[UpgradeStep] = &[step(0, 0, 1, 0), step(1, 0, 1, 1), step(1, 1, 1, 2)];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_steps_are_contiguous() {
        for window in GLOBAL_UPGRADE_STEPS.windows(2) {
            assert_eq!(window[0].to, window[1].from);
        }
    }
}
