use std::collections::{BTreeSet, HashMap};

/// PIDs that left and entered the observed set since the last pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PidDifferences {
    /// Tracked but no longer observed.
    pub vanished: BTreeSet<u32>,
    /// Observed but not yet tracked.
    pub arrived: BTreeSet<u32>,
}

#[cfg(test)]
impl PidDifferences {
    pub fn is_empty(&self) -> bool {
        self.vanished.is_empty() && self.arrived.is_empty()
    }
}

/// Computes `tracked \ observed` and `observed \ tracked` on the map keys.
pub fn find_pid_differences<A, B>(
    tracked: &HashMap<u32, A>,
    observed: &HashMap<u32, B>,
) -> PidDifferences {
    PidDifferences {
        vanished: tracked
            .keys()
            .filter(|pid| !observed.contains_key(pid))
            .copied()
            .collect(),
        arrived: observed
            .keys()
            .filter(|pid| !tracked.contains_key(pid))
            .copied()
            .collect(),
    }
}
