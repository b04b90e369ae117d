use std::fmt;

use crate::lib::workload::WorkloadSnapshot;

/// Default share of the per-pod request that may sit unused before a
/// workload is flagged
pub const DEFAULT_THRESHOLD_PERCENT: u32 = 10;

const BYTES_PER_MIB: i128 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Requests match usage closely enough
    Good,
    /// No live pods
    NeedRemove,
    /// Requests exceed usage by more than the threshold
    NeedUpdate,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Good => "Good",
            Action::NeedRemove => "Need remove",
            Action::NeedUpdate => "Need update",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub action: Action,
    pub note: Option<String>,
}

/// Right-sizing policy applied to every workload snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub threshold_percent: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
        }
    }
}

/// Per-pod amount that could be cut from a request
#[derive(Debug, Clone, Copy, PartialEq)]
struct Surplus {
    per_pod: i128,
    percent: f64,
}

impl Policy {
    pub fn new(threshold_percent: u32) -> Self {
        Self { threshold_percent }
    }

    /// Decide what to do with a workload.
    ///
    /// A workload without live pods should be removed. Otherwise CPU (in
    /// milli-units) and memory (in bytes) are checked independently; a
    /// dimension is over-provisioned when its per-pod surplus is positive and
    /// strictly above `threshold_percent` of the per-pod request. All
    /// divisions truncate.
    pub fn evaluate(&self, snapshot: &WorkloadSnapshot) -> Verdict {
        if snapshot.replicas == 0 {
            return Verdict {
                action: Action::NeedRemove,
                note: None,
            };
        }

        let mut notes = Vec::new();

        if let Some(cpu) = self.surplus(
            snapshot.requested.cpu.milli_value(),
            snapshot.observed.cpu.milli_value(),
            snapshot.replicas,
        ) {
            notes.push(format!(
                "Need reduce CPU {:.2}%({}m per pod)",
                cpu.percent, cpu.per_pod
            ));
        }

        if let Some(memory) = self.surplus(
            snapshot.requested.memory.value(),
            snapshot.observed.memory.value(),
            snapshot.replicas,
        ) {
            notes.push(format!(
                "Need reduce Memory {:.2}%({}Mi per pod)",
                memory.percent,
                memory.per_pod / BYTES_PER_MIB
            ));
        }

        if notes.is_empty() {
            Verdict {
                action: Action::Good,
                note: None,
            }
        } else {
            Verdict {
                action: Action::NeedUpdate,
                note: Some(notes.join("; ")),
            }
        }
    }

    fn surplus(&self, requested: u64, observed: u64, replicas: u32) -> Option<Surplus> {
        let requested = i128::from(requested);
        let observed = i128::from(observed);
        let replicas = i128::from(replicas);

        let diff = (requested - observed) / replicas;
        let threshold = i128::from(self.threshold_percent) * requested / replicas / 100;
        if diff <= 0 || diff <= threshold {
            return None;
        }

        Some(Surplus {
            per_pod: diff,
            percent: percent(diff, requested / replicas),
        })
    }
}

fn percent(part: i128, whole: i128) -> f64 {
    part as f64 / whole as f64 * 100.0
}
