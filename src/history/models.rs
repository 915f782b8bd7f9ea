use serde::{Deserialize, Serialize};

/// What one synchronizer tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// New entries stored per log, in sync order.
    pub added: Vec<(String, usize)>,
    /// Length of the rebuilt combined log, when both sources are active.
    pub combined: Option<usize>,
}

impl TickReport {
    pub fn added_to(&self, log: &str) -> usize {
        self.added
            .iter()
            .find(|(name, _)| name == log)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total_added(&self) -> usize {
        self.added.iter().map(|(_, count)| count).sum()
    }
}
