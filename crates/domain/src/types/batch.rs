//! Batch items and aggregated batch results

use serde::{Deserialize, Serialize};

use super::result::ErrorKind;

/// One input of a batch, addressed by its position in the input list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem<T> {
    pub index: usize,
    pub payload: T,
}

impl<T> BatchItem<T> {
    pub const fn new(index: usize, payload: T) -> Self {
        Self { index, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSuccess {
    pub index: usize,
    pub outcome: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// Overall judgment of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    AllSucceeded,
    NoneSucceeded,
    Mixed,
}

/// Per-item outcomes of one batch call, both lists in input order.
///
/// Every input index appears exactly once across the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    /// Tri-state judgment. An empty batch has nothing that failed and
    /// counts as `AllSucceeded`.
    pub fn status(&self) -> BatchStatus {
        match (self.succeeded.is_empty(), self.failed.is_empty()) {
            (_, true) => BatchStatus::AllSucceeded,
            (true, false) => BatchStatus::NoneSucceeded,
            (false, false) => BatchStatus::Mixed,
        }
    }

    pub fn failure_for(&self, index: usize) -> Option<&BatchFailure> {
        self.failed.iter().find(|f| f.index == index)
    }

    pub fn success_for(&self, index: usize) -> Option<&BatchSuccess> {
        self.succeeded.iter().find(|s| s.index == index)
    }

    /// One-line human summary, e.g. `Added 3 items to stock. 1 failed.`
    pub fn summary(&self, action: &str, target: &str) -> String {
        let count = self.succeeded.len();
        let noun = if count == 1 { "item" } else { "items" };
        let mut line = format!("{action} {count} {noun}");
        if !target.is_empty() {
            line.push(' ');
            line.push_str(target);
        }
        line.push('.');
        if !self.failed.is_empty() {
            line.push_str(&format!(" {} failed.", self.failed.len()));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success(index: usize) -> BatchSuccess {
        BatchSuccess { index, outcome: json!({}) }
    }

    fn failure(index: usize) -> BatchFailure {
        BatchFailure { index, kind: ErrorKind::Validation, message: "bad".to_string() }
    }

    #[test]
    fn test_status_tri_state() {
        let all = BatchResult { succeeded: vec![success(0), success(1)], failed: vec![] };
        assert_eq!(all.status(), BatchStatus::AllSucceeded);

        let none = BatchResult { succeeded: vec![], failed: vec![failure(0)] };
        assert_eq!(none.status(), BatchStatus::NoneSucceeded);

        let mixed = BatchResult { succeeded: vec![success(0)], failed: vec![failure(1)] };
        assert_eq!(mixed.status(), BatchStatus::Mixed);
    }

    #[test]
    fn test_empty_batch_is_all_succeeded() {
        let empty = BatchResult::default();
        assert!(empty.is_empty());
        assert_eq!(empty.status(), BatchStatus::AllSucceeded);
    }

    #[test]
    fn test_summary_line() {
        let mixed = BatchResult {
            succeeded: vec![success(0), success(2), success(3)],
            failed: vec![failure(1)],
        };
        assert_eq!(mixed.summary("Added", "to stock"), "Added 3 items to stock. 1 failed.");

        let single = BatchResult { succeeded: vec![success(0)], failed: vec![] };
        assert_eq!(single.summary("Consumed", ""), "Consumed 1 item.");
    }

    #[test]
    fn test_lookup_by_index() {
        let result = BatchResult { succeeded: vec![success(0)], failed: vec![failure(1)] };
        assert!(result.success_for(0).is_some());
        assert_eq!(result.failure_for(1).map(|f| f.kind), Some(ErrorKind::Validation));
        assert!(result.failure_for(0).is_none());
        assert_eq!(result.len(), 2);
    }
}
