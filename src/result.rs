use serde::Serialize;

use crate::point::MutationPoint;
use crate::test_finder::Test;

/// Outcome of one test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Runner-level failure: link error, crash, trap or timeout.
    Invalid,
    Failed,
    Passed,
}

impl ExecutionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ExecutionStatus::Invalid => "invalid",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Passed => "passed",
        }
    }
}

/// One test invocation: status plus wall-clock time around the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub time_ns: u64,
}

impl ExecutionResult {
    pub fn invalid(time_ns: u64) -> Self {
        Self {
            status: ExecutionStatus::Invalid,
            time_ns,
        }
    }
}

/// A mutant's execution result, owning the point that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct MutationResult {
    pub point: MutationPoint,
    pub result: ExecutionResult,
}

/// Everything observed for one test: its baseline run and one mutation
/// result per surviving (non-junk) point, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test: Test,
    pub baseline: ExecutionResult,
    pub mutants: Vec<MutationResult>,
}

/// Aggregate counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,

    /// Mutants detected by a test failure.
    pub killed: usize,

    /// Mutants the suite did not notice.
    pub survived: usize,

    /// Mutants that failed to compile or run.
    pub invalid: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Self::default();

        for test in results {
            for mutant in &test.mutants {
                summary.total += 1;
                match mutant.result.status {
                    ExecutionStatus::Failed => summary.killed += 1,
                    ExecutionStatus::Passed => summary.survived += 1,
                    ExecutionStatus::Invalid => summary.invalid += 1,
                }
            }
        }

        summary
    }

    /// Percentage of decided mutants that were killed. `None` when no
    /// mutant produced a verdict.
    pub fn score(&self) -> Option<f64> {
        let decided = self.killed + self.survived;
        if decided == 0 {
            return None;
        }
        Some(self.killed as f64 * 100.0 / decided as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_ignores_invalid_mutants() {
        let summary = RunSummary {
            total: 4,
            killed: 2,
            survived: 1,
            invalid: 1,
        };
        let score = summary.score().expect("decided mutants exist");
        assert!((score - 66.66).abs() < 0.01, "got {score}");
    }

    #[test]
    fn score_is_none_without_verdicts() {
        assert_eq!(RunSummary::default().score(), None);
    }
}
