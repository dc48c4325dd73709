use serde::Serialize;

use crate::point::MutationPoint;
use crate::result::{RunSummary, TestResult};

/// Render test results as indented text, one entry per test.
pub fn render_test_results(results: &[TestResult]) -> Vec<String> {
    let mut out = Vec::new();

    for result in results {
        out.push(format!("test: {}", result.test.name));
        out.push(format!(
            "  baseline: {{status: {}, time_ns: {}}}",
            result.baseline.status.label(),
            result.baseline.time_ns
        ));

        if result.mutants.is_empty() {
            out.push("  mutants: []".to_string());
            continue;
        }

        out.push("  mutants:".to_string());
        for mutant in &result.mutants {
            out.push(format!("    - operator: {}", mutant.point.operator));
            out.push(format!("      location: {}", location_label(&mutant.point)));
            out.push(format!(
                "      result: {{status: {}, time_ns: {}}}",
                mutant.result.status.label(),
                mutant.result.time_ns
            ));
        }
    }

    out
}

/// Render the aggregate counts and the mutation score.
pub fn render_summary(summary: &RunSummary) -> Vec<String> {
    let score = match summary.score() {
        Some(score) => format!("{score:.1}%"),
        None => "-".to_string(),
    };

    vec![
        "--- mutation run summary ---".to_string(),
        format!("mutants total:    {}", summary.total),
        format!("mutants killed:   {}", summary.killed),
        format!("mutants survived: {}", summary.survived),
        format!("mutants invalid:  {}", summary.invalid),
        format!("mutation score:   {score}"),
    ]
}

fn location_label(point: &MutationPoint) -> String {
    match &point.location {
        Some(location) => format!(
            "{{path: {}, line: {}, column: {}}}",
            location.path.display(),
            location.line,
            location.column
        ),
        None => "null".to_string(),
    }
}

/// Machine-readable report for a whole run. In `--json` mode this is
/// printed to stdout as pretty JSON.
#[derive(Debug, Serialize)]
pub struct MutationRunReport {
    /// Tool name, stable across versions.
    pub tool: &'static str,

    /// Current crate version.
    pub version: &'static str,

    pub summary: RunSummary,
    pub results: Vec<TestResult>,
}

impl MutationRunReport {
    pub fn new(results: Vec<TestResult>) -> Self {
        Self {
            tool: "mutir",
            version: env!("CARGO_PKG_VERSION"),
            summary: RunSummary::from_results(&results),
            results,
        }
    }
}
