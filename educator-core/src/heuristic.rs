//! Best-effort structural guess used when the native analyzer is absent.

use crate::domain::{AnalysisMetrics, StructuralFacts};

/// Score reported for degraded analyses; not derived from the code.
pub const NEUTRAL_QUALITY_SCORE: u8 = 50;

const DEGRADED_ISSUE: &str =
    "Native analyzer unavailable; only a basic heuristic analysis was performed.";
const DEGRADED_SUGGESTION: &str =
    "Build with the `native` feature enabled for a detailed analysis.";

/// Guess the language and a size-based complexity. Never fails.
pub fn guess(code: &str) -> StructuralFacts {
    StructuralFacts {
        language: detect_language(code).to_string(),
        imports: Vec::new(),
        functions: Vec::new(),
        classes: Vec::new(),
        complexity: (code.chars().count() / 100) as u32,
    }
}

/// Fixed metrics reported alongside [`guess`].
pub fn degraded_metrics(code: &str) -> AnalysisMetrics {
    AnalysisMetrics {
        line_count: code.lines().filter(|line| !line.trim().is_empty()).count() as u32,
        comment_count: 0,
        comment_ratio: 0.0,
        nesting_depth: 0,
        cyclomatic_complexity: 1,
        potential_issues: vec![DEGRADED_ISSUE.to_string()],
        suggestions: vec![DEGRADED_SUGGESTION.to_string()],
    }
}

/// Ordered substring rules; the first match wins.
pub fn detect_language(code: &str) -> &'static str {
    if code.contains("def ") || code.contains("import ") {
        "python"
    } else if code.contains("#include") || code.contains("std::") {
        "cpp"
    } else if code.contains("function ") || code.contains("const ") || code.contains("=>") {
        "javascript"
    } else if code.contains("printf") && code.contains("#include") {
        // Shadowed by the cpp rule; kept so the rule order stays explicit.
        "c"
    } else {
        "unknown"
    }
}
