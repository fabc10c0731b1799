//! Pass/fail decision against a minimum quality score.

use crate::domain::{AnalysisResult, QualityVerdict};

const FALLBACK_SUGGESTION: &str =
    "Reduce complexity and nesting, and document the code to raise its score.";

/// Compare `score` with `threshold`.
///
/// A failing verdict always explains itself with at least one issue and one
/// suggestion; a passing verdict carries neither.
pub fn evaluate(
    score: u8,
    threshold: u8,
    issues: &[String],
    suggestions: &[String],
) -> QualityVerdict {
    let passed = score >= threshold;
    if passed {
        return QualityVerdict {
            score,
            threshold,
            passed,
            issues: Vec::new(),
            suggestions: Vec::new(),
        };
    }

    let mut failing_issues =
        vec![format!("Quality score {score} is below the threshold {threshold}.")];
    failing_issues.extend(issues.iter().cloned());
    let mut failing_suggestions = suggestions.to_vec();
    if failing_suggestions.is_empty() {
        failing_suggestions.push(FALLBACK_SUGGESTION.to_string());
    }

    QualityVerdict {
        score,
        threshold,
        passed,
        issues: failing_issues,
        suggestions: failing_suggestions,
    }
}

/// [`evaluate`] an analysis result.
pub fn evaluate_result(result: &AnalysisResult, threshold: u8) -> QualityVerdict {
    evaluate(
        result.quality_score,
        threshold,
        &result.metrics.potential_issues,
        &result.metrics.suggestions,
    )
}
