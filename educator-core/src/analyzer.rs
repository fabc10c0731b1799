//! Structural analyzer capability and selection.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{AnalysisMetrics, StructuralFacts};
use crate::error::Result;
use crate::heuristic::{self, NEUTRAL_QUALITY_SCORE};

/// A full structural analyzer.
#[cfg_attr(test, mockall::automock)]
pub trait CodeAnalyzer: Send + Sync {
    /// Extract structural facts.
    fn parse(&self, code: &str) -> Result<StructuralFacts>;
    /// Compute quantitative metrics.
    fn analyze(&self, code: &str) -> Result<AnalysisMetrics>;
    /// Score the metrics; must stay within 0-100.
    fn quality_score(&self, metrics: &AnalysisMetrics) -> u8;
}

/// Whether the native analyzer is compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisCapability {
    /// True when native analysis is available.
    pub native_available: bool,
}

impl AnalysisCapability {
    /// Read the capability of the current build.
    pub fn detect() -> Self {
        Self {
            native_available: cfg!(feature = "native"),
        }
    }
}

/// Output of a single structural analysis pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralReport {
    /// Structural facts.
    pub facts: StructuralFacts,
    /// Metrics.
    pub metrics: AnalysisMetrics,
    /// Quality score, 0-100.
    pub quality_score: u8,
    /// Analyzer metadata; empty for heuristic analysis.
    pub metadata: BTreeMap<String, String>,
}

/// Analyzer chosen once at construction.
#[derive(Clone)]
pub enum StructuralAnalyzer {
    /// Full analysis through a native implementation.
    Native(Arc<dyn CodeAnalyzer>),
    /// Degraded heuristic guess.
    Heuristic,
}

impl std::fmt::Debug for StructuralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(_) => f.write_str("StructuralAnalyzer::Native"),
            Self::Heuristic => f.write_str("StructuralAnalyzer::Heuristic"),
        }
    }
}

impl StructuralAnalyzer {
    /// Pick the variant for `capability`; `native` is only called when available.
    pub fn select<F>(capability: AnalysisCapability, native: F) -> Self
    where
        F: FnOnce() -> Arc<dyn CodeAnalyzer>,
    {
        if capability.native_available {
            Self::Native(native())
        } else {
            Self::Heuristic
        }
    }

    /// Select the best analyzer compiled into this build.
    pub fn detect() -> Self {
        #[cfg(feature = "native")]
        {
            Self::select(AnalysisCapability::detect(), || {
                Arc::new(crate::native::RegexAnalyzer::new())
            })
        }
        #[cfg(not(feature = "native"))]
        {
            Self::Heuristic
        }
    }

    /// Capability this analyzer represents.
    pub fn capability(&self) -> AnalysisCapability {
        AnalysisCapability {
            native_available: matches!(self, Self::Native(_)),
        }
    }

    /// Run the analysis.
    pub fn run(&self, code: &str) -> Result<StructuralReport> {
        match self {
            Self::Native(analyzer) => {
                let facts = analyzer.parse(code)?;
                let mut metrics = analyzer.analyze(code)?;
                metrics.comment_ratio = metrics.comment_ratio.clamp(0.0, 1.0);
                metrics.cyclomatic_complexity = metrics.cyclomatic_complexity.max(1);
                let quality_score = analyzer.quality_score(&metrics).min(100);
                let metadata = structural_metadata(&facts);
                Ok(StructuralReport {
                    facts,
                    metrics,
                    quality_score,
                    metadata,
                })
            }
            Self::Heuristic => Ok(StructuralReport {
                facts: heuristic::guess(code),
                metrics: heuristic::degraded_metrics(code),
                quality_score: NEUTRAL_QUALITY_SCORE,
                metadata: BTreeMap::new(),
            }),
        }
    }

    /// Score metrics with this analyzer's policy.
    pub fn score(&self, metrics: &AnalysisMetrics) -> u8 {
        match self {
            Self::Native(analyzer) => analyzer.quality_score(metrics).min(100),
            Self::Heuristic => NEUTRAL_QUALITY_SCORE,
        }
    }
}

fn structural_metadata(facts: &StructuralFacts) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("language".to_string(), facts.language.clone()),
        ("function_count".to_string(), facts.functions.len().to_string()),
        ("class_count".to_string(), facts.classes.len().to_string()),
        ("import_count".to_string(), facts.imports.len().to_string()),
    ])
}

/// Default quality formula: 100 minus penalties, clamped to 0-100.
pub fn calculate_quality_score(metrics: &AnalysisMetrics) -> u8 {
    let mut score: i64 = 100;
    score -= cyclomatic_penalty(metrics.cyclomatic_complexity);
    score -= comment_penalty(metrics.comment_ratio);
    score -= nesting_penalty(metrics.nesting_depth);
    score -= metrics.potential_issues.len() as i64 * 3;

    score.clamp(0, 100) as u8
}

fn cyclomatic_penalty(complexity: u32) -> i64 {
    if complexity > 15 {
        20
    } else if complexity > 10 {
        10
    } else if complexity > 5 {
        5
    } else {
        0
    }
}

fn comment_penalty(ratio: f64) -> i64 {
    if ratio < 0.1 {
        10
    } else if ratio < 0.4 {
        5
    } else {
        0
    }
}

fn nesting_penalty(depth: u32) -> i64 {
    if depth > 5 {
        15
    } else if depth > 3 {
        8
    } else if depth > 1 {
        3
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EducatorError;

    fn metrics(cyclomatic: u32, ratio: f64, nesting: u32, issues: usize) -> AnalysisMetrics {
        AnalysisMetrics {
            line_count: 10,
            comment_count: 0,
            comment_ratio: ratio,
            nesting_depth: nesting,
            cyclomatic_complexity: cyclomatic,
            potential_issues: vec!["issue".to_string(); issues],
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn quality_score_applies_penalties() {
        assert_eq!(calculate_quality_score(&metrics(1, 0.5, 0, 0)), 100);
        assert_eq!(calculate_quality_score(&metrics(6, 0.2, 2, 1)), 100 - 5 - 5 - 3 - 3);
        assert_eq!(calculate_quality_score(&metrics(12, 0.0, 4, 0)), 100 - 10 - 10 - 8);
    }

    #[test]
    fn quality_score_is_clamped() {
        assert_eq!(calculate_quality_score(&metrics(40, 0.0, 9, 100)), 0);
    }

    #[test]
    fn heuristic_never_touches_native() {
        let analyzer = StructuralAnalyzer::select(
            AnalysisCapability {
                native_available: false,
            },
            || panic!("native analyzer must not be constructed"),
        );
        let report = analyzer.run("def main():\n    pass\n").expect("report");

        assert_eq!(report.facts.language, "python");
        assert_eq!(report.quality_score, NEUTRAL_QUALITY_SCORE);
        assert_eq!(report.metrics.cyclomatic_complexity, 1);
        assert!(report.metadata.is_empty());
        assert!(!analyzer.capability().native_available);
    }

    #[test]
    fn native_route_normalizes_metrics() {
        let mut mock = MockCodeAnalyzer::new();
        mock.expect_parse().times(1).returning(|_| {
            Ok(StructuralFacts {
                language: "cpp".to_string(),
                functions: vec!["main".to_string()],
                ..StructuralFacts::default()
            })
        });
        mock.expect_analyze().times(1).returning(|_| {
            let mut metrics = metrics(0, 1.7, 0, 0);
            metrics.comment_count = 17;
            Ok(metrics)
        });
        mock.expect_quality_score().returning(|_| 250);

        let analyzer = StructuralAnalyzer::select(
            AnalysisCapability {
                native_available: true,
            },
            || Arc::new(mock),
        );
        let report = analyzer.run("int main() {}").expect("report");

        assert_eq!(report.metrics.comment_ratio, 1.0);
        assert_eq!(report.metrics.cyclomatic_complexity, 1);
        assert_eq!(report.quality_score, 100);
        assert_eq!(report.metadata.get("function_count").map(String::as_str), Some("1"));
        assert_eq!(report.metadata.get("language").map(String::as_str), Some("cpp"));
    }

    #[test]
    fn native_rejection_propagates() {
        let mut mock = MockCodeAnalyzer::new();
        mock.expect_parse()
            .returning(|_| Err(EducatorError::AnalysisFailed("unsupported language".to_string())));
        mock.expect_analyze().never();

        let analyzer = StructuralAnalyzer::Native(Arc::new(mock));
        let err = analyzer.run("???").unwrap_err();

        assert!(matches!(err, EducatorError::AnalysisFailed(_)));
    }

    #[test]
    fn detect_matches_build_features() {
        assert_eq!(
            StructuralAnalyzer::detect().capability(),
            AnalysisCapability::detect()
        );
    }
}
