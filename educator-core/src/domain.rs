//! Domain entities for the educator.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{EducatorError, Result};

/// Default timeout applied to a generation call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A single generation call against the backend.
///
/// Built through [`GenerationRequest::builder`]; fields cannot change once
/// the request exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    model: String,
    timeout_seconds: u64,
    streaming: bool,
}

impl GenerationRequest {
    /// Start building a request for the given prompt and model.
    pub fn builder(
        prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            prompt: prompt.into(),
            model: model.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            streaming: false,
        }
    }

    /// Prompt text sent to the model.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Timeout in whole seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Whether the caller asked for incremental output.
    pub fn streaming(&self) -> bool {
        self.streaming
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    prompt: String,
    model: String,
    timeout_seconds: u64,
    streaming: bool,
}

impl GenerationRequestBuilder {
    /// Override the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the per-call timeout.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Request incremental output.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Validate and produce the request.
    pub fn build(self) -> Result<GenerationRequest> {
        let model = self.model.trim();
        if model.is_empty() {
            return Err(EducatorError::InvalidInput(
                "model name must not be empty".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(EducatorError::InvalidInput(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(GenerationRequest {
            prompt: self.prompt,
            model: model.to_string(),
            timeout_seconds: self.timeout_seconds,
            streaming: self.streaming,
        })
    }
}

/// One line of incremental output from the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationChunk {
    /// Text produced since the previous chunk.
    #[serde(default)]
    pub response: String,
    /// Whether the backend finished generating.
    #[serde(default)]
    pub done: bool,
}

/// A model installed on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelDescriptor {
    /// Model name, including tag.
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Last modification timestamp as reported by the backend.
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Optional metadata for a single model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelDetails {
    /// Model name the details were requested for.
    pub name: String,
    /// Model family, e.g. `llama`.
    pub family: Option<String>,
    /// Weight file format.
    pub format: Option<String>,
    /// Parameter count label, e.g. `7B`.
    pub parameter_size: Option<String>,
    /// Quantization level label.
    pub quantization_level: Option<String>,
    /// License text.
    pub license: Option<String>,
    /// Prompt template.
    pub template: Option<String>,
}

/// Structural facts extracted from source code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StructuralFacts {
    /// Detected language, or `unknown`.
    pub language: String,
    /// Import statements in source order.
    pub imports: Vec<String>,
    /// Function names in source order.
    pub functions: Vec<String>,
    /// Class names in source order.
    pub classes: Vec<String>,
    /// Structural complexity estimate.
    pub complexity: u32,
}

/// Quantitative metrics for a piece of source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisMetrics {
    /// Non-blank line count.
    pub line_count: u32,
    /// Comment line count.
    pub comment_count: u32,
    /// Comments per line, within 0.0..=1.0.
    pub comment_ratio: f64,
    /// Deepest nesting level.
    pub nesting_depth: u32,
    /// Cyclomatic complexity, at least 1.
    pub cyclomatic_complexity: u32,
    /// Potential problems in source order of detection.
    pub potential_issues: Vec<String>,
    /// Improvement suggestions.
    pub suggestions: Vec<String>,
}

impl AnalysisMetrics {
    /// Comment ratio for the given counts, clamped to 0.0..=1.0.
    pub fn ratio(comment_count: u32, line_count: u32) -> f64 {
        (f64::from(comment_count) / f64::from(line_count.max(1))).clamp(0.0, 1.0)
    }
}

/// Normalized analysis output returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    /// Structural facts.
    #[serde(flatten)]
    pub facts: StructuralFacts,
    /// Metrics.
    #[serde(flatten)]
    pub metrics: AnalysisMetrics,
    /// Quality score, 0-100.
    pub quality_score: u8,
    /// Generated commentary, when requested and available.
    pub ai_analysis: Option<String>,
    /// Path of the analyzed file.
    pub file_path: Option<String>,
    /// Base name of the analyzed file.
    pub file_name: Option<String>,
    /// Extra analyzer metadata.
    pub metadata: BTreeMap<String, String>,
}

/// Outcome of checking a quality score against a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualityVerdict {
    /// Score that was evaluated.
    pub score: u8,
    /// Minimum passing score.
    pub threshold: u8,
    /// Whether the score met the threshold.
    pub passed: bool,
    /// Issues explaining a failure; empty when passed.
    pub issues: Vec<String>,
    /// Suggestions for a failing score; empty when passed.
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let request = GenerationRequest::builder("hi", "codellama")
            .build()
            .expect("request");
        assert_eq!(request.prompt(), "hi");
        assert_eq!(request.model(), "codellama");
        assert_eq!(request.timeout_seconds(), DEFAULT_TIMEOUT_SECS);
        assert!(!request.streaming());
    }

    #[test]
    fn builder_rejects_empty_model_and_zero_timeout() {
        let err = GenerationRequest::builder("hi", "  ").build().unwrap_err();
        assert!(matches!(err, EducatorError::InvalidInput(_)));

        let err = GenerationRequest::builder("hi", "codellama")
            .timeout_seconds(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn ratio_is_bounded() {
        assert_eq!(AnalysisMetrics::ratio(0, 0), 0.0);
        assert_eq!(AnalysisMetrics::ratio(3, 0), 1.0);
        assert_eq!(AnalysisMetrics::ratio(1, 4), 0.25);
    }

    #[test]
    fn analysis_result_serializes_flat() {
        let result = AnalysisResult {
            facts: StructuralFacts {
                language: "python".to_string(),
                ..StructuralFacts::default()
            },
            metrics: AnalysisMetrics {
                line_count: 2,
                comment_count: 0,
                comment_ratio: 0.0,
                nesting_depth: 0,
                cyclomatic_complexity: 1,
                potential_issues: Vec::new(),
                suggestions: Vec::new(),
            },
            quality_score: 50,
            ai_analysis: None,
            file_path: None,
            file_name: None,
            metadata: BTreeMap::new(),
        };
        let value = serde_json::to_value(&result).expect("json");
        assert_eq!(value["language"], "python");
        assert_eq!(value["line_count"], 2);
        assert_eq!(value["quality_score"], 50);
        assert!(value["ai_analysis"].is_null());
    }
}
