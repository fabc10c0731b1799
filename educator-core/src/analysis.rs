//! Analysis orchestration: structural analysis plus optional model commentary.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analyzer::StructuralAnalyzer;
use crate::client::GenerationClient;
use crate::config::BackendConfig;
use crate::domain::{AnalysisMetrics, AnalysisResult};
use crate::error::{EducatorError, Result};
use crate::fs::{FileSystem, StdFileSystem};
use crate::prompts;

/// Languages the analysis pipeline recognises.
pub const SUPPORTED_LANGUAGES: [&str; 4] = ["python", "cpp", "c", "javascript"];

/// Capability summary of an [`AnalysisService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisStats {
    /// Whether the native analyzer is in use.
    pub core_module_available: bool,
    /// Recognised languages.
    pub supported_languages: Vec<String>,
    /// Feature availability keyed by feature name.
    pub features: BTreeMap<String, bool>,
}

/// Routes code through the selected analyzer and the generation client.
#[derive(Clone)]
pub struct AnalysisService {
    analyzer: StructuralAnalyzer,
    client: GenerationClient,
    config: BackendConfig,
    fs: Arc<dyn FileSystem>,
}

impl AnalysisService {
    /// Build a service with the analyzer compiled into this build.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = GenerationClient::new(&config)?;
        let analyzer = StructuralAnalyzer::detect();
        log::debug!("analysis service using {analyzer:?}");
        Ok(Self::with_parts(
            analyzer,
            client,
            Arc::new(StdFileSystem::new()),
            config,
        ))
    }

    /// Build a service over injected collaborators.
    pub fn with_parts(
        analyzer: StructuralAnalyzer,
        client: GenerationClient,
        fs: Arc<dyn FileSystem>,
        config: BackendConfig,
    ) -> Self {
        Self {
            analyzer,
            client,
            config,
            fs,
        }
    }

    /// Analyze source text, optionally asking the model for commentary.
    ///
    /// Commentary failures are logged and leave `ai_analysis` empty; only an
    /// analyzer rejection fails the call.
    pub async fn analyze(
        &self,
        code: &str,
        include_ai: bool,
        model: Option<&str>,
    ) -> Result<AnalysisResult> {
        let report = self.analyzer.run(code)?;
        let ai_analysis = if include_ai {
            self.ai_analysis(code, &report.facts.language, model).await
        } else {
            None
        };

        Ok(AnalysisResult {
            facts: report.facts,
            metrics: report.metrics,
            quality_score: report.quality_score,
            ai_analysis,
            file_path: None,
            file_name: None,
            metadata: report.metadata,
        })
    }

    /// Read and analyze a UTF-8 source file.
    pub async fn analyze_file(
        &self,
        path: &Path,
        include_ai: bool,
        model: Option<&str>,
    ) -> Result<AnalysisResult> {
        let bytes = self.fs.read_bytes(path)?;
        let code = String::from_utf8(bytes)
            .map_err(|err| EducatorError::Encoding(format!("{}: {err}", path.display())))?;

        let mut result = self.analyze(&code, include_ai, model).await?;
        result.file_path = Some(path.display().to_string());
        result.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(result)
    }

    /// Score metrics with the active analyzer's policy.
    pub fn compute_quality_score(&self, metrics: &AnalysisMetrics) -> u8 {
        self.analyzer.score(metrics)
    }

    /// Languages recognised regardless of analyzer.
    pub fn supported_languages(&self) -> Vec<String> {
        SUPPORTED_LANGUAGES.iter().map(|lang| lang.to_string()).collect()
    }

    /// Capability and feature summary.
    pub fn stats(&self) -> AnalysisStats {
        let native = self.analyzer.capability().native_available;
        AnalysisStats {
            core_module_available: native,
            supported_languages: self.supported_languages(),
            features: BTreeMap::from([
                ("detailed_analysis".to_string(), native),
                ("complexity_calculation".to_string(), native),
                ("quality_scoring".to_string(), native),
                ("ai_analysis".to_string(), true),
            ]),
        }
    }

    async fn ai_analysis(&self, code: &str, language: &str, model: Option<&str>) -> Option<String> {
        if !self.client.check_connection().await {
            log::warn!("model backend unavailable; skipping AI analysis");
            return None;
        }
        let prompt = prompts::analysis_prompt(code, language, self.config.reply_language.as_deref());
        let request = match self.config.request(prompt, model).build() {
            Ok(request) => request,
            Err(err) => {
                log::warn!("AI analysis skipped: {err}");
                return None;
            }
        };
        match self.client.generate_text(&request).await {
            Ok(text) => Some(text),
            Err(err) if err.is_backend() => {
                log::warn!("AI analysis failed: {err}");
                None
            }
            Err(err) => {
                log::error!("AI analysis request rejected locally: {err}");
                None
            }
        }
    }
}
