#![deny(missing_docs)]
//! Code Educator core library.
//!
//! Structural code analysis, quality gating and a resilient client for a
//! local model backend, shared by the `educator` CLI and the HTTP server.

pub mod analysis;
pub mod analyzer;
pub mod assistant;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs;
pub mod gate;
pub mod heuristic;
#[cfg(feature = "native")]
pub mod native;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod stream;
pub mod transport;

pub use analysis::{AnalysisService, AnalysisStats, SUPPORTED_LANGUAGES};
pub use analyzer::{
    AnalysisCapability, CodeAnalyzer, StructuralAnalyzer, StructuralReport,
    calculate_quality_score,
};
pub use assistant::{AssistantService, AssistantStatus};
pub use client::{Generation, GenerationClient};
pub use config::{BackendConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use domain::{
    AnalysisMetrics, AnalysisResult, GenerationChunk, GenerationRequest, ModelDescriptor,
    ModelDetails, QualityVerdict, StructuralFacts,
};
pub use error::{EducatorError, Result};
pub use fs::{FileSystem, StdFileSystem};
pub use gate::{evaluate, evaluate_result};
pub use report::{
    render_analysis_markdown, render_analysis_text, render_json, render_models_text,
    render_verdict_text,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use stream::GenerationStream;
pub use transport::{HttpTransport, Transport, TransportError};
