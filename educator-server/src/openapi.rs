//! OpenAPI document for the Code Educator server.

use utoipa::OpenApi;

use educator_core::{
    AnalysisMetrics, AnalysisResult, AnalysisStats, AssistantStatus, ModelDescriptor,
    ModelDetails, QualityVerdict, StructuralFacts,
};

use crate::routes::{
    AnalyzeRequest, CodeExplainRequest, CodeGenerateRequest, DebugRequest, ErrorResponse,
    HealthResponse, LanguagesResponse, ModelsResponse, QuestionRequest, QuestionResponse,
    RootResponse, StatsResponse, SystemInfo,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::root,
        crate::routes::health,
        crate::routes::models,
        crate::routes::model_details,
        crate::routes::ask,
        crate::routes::ask_stream,
        crate::routes::explain,
        crate::routes::generate,
        crate::routes::debug,
        crate::routes::analyze,
        crate::routes::analyze_file,
        crate::routes::quality,
        crate::routes::languages,
        crate::routes::stats,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            RootResponse,
            HealthResponse,
            ModelsResponse,
            ModelDescriptor,
            ModelDetails,
            QuestionRequest,
            QuestionResponse,
            CodeExplainRequest,
            CodeGenerateRequest,
            DebugRequest,
            AnalyzeRequest,
            AnalysisResult,
            StructuralFacts,
            AnalysisMetrics,
            QualityVerdict,
            LanguagesResponse,
            StatsResponse,
            AssistantStatus,
            AnalysisStats,
            SystemInfo,
            ErrorResponse
        )
    ),
    tags(
        (name = "assistant", description = "Question answering and code help"),
        (name = "analysis", description = "Code analysis and quality gate"),
        (name = "models", description = "Installed models"),
        (name = "system", description = "System endpoints")
    )
)]
/// OpenAPI document for the Code Educator server.
pub struct ApiDoc;
