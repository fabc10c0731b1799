//! HTTP handlers for the Code Educator server.

use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use educator_core::{
    AnalysisResult, AnalysisService, AnalysisStats, AssistantService, AssistantStatus,
    BackendConfig, EducatorError, ModelDescriptor, ModelDetails, QualityVerdict, evaluate_result,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{OpenApi, ToSchema};

use crate::openapi::ApiDoc;

/// Number of routes registered by the server.
pub const ENDPOINT_COUNT: usize = 15;

#[derive(Clone)]
/// Shared application state for handlers.
pub struct AppState {
    /// Structural analysis and AI commentary.
    pub analysis: AnalysisService,
    /// Question answering and code help.
    pub assistant: AssistantService,
}

impl AppState {
    /// Build both services from one backend configuration.
    pub fn new(config: BackendConfig) -> educator_core::Result<Self> {
        Ok(Self {
            analysis: AnalysisService::new(config.clone())?,
            assistant: AssistantService::new(config)?,
        })
    }
}

/// Error response payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

/// API landing information.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    /// Service name.
    pub message: String,
    /// API version.
    pub version: String,
    /// Location of the OpenAPI document.
    pub docs: String,
}

/// Server and dependency health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall server status.
    pub status: String,
    /// Whether the model backend answered.
    pub ollama_connected: bool,
    /// Whether the native analyzer is in use.
    pub core_module: bool,
    /// Recognised languages.
    pub supported_languages: Vec<String>,
    /// Feature availability keyed by feature name.
    pub features: BTreeMap<String, bool>,
    /// RFC 3339 time the check ran.
    pub timestamp: String,
}

/// Installed models.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelsResponse {
    /// Models reported by the backend.
    pub models: Vec<ModelDescriptor>,
}

/// Question for the assistant.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionRequest {
    /// Question text.
    pub question: String,
    /// Model override.
    pub model: Option<String>,
    /// Programming language; switches to coding help when set.
    pub language: Option<String>,
    /// Extra context for the answer.
    pub context: Option<String>,
}

/// Assistant answer.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionResponse {
    /// Generated answer.
    pub response: String,
    /// Model that produced it.
    pub model_used: String,
}

/// Code explanation request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CodeExplainRequest {
    /// Code to explain.
    pub code: String,
    /// Language of the code.
    pub language: Option<String>,
    /// Model override.
    pub model: Option<String>,
}

/// Code generation request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CodeGenerateRequest {
    /// What the code should do.
    pub description: String,
    /// Target language.
    pub language: String,
    /// Model override.
    pub model: Option<String>,
}

/// Debugging help request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DebugRequest {
    /// Code that misbehaves.
    pub code: String,
    /// Error message, if any.
    pub error_message: Option<String>,
    /// Language of the code.
    pub language: Option<String>,
    /// Model override.
    pub model: Option<String>,
}

/// Source analysis request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Source text.
    pub code: String,
    /// Ask the model for commentary.
    #[serde(default)]
    pub ai_analysis: bool,
    /// Model override for the commentary.
    pub model: Option<String>,
}

/// Query parameters for raw file analysis.
#[derive(Debug, Deserialize)]
pub struct AnalyzeFileQuery {
    /// Original file name.
    pub name: Option<String>,
    /// Ask the model for commentary.
    #[serde(default)]
    pub ai_analysis: bool,
    /// Model override for the commentary.
    pub model: Option<String>,
}

/// Query parameters for the quality gate.
#[derive(Debug, Deserialize)]
pub struct QualityQuery {
    /// Source text to score.
    pub code: String,
}

/// Supported languages.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LanguagesResponse {
    /// Recognised languages.
    pub languages: Vec<String>,
    /// Whether the native analyzer is in use.
    pub core_module_available: bool,
}

/// Static server information.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SystemInfo {
    /// API version.
    pub api_version: String,
    /// Number of registered routes.
    pub endpoints: usize,
}

/// Combined service statistics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Model backend status.
    pub ai_service: AssistantStatus,
    /// Analyzer capabilities.
    pub code_analysis: AnalysisStats,
    /// Server information.
    pub system: SystemInfo,
}

fn error_response(err: &EducatorError) -> HttpResponse {
    let body = ErrorResponse {
        message: err.to_string(),
    };
    match err {
        EducatorError::InvalidInput(_) | EducatorError::Encoding(_) => {
            HttpResponse::BadRequest().json(body)
        }
        EducatorError::BackendUnreachable { .. } => HttpResponse::ServiceUnavailable().json(body),
        EducatorError::BackendRejected { .. } | EducatorError::MalformedResponse(_) => {
            HttpResponse::BadGateway().json(body)
        }
        EducatorError::AnalysisFailed(_) | EducatorError::Io(_) => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

fn answer(result: educator_core::Result<String>, model_used: String) -> HttpResponse {
    match result {
        Ok(response) => HttpResponse::Ok().json(QuestionResponse {
            response,
            model_used,
        }),
        Err(err) => error_response(&err),
    }
}

fn model_used(state: &AppState, model: Option<&str>) -> String {
    model
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(state.assistant.default_model())
        .to_string()
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "API information", body = RootResponse)
    ),
    tag = "system"
)]
#[get("/")]
/// Describe the API.
pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(RootResponse {
        message: "Code Educator API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/openapi.json".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health report", body = HealthResponse)
    ),
    tag = "system"
)]
#[get("/health")]
/// Report server and backend health.
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let status = state.assistant.status().await;
    let analysis_stats = state.analysis.stats();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        ollama_connected: status.connected,
        core_module: analysis_stats.core_module_available,
        supported_languages: analysis_stats.supported_languages,
        features: analysis_stats.features,
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/models",
    responses(
        (status = 200, description = "Installed models", body = ModelsResponse),
        (status = 503, description = "Backend unreachable", body = ErrorResponse)
    ),
    tag = "models"
)]
#[get("/models")]
/// List installed models.
pub async fn models(state: web::Data<AppState>) -> impl Responder {
    match state.assistant.available_models().await {
        Ok(models) => HttpResponse::Ok().json(ModelsResponse { models }),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/models/{name}",
    params(
        ("name" = String, Path, description = "Model name")
    ),
    responses(
        (status = 200, description = "Model details", body = ModelDetails),
        (status = 404, description = "Model not installed", body = ErrorResponse)
    ),
    tag = "models"
)]
#[get("/models/{name}")]
/// Fetch details for one model.
pub async fn model_details(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    let name = name.into_inner();
    match state.assistant.model_info(&name).await {
        Ok(Some(details)) => HttpResponse::Ok().json(details),
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse {
            message: format!("model {name} not found"),
        }),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/ask",
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Answer", body = QuestionResponse),
        (status = 503, description = "Backend unreachable", body = ErrorResponse)
    ),
    tag = "assistant"
)]
#[post("/ask")]
/// Ask a general or programming question.
pub async fn ask(state: web::Data<AppState>, payload: web::Json<QuestionRequest>) -> impl Responder {
    let payload = payload.into_inner();
    let model = payload.model.as_deref();
    let result = match payload.language.as_deref() {
        Some(language) if !language.trim().is_empty() => {
            state
                .assistant
                .coding_help(&payload.question, Some(language), model)
                .await
        }
        _ => {
            state
                .assistant
                .ask(&payload.question, model, payload.context.as_deref())
                .await
        }
    };
    answer(result, model_used(&state, model))
}

#[utoipa::path(
    post,
    path = "/ask/stream",
    request_body = QuestionRequest,
    responses(
        (status = 200, description = "Answer streamed as plain text", body = String, content_type = "text/plain"),
        (status = 503, description = "Backend unreachable", body = ErrorResponse)
    ),
    tag = "assistant"
)]
#[post("/ask/stream")]
/// Ask a question and stream the answer as it is generated.
pub async fn ask_stream(
    state: web::Data<AppState>,
    payload: web::Json<QuestionRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    match state
        .assistant
        .ask_stream(
            &payload.question,
            payload.model.as_deref(),
            payload.context.as_deref(),
        )
        .await
    {
        Ok(fragments) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .streaming(fragments.map(|fragment| fragment.map(web::Bytes::from))),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/explain",
    request_body = CodeExplainRequest,
    responses(
        (status = 200, description = "Explanation", body = QuestionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "assistant"
)]
#[post("/explain")]
/// Explain a piece of code.
pub async fn explain(
    state: web::Data<AppState>,
    payload: web::Json<CodeExplainRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    let model = payload.model.as_deref();
    let result = state
        .assistant
        .explain_code(&payload.code, payload.language.as_deref(), model)
        .await;
    answer(result, model_used(&state, model))
}

#[utoipa::path(
    post,
    path = "/generate",
    request_body = CodeGenerateRequest,
    responses(
        (status = 200, description = "Generated code", body = QuestionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "assistant"
)]
#[post("/generate")]
/// Generate code from a description.
pub async fn generate(
    state: web::Data<AppState>,
    payload: web::Json<CodeGenerateRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    let model = payload.model.as_deref();
    let result = state
        .assistant
        .generate_code(&payload.description, &payload.language, model)
        .await;
    answer(result, model_used(&state, model))
}

#[utoipa::path(
    post,
    path = "/debug",
    request_body = DebugRequest,
    responses(
        (status = 200, description = "Debugging help", body = QuestionResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "assistant"
)]
#[post("/debug")]
/// Diagnose failing code.
pub async fn debug(state: web::Data<AppState>, payload: web::Json<DebugRequest>) -> impl Responder {
    let payload = payload.into_inner();
    let model = payload.model.as_deref();
    let result = state
        .assistant
        .debug_help(
            &payload.code,
            payload.error_message.as_deref(),
            payload.language.as_deref(),
            model,
        )
        .await;
    answer(result, model_used(&state, model))
}

#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis result", body = AnalysisResult),
        (status = 500, description = "Analysis failed", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/analyze")]
/// Analyze source text.
pub async fn analyze(
    state: web::Data<AppState>,
    payload: web::Json<AnalyzeRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    match state
        .analysis
        .analyze(&payload.code, payload.ai_analysis, payload.model.as_deref())
        .await
    {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/analyze/file",
    params(
        ("name" = Option<String>, Query, description = "Original file name"),
        ("ai_analysis" = Option<bool>, Query, description = "Ask the model for commentary"),
        ("model" = Option<String>, Query, description = "Model override")
    ),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Analysis result", body = AnalysisResult),
        (status = 400, description = "File is not UTF-8", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/analyze/file")]
/// Analyze an uploaded file body.
pub async fn analyze_file(
    state: web::Data<AppState>,
    query: web::Query<AnalyzeFileQuery>,
    body: web::Bytes,
) -> impl Responder {
    let query = query.into_inner();
    let code = match String::from_utf8(body.to_vec()) {
        Ok(code) => code,
        Err(err) => {
            return error_response(&EducatorError::Encoding(format!(
                "upload is not valid UTF-8: {err}"
            )));
        }
    };
    match state
        .analysis
        .analyze(&code, query.ai_analysis, query.model.as_deref())
        .await
    {
        Ok(mut result) => {
            result.file_name = query.name;
            HttpResponse::Ok().json(result)
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/analyze/quality/{threshold}",
    params(
        ("threshold" = u8, Path, description = "Minimum passing score"),
        ("code" = String, Query, description = "Source text to score")
    ),
    responses(
        (status = 200, description = "Gate verdict", body = QualityVerdict),
        (status = 500, description = "Analysis failed", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[get("/analyze/quality/{threshold}")]
/// Check code against a minimum quality score.
pub async fn quality(
    state: web::Data<AppState>,
    threshold: web::Path<u8>,
    query: web::Query<QualityQuery>,
) -> impl Responder {
    let threshold = threshold.into_inner();
    match state.analysis.analyze(&query.code, false, None).await {
        Ok(result) => HttpResponse::Ok().json(evaluate_result(&result, threshold)),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/languages",
    responses(
        (status = 200, description = "Supported languages", body = LanguagesResponse)
    ),
    tag = "analysis"
)]
#[get("/languages")]
/// List supported languages.
pub async fn languages(state: web::Data<AppState>) -> impl Responder {
    let analysis_stats = state.analysis.stats();
    HttpResponse::Ok().json(LanguagesResponse {
        languages: analysis_stats.supported_languages,
        core_module_available: analysis_stats.core_module_available,
    })
}

#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Service statistics", body = StatsResponse)
    ),
    tag = "system"
)]
#[get("/stats")]
/// Report backend status and analyzer capabilities.
pub async fn stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(StatsResponse {
        ai_service: state.assistant.status().await,
        code_analysis: state.analysis.stats(),
        system: SystemInfo {
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints: ENDPOINT_COUNT,
        },
    })
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document", body = serde_json::Value)
    ),
    tag = "system"
)]
#[get("/openapi.json")]
/// Serve the OpenAPI document.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
