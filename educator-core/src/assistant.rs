//! Question answering and code help on top of the generation client.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::client::GenerationClient;
use crate::config::BackendConfig;
use crate::domain::{ModelDescriptor, ModelDetails};
use crate::error::{EducatorError, Result};
use crate::prompts;
use crate::stream::GenerationStream;

/// Connectivity snapshot of the model backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssistantStatus {
    /// Whether the backend answered the probe.
    pub connected: bool,
    /// Model used when a call does not specify one.
    pub default_model: String,
    /// Installed models; empty when the listing fails.
    pub available_models: Vec<ModelDescriptor>,
}

/// Assistant operations.
#[derive(Clone)]
pub struct AssistantService {
    client: GenerationClient,
    config: BackendConfig,
}

impl AssistantService {
    /// Build an HTTP-backed assistant.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = GenerationClient::new(&config)?;
        Ok(Self::with_client(client, config))
    }

    /// Build an assistant over an existing client.
    pub fn with_client(client: GenerationClient, config: BackendConfig) -> Self {
        Self { client, config }
    }

    /// Model used when a call does not name one.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Answer a question, optionally grounded in `context`.
    pub async fn ask(
        &self,
        question: &str,
        model: Option<&str>,
        context: Option<&str>,
    ) -> Result<String> {
        require_text("question", question)?;
        let prompt = prompts::ask_prompt(question, context, self.reply_language());
        self.complete(prompt, model).await
    }

    /// Streaming form of [`AssistantService::ask`].
    pub async fn ask_stream(
        &self,
        question: &str,
        model: Option<&str>,
        context: Option<&str>,
    ) -> Result<GenerationStream> {
        require_text("question", question)?;
        self.ensure_connected().await?;
        let prompt = prompts::ask_prompt(question, context, self.reply_language());
        let request = self.config.request(prompt, model).streaming(true).build()?;
        self.client.generate_stream(&request).await
    }

    /// Programming help, optionally specialised to `language`.
    pub async fn coding_help(
        &self,
        question: &str,
        language: Option<&str>,
        model: Option<&str>,
    ) -> Result<String> {
        require_text("question", question)?;
        let prompt = prompts::coding_help_prompt(question, language, self.reply_language());
        self.complete(prompt, model).await
    }

    /// Explain what a piece of code does.
    pub async fn explain_code(
        &self,
        code: &str,
        language: Option<&str>,
        model: Option<&str>,
    ) -> Result<String> {
        require_text("code", code)?;
        let prompt = prompts::explain_prompt(code, language, self.reply_language());
        self.complete(prompt, model).await
    }

    /// Diagnose an error, or review the code when no error is given.
    pub async fn debug_help(
        &self,
        code: &str,
        error_message: Option<&str>,
        language: Option<&str>,
        model: Option<&str>,
    ) -> Result<String> {
        require_text("code", code)?;
        let prompt = prompts::debug_prompt(code, error_message, language, self.reply_language());
        self.complete(prompt, model).await
    }

    /// Generate code from a description.
    pub async fn generate_code(
        &self,
        description: &str,
        language: &str,
        model: Option<&str>,
    ) -> Result<String> {
        require_text("description", description)?;
        require_text("language", language)?;
        let prompt = prompts::generate_code_prompt(description, language, self.reply_language());
        self.complete(prompt, model).await
    }

    /// Installed models.
    pub async fn available_models(&self) -> Result<Vec<ModelDescriptor>> {
        self.client.list_models().await
    }

    /// Details for one model; `None` when it is not installed.
    pub async fn model_info(&self, name: &str) -> Result<Option<ModelDetails>> {
        require_text("model name", name)?;
        self.client.get_model_info(name).await
    }

    /// Probe the backend and list models when it is reachable.
    pub async fn status(&self) -> AssistantStatus {
        let connected = self.client.check_connection().await;
        let available_models = if connected {
            self.client.list_models().await.unwrap_or_else(|err| {
                log::warn!("model listing failed: {err}");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        AssistantStatus {
            connected,
            default_model: self.config.default_model.clone(),
            available_models,
        }
    }

    fn reply_language(&self) -> Option<&str> {
        self.config.reply_language.as_deref()
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.client.check_connection().await {
            Ok(())
        } else {
            Err(EducatorError::BackendUnreachable {
                attempts: 1,
                message: format!("cannot reach model backend at {}", self.config.base_url),
            })
        }
    }

    async fn complete(&self, prompt: String, model: Option<&str>) -> Result<String> {
        self.ensure_connected().await?;
        let request = self.config.request(prompt, model).build()?;
        self.client.generate_text(&request).await
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EducatorError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::ScriptedTransport;
    use crate::retry::tests::RecordingSleeper;
    use futures_util::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    const TAGS: &str = r#"{"models":[{"name":"codellama:7b","size":3825819519}]}"#;

    fn assistant(transport: Arc<ScriptedTransport>, config: BackendConfig) -> AssistantService {
        let client =
            GenerationClient::with_transport(transport, Arc::new(RecordingSleeper::new()), &config);
        AssistantService::with_client(client, config)
    }

    #[tokio::test]
    async fn ask_probes_before_generating() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = assistant(transport.clone(), BackendConfig::default());

        let err = service.ask("what is a closure?", None, None).await.unwrap_err();

        assert!(matches!(err, EducatorError::BackendUnreachable { .. }));
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ask_sends_context_and_reply_language() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![Ok(
            r#"{"response":"a function value"}"#.to_string(),
        )]));
        transport.push_tags(Ok(TAGS.to_string()));
        let config = BackendConfig {
            reply_language: Some("Korean".to_string()),
            ..BackendConfig::default()
        };
        let service = assistant(transport.clone(), config);

        let answer = service
            .ask("what is a closure?", Some("codellama:7b"), Some("rust book"))
            .await
            .expect("answer");

        assert_eq!(answer, "a function value");
        let prompt = &transport.prompts()[0];
        assert!(prompt.starts_with("Context:\nrust book\n"));
        assert!(prompt.ends_with("Answer in Korean.\n"));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_network() {
        let transport = Arc::new(ScriptedTransport::default());
        let service = assistant(transport.clone(), BackendConfig::default());

        let err = service.explain_code("   ", None, None).await.unwrap_err();
        assert!(matches!(err, EducatorError::InvalidInput(_)));

        let err = service.generate_code("sort a list", "", None).await.unwrap_err();
        assert!(matches!(err, EducatorError::InvalidInput(_)));
        assert!(transport.prompts().is_empty());
    }

    #[tokio::test]
    async fn ask_stream_yields_fragments() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_tags(Ok(TAGS.to_string()));
        transport.streams.lock().expect("streams").push_back(Ok(vec![
            r#"{"response":"ab","done":false}"#,
            r#"{"response":"cd","done":true}"#,
        ]));
        let service = assistant(transport, BackendConfig::default());

        let stream = service.ask_stream("hello", None, None).await.expect("stream");
        let fragments: Vec<String> = stream
            .map(|item| item.expect("fragment"))
            .collect()
            .await;

        assert_eq!(fragments, vec!["ab", "cd"]);
    }

    #[tokio::test]
    async fn status_lists_models_when_connected() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_tags(Ok(TAGS.to_string()));
        transport.push_tags(Ok(TAGS.to_string()));
        let service = assistant(transport, BackendConfig::default());

        let status = service.status().await;

        assert!(status.connected);
        assert_eq!(status.default_model, "codellama");
        assert_eq!(status.available_models.len(), 1);
        assert_eq!(status.available_models[0].name, "codellama:7b");
    }

    #[tokio::test]
    async fn status_is_empty_when_listing_fails() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_tags(Ok(TAGS.to_string()));
        transport.push_tags(Ok("not json".to_string()));
        let service = assistant(transport, BackendConfig::default());

        let status = service.status().await;

        assert!(status.connected);
        assert!(status.available_models.is_empty());
    }

    #[tokio::test]
    async fn debug_help_without_error_reviews_code() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![Ok(
            r#"{"response":"no bugs"}"#.to_string(),
        )]));
        transport.push_tags(Ok(TAGS.to_string()));
        let service = assistant(transport.clone(), BackendConfig::default());

        let answer = service
            .debug_help("x = 1", None, Some("python"), None)
            .await
            .expect("answer");

        assert_eq!(answer, "no bugs");
        assert!(transport.prompts()[0].starts_with("Review the following python code"));
    }

    #[tokio::test]
    async fn model_info_returns_none_for_unknown_model() {
        let service = assistant(Arc::new(ScriptedTransport::default()), BackendConfig::default());
        assert_eq!(service.model_info("missing").await.expect("info"), None);
    }
}
