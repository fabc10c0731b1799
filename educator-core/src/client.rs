//! Resilient client for the model backend.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::config::BackendConfig;
use crate::domain::{GenerationRequest, ModelDescriptor, ModelDetails};
use crate::error::{EducatorError, Result};
use crate::retry::{AttemptFailure, RetryPolicy, Sleeper, TokioSleeper, run_with_retry};
use crate::stream::GenerationStream;
use crate::transport::{GeneratePayload, HttpTransport, Transport, TransportError};

/// Output of [`GenerationClient::generate`].
#[derive(Debug)]
pub enum Generation {
    /// Complete text from a buffered call.
    Text(String),
    /// Incremental text from a streaming call.
    Stream(GenerationStream),
}

impl Generation {
    /// Resolve to the full text, draining the stream if needed.
    pub async fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Stream(stream) => stream.collect_text().await,
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelDescriptor>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct ShowDetails {
    family: Option<String>,
    format: Option<String>,
    parameter_size: Option<String>,
    quantization_level: Option<String>,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    details: Option<ShowDetails>,
}

/// Generation client with connection retry and streaming support.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct GenerationClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl GenerationClient {
    /// Build an HTTP-backed client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            Arc::new(TokioSleeper),
            config,
        ))
    }

    /// Build a client over injected collaborators.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
        config: &BackendConfig,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy: config.retry_policy(),
            probe_timeout: config.probe_timeout,
            request_timeout: config.request_timeout,
        }
    }

    /// Probe the backend; any failure reads as "not connected".
    pub async fn check_connection(&self) -> bool {
        match self.transport.list_tags(self.probe_timeout).await {
            Ok(_) => true,
            Err(err) => {
                log::debug!("backend probe failed: {err}");
                false
            }
        }
    }

    /// List installed models with a single attempt.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let body = self
            .transport
            .list_tags(self.request_timeout)
            .await
            .map_err(|err| EducatorError::BackendUnreachable {
                attempts: 1,
                message: err.to_string(),
            })?;
        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|err| EducatorError::MalformedResponse(format!("model listing: {err}")))?;
        Ok(tags.models)
    }

    /// Generate text in the mode the request asks for.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        if request.streaming() {
            self.generate_stream(request).await.map(Generation::Stream)
        } else {
            self.generate_text(request).await.map(Generation::Text)
        }
    }

    /// Buffered generation, retrying only connection and timeout failures.
    pub async fn generate_text(&self, request: &GenerationRequest) -> Result<String> {
        let payload = GeneratePayload {
            model: request.model(),
            prompt: request.prompt(),
            stream: false,
        };
        let timeout = request.timeout();
        let transport = self.transport.as_ref();
        let payload = &payload;
        let body = run_with_retry(self.policy, self.sleeper.as_ref(), move |_| async move {
            transport
                .generate(payload, timeout)
                .await
                .map_err(AttemptFailure::from)
        })
        .await?;

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|err| EducatorError::MalformedResponse(format!("generation: {err}")))?;
        if let Some(message) = parsed.error {
            return Err(EducatorError::MalformedResponse(format!(
                "backend error: {message}"
            )));
        }
        parsed.response.ok_or_else(|| {
            EducatorError::MalformedResponse("generation reply has no response field".to_string())
        })
    }

    /// Open a streaming generation.
    ///
    /// Opening the connection follows the retry policy; once the backend has
    /// answered, every failure is final for this stream.
    pub async fn generate_stream(&self, request: &GenerationRequest) -> Result<GenerationStream> {
        let payload = GeneratePayload {
            model: request.model(),
            prompt: request.prompt(),
            stream: true,
        };
        let timeout = request.timeout();
        let transport = self.transport.as_ref();
        let payload = &payload;
        let bytes = run_with_retry(self.policy, self.sleeper.as_ref(), move |_| async move {
            transport
                .generate_stream(payload, timeout)
                .await
                .map_err(AttemptFailure::from)
        })
        .await?;
        Ok(GenerationStream::new(bytes, timeout))
    }

    /// Fetch optional model metadata; `None` when the backend does not know it.
    pub async fn get_model_info(&self, name: &str) -> Result<Option<ModelDetails>> {
        let body = match self.transport.show(name, self.request_timeout).await {
            Ok(body) => body,
            Err(TransportError::Status { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err.into_educator_error(1)),
        };
        let show: ShowResponse = serde_json::from_str(&body)
            .map_err(|err| EducatorError::MalformedResponse(format!("model details: {err}")))?;
        let details = show.details.unwrap_or_default();
        Ok(Some(ModelDetails {
            name: name.to_string(),
            family: details.family,
            format: details.format,
            parameter_size: details.parameter_size,
            quantization_level: details.quantization_level,
            license: show.license,
            template: show.template,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::retry::tests::RecordingSleeper;
    use crate::transport::{ByteStream, TransportFuture};
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that replays scripted outcomes and counts calls.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub(crate) tags: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
        pub(crate) generations: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
        pub(crate) streams: Mutex<VecDeque<std::result::Result<Vec<&'static str>, TransportError>>>,
        pub(crate) prompts: Mutex<Vec<String>>,
        pub(crate) generate_calls: AtomicU32,
    }

    impl ScriptedTransport {
        pub(crate) fn with_generations(
            outcomes: Vec<std::result::Result<String, TransportError>>,
        ) -> Self {
            Self {
                generations: Mutex::new(outcomes.into()),
                ..Self::default()
            }
        }

        pub(crate) fn push_tags(&self, outcome: std::result::Result<String, TransportError>) {
            self.tags.lock().expect("tags").push_back(outcome);
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts").clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn list_tags<'a>(&'a self, _timeout: Duration) -> TransportFuture<'a, String> {
            let outcome = self
                .tags
                .lock()
                .expect("tags")
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connect("no tags scripted".to_string())));
            Box::pin(async move { outcome })
        }

        fn generate<'a>(
            &'a self,
            payload: &'a GeneratePayload<'a>,
            _timeout: Duration,
        ) -> TransportFuture<'a, String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .expect("prompts")
                .push(payload.prompt.to_string());
            let outcome = self
                .generations
                .lock()
                .expect("generations")
                .pop_front()
                .expect("no more scripted generations");
            Box::pin(async move { outcome })
        }

        fn generate_stream<'a>(
            &'a self,
            _payload: &'a GeneratePayload<'a>,
            _timeout: Duration,
        ) -> TransportFuture<'a, ByteStream> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .streams
                .lock()
                .expect("streams")
                .pop_front()
                .expect("no more scripted streams")
                .map(|lines| {
                    let chunks = lines
                        .into_iter()
                        .map(|line| Ok::<_, TransportError>(Bytes::from(format!("{line}\n"))));
                    Box::pin(stream::iter(chunks)) as ByteStream
                });
            Box::pin(async move { outcome })
        }

        fn show<'a>(&'a self, _name: &'a str, _timeout: Duration) -> TransportFuture<'a, String> {
            Box::pin(async {
                Err::<String, _>(TransportError::Status {
                    status: 404,
                    body: String::new(),
                })
            })
        }
    }

    fn connect_error() -> TransportError {
        TransportError::Connect("connection refused".to_string())
    }

    fn config_with_retries(max_retries: u32) -> BackendConfig {
        BackendConfig {
            max_retries,
            retry_delay: Duration::from_secs(1),
            ..BackendConfig::default()
        }
    }

    fn scripted_client(
        transport: Arc<ScriptedTransport>,
        sleeper: Arc<RecordingSleeper>,
        max_retries: u32,
    ) -> GenerationClient {
        GenerationClient::with_transport(transport, sleeper, &config_with_retries(max_retries))
    }

    fn request(streaming: bool) -> GenerationRequest {
        GenerationRequest::builder("explain", "codellama")
            .streaming(streaming)
            .build()
            .expect("request")
    }

    #[tokio::test]
    async fn buffered_generation_succeeds_on_last_attempt() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![
            Err(connect_error()),
            Err(TransportError::Timeout("slow".to_string())),
            Ok(r#"{"response":"done","done":true}"#.to_string()),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = scripted_client(transport.clone(), sleeper.clone(), 3);

        let text = client.generate_text(&request(false)).await.expect("text");

        assert_eq!(text, "done");
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.durations(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn buffered_generation_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![
            Err(connect_error()),
            Err(connect_error()),
            Err(connect_error()),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = scripted_client(transport.clone(), sleeper.clone(), 3);

        let err = client.generate_text(&request(false)).await.unwrap_err();

        assert!(matches!(
            err,
            EducatorError::BackendUnreachable { attempts: 3, .. }
        ));
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 3);
        assert!(sleeper.total() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn application_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![Err(
            TransportError::Status {
                status: 500,
                body: "model crashed".to_string(),
            },
        )]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = scripted_client(transport.clone(), sleeper.clone(), 3);

        let err = client.generate_text(&request(false)).await.unwrap_err();

        assert!(matches!(
            err,
            EducatorError::BackendRejected { status: 500, .. }
        ));
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.durations().is_empty());
    }

    #[tokio::test]
    async fn missing_response_field_is_malformed() {
        for body in [r#"{"done":true}"#, "not json"] {
            let transport = Arc::new(ScriptedTransport::with_generations(vec![Ok(
                body.to_string()
            )]));
            let client =
                scripted_client(transport.clone(), Arc::new(RecordingSleeper::new()), 3);

            let err = client.generate_text(&request(false)).await.unwrap_err();

            assert!(matches!(err, EducatorError::MalformedResponse(_)), "{body}");
            assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn backend_error_field_fails_both_modes() {
        let transport = Arc::new(ScriptedTransport::with_generations(vec![Ok(
            r#"{"error":"model runner crashed"}"#.to_string(),
        )]));
        transport
            .streams
            .lock()
            .expect("streams")
            .push_back(Ok(vec![
                r#"{"response":"ab","done":false}"#,
                r#"{"error":"model runner crashed"}"#,
            ]));
        let client = scripted_client(transport.clone(), Arc::new(RecordingSleeper::new()), 3);

        let buffered = client.generate_text(&request(false)).await.unwrap_err();
        let streamed = client
            .generate_stream(&request(true))
            .await
            .expect("stream")
            .collect_text()
            .await
            .unwrap_err();

        for err in [buffered, streamed] {
            match err {
                EducatorError::MalformedResponse(message) => {
                    assert!(message.contains("model runner crashed"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn streaming_retries_only_while_opening() {
        let transport = Arc::new(ScriptedTransport::default());
        {
            let mut streams = transport.streams.lock().expect("streams");
            streams.push_back(Err(connect_error()));
            streams.push_back(Ok(vec![
                r#"{"response":"ab","done":false}"#,
                r#"{"response":"cd","done":true}"#,
            ]));
        }
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = scripted_client(transport.clone(), sleeper.clone(), 3);

        let generation = client.generate(&request(true)).await.expect("generation");
        let Generation::Stream(stream) = generation else {
            panic!("expected stream");
        };
        let fragments: Vec<String> = stream
            .map(|item| item.expect("fragment"))
            .collect()
            .await;

        assert_eq!(fragments, vec!["ab", "cd"]);
        assert_eq!(transport.generate_calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.durations(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn model_info_is_empty_when_not_found() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = scripted_client(transport, Arc::new(RecordingSleeper::new()), 3);

        let details = client.get_model_info("ghost").await.expect("details");

        assert!(details.is_none());
    }

    #[tokio::test]
    async fn check_connection_never_fails() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_tags(Ok(r#"{"models":[]}"#.to_string()));
        transport.push_tags(Err(TransportError::Status {
            status: 500,
            body: String::new(),
        }));
        let client = scripted_client(transport, Arc::new(RecordingSleeper::new()), 3);

        assert!(client.check_connection().await);
        assert!(!client.check_connection().await);
        assert!(!client.check_connection().await);
    }

    #[tokio::test]
    async fn http_client_lists_models_and_details() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(serde_json::json!({
                    "models": [
                        {"name": "codellama:latest", "size": 3825819519u64, "modified_at": "2024-05-01T10:00:00Z", "digest": "abc"},
                        {"name": "llama3:8b"}
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/show")
                    .json_body(serde_json::json!({"name": "codellama:latest"}));
                then.status(200).json_body(serde_json::json!({
                    "license": "LLAMA 2",
                    "details": {"family": "llama", "format": "gguf", "parameter_size": "7B", "quantization_level": "Q4_0"}
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/show")
                    .json_body(serde_json::json!({"name": "ghost"}));
                then.status(404).body(r#"{"error":"model 'ghost' not found"}"#);
            })
            .await;

        let config = BackendConfig {
            base_url: server.base_url(),
            ..BackendConfig::default()
        };
        let client = GenerationClient::new(&config).expect("client");

        let models = client.list_models().await.expect("models");
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "codellama:latest");
        assert_eq!(models[0].size, Some(3825819519));
        assert_eq!(models[1].size, None);

        let details = client
            .get_model_info("codellama:latest")
            .await
            .expect("details")
            .expect("known model");
        assert_eq!(details.family.as_deref(), Some("llama"));
        assert_eq!(details.license.as_deref(), Some("LLAMA 2"));

        assert!(client.get_model_info("ghost").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn list_models_reports_unreachable_on_bad_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(500);
            })
            .await;
        let config = BackendConfig {
            base_url: server.base_url(),
            ..BackendConfig::default()
        };
        let client = GenerationClient::new(&config).expect("client");

        let err = client.list_models().await.unwrap_err();

        assert!(matches!(
            err,
            EducatorError::BackendUnreachable { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn http_client_streams_ndjson() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("\"stream\":true");
                then.status(200).body(concat!(
                    "{\"response\":\"Hello\",\"done\":false}\n",
                    "garbage\n",
                    "{\"response\":\", world\",\"done\":false}\n",
                    "{\"response\":\"\",\"done\":true}\n"
                ));
            })
            .await;
        let config = BackendConfig {
            base_url: server.base_url(),
            ..BackendConfig::default()
        };
        let client = GenerationClient::new(&config).expect("client");

        let text = client
            .generate(&request(true))
            .await
            .expect("generation")
            .into_text()
            .await
            .expect("text");

        mock.assert_async().await;
        assert_eq!(text, "Hello, world");
    }
}
