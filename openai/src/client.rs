use crate::{
    DEEPSEEK_BASE_URL, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    OPENROUTER_BASE_URL,
    error::OpenAIError,
    request::ChatCompletionRequest,
    response::{ChatCompletion, error_message},
};
use plaint_core::{
    LanguageModel,
    llm::{Deployment, Permanent, Profile, Request},
};
use reqwest::{StatusCode, header};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Default request timeout, used when a request carries no deadline of its own.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Remote chat model behind an OpenAI-compatible `/chat/completions` endpoint.
///
/// Clones share the configuration and the HTTP connection pool.
#[derive(Clone, Debug)]
pub struct OpenAI {
    inner: Arc<Config>,
    http: reqwest::Client,
}

impl OpenAI {
    /// Create a new client using the provided API key and default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).build()
    }

    /// Create a client configured for [`Deepseek`](https://api-docs.deepseek.com)'s OpenAI-compatible endpoint.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(DEEPSEEK_BASE_URL).build()
    }

    /// Create a client configured for [`OpenRouter`](https://openrouter.ai)'s OpenAI-compatible endpoint.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(OPENROUTER_BASE_URL).build()
    }

    /// Start building an [`OpenAI`] client with custom configuration.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> Builder {
        Builder::new(api_key)
    }

    /// Override the chat model in-place.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).model = sanitize_model(model);
        self
    }

    /// Override the REST base URL (useful for OpenAI-compatible endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = base_url.into();
        self
    }

    /// Temperature used when a request does not set one.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        Arc::make_mut(&mut self.inner).temperature = temperature;
        self
    }

    /// Token limit used when a request does not set one.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        Arc::make_mut(&mut self.inner).max_tokens = max_tokens;
        self
    }

    /// The chat model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// The REST base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Sends one chat completion and returns the answer text.
    ///
    /// # Errors
    ///
    /// Transport failures, timeouts, non-success statuses, malformed bodies and empty
    /// completions. See [`OpenAIError::is_retryable`]; [`LanguageModel::generate`] marks the
    /// non-retryable ones with [`Permanent`].
    pub async fn complete(&self, request: &Request) -> Result<String, OpenAIError> {
        let cfg = &self.inner;
        let body = ChatCompletionRequest::new(
            cfg.model.clone(),
            request.messages(),
            request.parameters(),
            cfg.temperature,
            cfg.max_tokens,
        );
        let timeout = request
            .deadline()
            .map_or(cfg.request_timeout, |deadline| deadline.min(cfg.request_timeout));
        let endpoint = cfg.request_url("chat/completions");
        debug!(
            model = %cfg.model,
            endpoint = %endpoint,
            messages = body.message_count(),
            timeout_ms = timeout.as_millis(),
            "sending chat completion"
        );

        let mut builder = self
            .http
            .post(&endpoint)
            .bearer_auth(&cfg.api_key)
            .header(header::USER_AGENT, "plaint-openai/0.1")
            .timeout(timeout)
            .json(&body);
        if let Some(org) = &cfg.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let text = response.text().await?;
        if !status.is_success() {
            let error = error_for_status(status, retry_after, &text);
            warn!(model = %cfg.model, status = status.as_u16(), error = %error, "chat completion failed");
            return Err(error);
        }

        let completion: ChatCompletion = serde_json::from_str(&text)?;
        if let Some(usage) = completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion usage"
            );
        }
        completion.into_text().ok_or(OpenAIError::EmptyResponse)
    }
}

impl LanguageModel for OpenAI {
    async fn generate(&self, request: Request) -> plaint_core::Result {
        self.complete(&request).await.map_err(|error| {
            let retryable = error.is_retryable();
            let error = plaint_core::Error::new(error);
            if retryable {
                error
            } else {
                error.context(Permanent)
            }
        })
    }

    fn profile(&self) -> Profile {
        Profile::new(self.inner.model.clone(), "openai", Deployment::Remote)
    }
}

fn error_for_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> OpenAIError {
    let message = error_message(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        OpenAIError::RateLimit {
            message,
            retry_after,
        }
    } else if status.is_server_error() {
        OpenAIError::ServerError {
            status: status.as_u16(),
            message,
        }
    } else {
        OpenAIError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Only the delay-seconds form is honoured.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse().ok().map(Duration::from_secs)
}

/// Builder for [`OpenAI`].
#[derive(Debug)]
pub struct Builder {
    config: Config,
}

impl Builder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: Config {
                api_key: api_key.into(),
                base_url: DEFAULT_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                organization: None,
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        }
    }

    /// Chat model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = sanitize_model(model);
        self
    }

    /// REST base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sends the `OpenAI-Organization` header.
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.config.organization = Some(organization.into());
        self
    }

    /// Temperature used when a request does not set one.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Token limit used when a request does not set one.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Upper bound for one HTTP exchange. A shorter request deadline takes precedence.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Finishes the client.
    #[must_use]
    pub fn build(self) -> OpenAI {
        OpenAI {
            inner: Arc::new(self.config),
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) organization: Option<String>,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("organization", &self.organization)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub(crate) fn request_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn sanitize_model(model: impl Into<String>) -> String {
    model.into().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaint_core::llm::Message;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned HTTP response and returns the raw request it received.
    async fn serve_once(status_line: &str, extra_headers: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n{extra_headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buffer = [0_u8; 4096];
            loop {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&buffer[..read]);
                if request_complete(&received) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (base_url, handle)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        received.len() >= header_end + 4 + length
    }

    /// Talks to the loopback server directly, ignoring any proxy settings in the environment.
    fn local(api_key: &str, base_url: String) -> OpenAI {
        OpenAI {
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            ..OpenAI::builder(api_key).base_url(base_url).build()
        }
    }

    fn question() -> Request {
        Request::oneshot(
            "You are a concise, evidence-backed financial analyst assistant.",
            "Why are customers disputing card fees?",
        )
    }

    #[test]
    fn profile_is_remote() {
        let model = OpenAI::new("sk-test").with_model(" gpt-4o ");
        let profile = model.profile();
        assert_eq!(profile.name, "gpt-4o");
        assert_eq!(profile.provider, "openai");
        assert!(profile.deployment.is_retryable());
    }

    #[test]
    fn joins_endpoint_paths() {
        let model = OpenAI::builder("k").base_url("http://localhost:8080/v1/").build();
        assert_eq!(model.inner.request_url("/chat/completions"), "http://localhost:8080/v1/chat/completions");
        assert_eq!(model.base_url(), "http://localhost:8080/v1/");
    }

    #[test]
    fn maps_statuses_to_errors() {
        let error = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), "{}");
        assert!(matches!(
            error,
            OpenAIError::RateLimit { retry_after: Some(delay), .. } if delay == Duration::from_secs(3)
        ));
        let error = error_for_status(StatusCode::BAD_GATEWAY, None, "");
        assert!(matches!(error, OpenAIError::ServerError { status: 502, .. }));
        let error = error_for_status(
            StatusCode::NOT_FOUND,
            None,
            r#"{"error": {"message": "The model `gpt-9` does not exist"}}"#,
        );
        assert!(matches!(error, OpenAIError::Api { status: 404, ref message } if message.contains("gpt-9")));
        assert_eq!(parse_retry_after(" 20 "), Some(Duration::from_secs(20)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn posts_chat_completion() {
        let (base_url, server) = serve_once(
            "200 OK",
            "",
            r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "Duplicate annual fees."}}], "usage": {"prompt_tokens": 40, "completion_tokens": 4}}"#,
        )
        .await;
        let model = local("sk-test", base_url);

        let answer = model
            .generate(question().with_deadline(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(answer, "Duplicate annual fees.");

        let raw = server.await.unwrap();
        let lowered = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(lowered.contains("authorization: bearer sk-test"));
        assert!(raw.contains(r#""model":"gpt-4o-mini""#));
        assert!(raw.contains("evidence-backed financial analyst"));
    }

    #[tokio::test]
    async fn surfaces_api_errors() {
        let (base_url, server) = serve_once(
            "401 Unauthorized",
            "",
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        )
        .await;
        let model = local("sk-bad", base_url);

        let error = model.complete(&question()).await.unwrap_err();
        assert!(matches!(error, OpenAIError::Api { status: 401, ref message } if message == "Incorrect API key provided"));
        assert!(!error.is_retryable());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_requests_are_marked_permanent() {
        let (base_url, server) = serve_once(
            "400 Bad Request",
            "",
            r#"{"error": {"message": "max_tokens is too large"}}"#,
        )
        .await;
        let model = local("sk-test", base_url);

        let error = model.generate(question()).await.unwrap_err();
        assert!(error.downcast_ref::<Permanent>().is_some());
        assert!(matches!(
            error.downcast_ref::<OpenAIError>(),
            Some(OpenAIError::Api { status: 400, .. })
        ));
        assert!(format!("{error:#}").contains("max_tokens is too large"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_errors_stay_retryable() {
        let (base_url, server) = serve_once(
            "503 Service Unavailable",
            "",
            r#"{"error": {"message": "overloaded"}}"#,
        )
        .await;
        let model = local("sk-test", base_url);

        let error = model.generate(question()).await.unwrap_err();
        assert!(error.downcast_ref::<Permanent>().is_none());
        assert!(matches!(
            error.downcast_ref::<OpenAIError>(),
            Some(OpenAIError::ServerError { status: 503, .. })
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let (base_url, server) = serve_once(
            "200 OK",
            "",
            r#"{"choices": [{"message": {"role": "assistant", "content": ""}}]}"#,
        )
        .await;
        let model = local("sk-test", base_url);

        let error = model
            .generate(Request::new([Message::user("q")]))
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<OpenAIError>(),
            Some(OpenAIError::EmptyResponse)
        ));
        assert!(error.downcast_ref::<Permanent>().is_some());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rate_limits_carry_retry_after() {
        let (base_url, server) = serve_once(
            "429 Too Many Requests",
            "retry-after: 2\r\n",
            r#"{"error": {"message": "Rate limit reached"}}"#,
        )
        .await;
        let model = local("sk-test", base_url);

        let error = model.complete(&question()).await.unwrap_err();
        assert!(matches!(
            error,
            OpenAIError::RateLimit { retry_after: Some(delay), .. } if delay == Duration::from_secs(2)
        ));
        assert!(error.is_retryable());
        server.await.unwrap();
    }
}
