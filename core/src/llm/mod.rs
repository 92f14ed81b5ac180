//! # Language Models
//!
//! Provider-agnostic text generation. A [`LanguageModel`] turns a [`Request`] (messages, sampling
//! [`Parameters`] and an optional deadline) into the generated text. Providers describe
//! themselves through a [`Profile`], whose [`Deployment`] tells callers whether a failure is
//! worth retrying.
//!
//! ```rust
//! use core::time::Duration;
//! use plaint_core::llm::{Message, Parameters, Request};
//!
//! let request = Request::new([
//!     Message::system("You are a concise, evidence-backed assistant."),
//!     Message::user("Summarise the complaints about late fees."),
//! ])
//! .with_parameters(Parameters::default().temperature(0.2).max_tokens(256))
//! .with_deadline(Duration::from_secs(30));
//!
//! assert_eq!(request.messages().len(), 2);
//! assert_eq!(request.deadline(), Some(Duration::from_secs(30)));
//! ```

/// Message types and conversation handling.
pub mod message;
/// Model profiles and sampling parameters.
pub mod model;

use alloc::vec::Vec;
use core::{future::Future, time::Duration};

pub use message::{Message, Role};
pub use model::{Deployment, Parameters, Profile};

/// Builder-style request passed into [`LanguageModel::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    messages: Vec<Message>,
    parameters: Parameters,
    deadline: Option<Duration>,
}

impl Request {
    /// Creates a request from the provided messages using default parameters and no deadline.
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            parameters: Parameters::default(),
            deadline: None,
        }
    }

    /// Creates a request with a system instruction followed by a single user turn.
    pub fn oneshot(
        system: impl Into<alloc::string::String>,
        user: impl Into<alloc::string::String>,
    ) -> Self {
        Self::new([Message::system(system), Message::user(user)])
    }

    /// Replaces the sampling parameters.
    #[must_use]
    pub const fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the time budget the whole generation call must finish within.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the conversation.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the sampling parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns the optional deadline.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Returns the content of the last user message, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role() == Role::User)
            .map(Message::content)
    }
}

/// Marks a generation failure that sending the same request again cannot fix.
///
/// Providers attach it with [`anyhow::Error::context`]; retry loops look for it with
/// [`anyhow::Error::downcast_ref`] and give up immediately.
///
/// ```rust
/// use plaint_core::llm::Permanent;
///
/// let error = anyhow::anyhow!("API error 401: bad key").context(Permanent);
/// assert!(error.downcast_ref::<Permanent>().is_some());
/// assert_eq!(format!("{error:#}"), "not retryable: API error 401: bad key");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permanent;

impl core::fmt::Display for Permanent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("not retryable")
    }
}

/// Generates text from a prompt.
///
/// Implementations must surface failures (model load errors, unreachable endpoints, timeouts)
/// as errors rather than returning an empty answer, and mark the ones a retry cannot fix with
/// [`Permanent`].
pub trait LanguageModel: Send + Sync {
    /// Generates the answer for `request`.
    fn generate(&self, request: Request) -> impl Future<Output = crate::Result> + Send;

    /// Describes the model.
    fn profile(&self) -> Profile;
}

impl<T: LanguageModel> LanguageModel for &T {
    fn generate(&self, request: Request) -> impl Future<Output = crate::Result> + Send {
        T::generate(self, request)
    }

    fn profile(&self) -> Profile {
        T::profile(self)
    }
}

impl<T: LanguageModel> LanguageModel for alloc::sync::Arc<T> {
    fn generate(&self, request: Request) -> impl Future<Output = crate::Result> + Send {
        T::generate(self, request)
    }

    fn profile(&self) -> Profile {
        T::profile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, string::String};

    struct Echo;

    impl LanguageModel for Echo {
        async fn generate(&self, request: Request) -> crate::Result {
            Ok(format!("echo: {}", request.prompt().unwrap_or_default()))
        }

        fn profile(&self) -> Profile {
            Profile::new("echo", "test", Deployment::Local)
        }
    }

    #[tokio::test]
    async fn generate_reads_last_user_turn() {
        let request = Request::new([
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
        ]);
        let answer: String = Echo.generate(request).await.unwrap();
        assert_eq!(answer, "echo: second");
    }

    #[test]
    fn oneshot_builds_system_and_user() {
        let request = Request::oneshot("rules", "question");
        assert_eq!(request.messages().len(), 2);
        assert_eq!(request.messages()[0].role(), Role::System);
        assert_eq!(request.messages()[0].content(), "rules");
        assert_eq!(request.prompt(), Some("question"));
        assert_eq!(request.deadline(), None);
    }

    #[test]
    fn permanent_marker_survives_context() {
        let error = anyhow::anyhow!("bad key").context(Permanent);
        assert!(error.downcast_ref::<Permanent>().is_some());
        assert_eq!(format!("{error:#}"), "not retryable: bad key");
        assert!(anyhow::anyhow!("busy").downcast_ref::<Permanent>().is_none());
    }

    #[tokio::test]
    async fn arc_forwards_profile() {
        let model = alloc::sync::Arc::new(Echo);
        assert_eq!(model.profile().name, "echo");
        assert!(model.generate(Request::new([])).await.is_ok());
    }
}
