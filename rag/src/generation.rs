//! Uniform deadline and retry handling around any [`LanguageModel`].

use async_io::Timer;
use futures_lite::future;
use plaint_core::{
    LanguageModel,
    llm::{Permanent, Profile, Request},
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// Runs generation requests under a deadline with a deployment-dependent retry budget.
///
/// Remote models get one retry; local models get none. Failures marked [`Permanent`] and empty
/// output are never retried. Every failure mode (model error, timeout, empty output) is
/// reported as [`RagError::BackendUnavailable`].
#[derive(Debug)]
pub struct Generator<L> {
    model: L,
    timeout: Option<Duration>,
    retries: usize,
}

impl<L: LanguageModel> Generator<L> {
    /// Wraps `model`, deriving the retry budget from its profile.
    pub fn new(model: L) -> Self {
        let retries = usize::from(model.profile().deployment.is_retryable());
        Self {
            model,
            timeout: None,
            retries,
        }
    }

    /// Default deadline for requests that do not carry one.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub const fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// The wrapped model.
    pub const fn model(&self) -> &L {
        &self.model
    }

    /// Describes the wrapped model.
    pub fn profile(&self) -> Profile {
        self.model.profile()
    }

    /// Generates a non-empty answer for `request`.
    ///
    /// The request's own deadline wins over the default timeout and bounds all attempts
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::BackendUnavailable`] once every attempt has failed.
    pub async fn generate(&self, request: Request) -> Result<String> {
        let profile = self.model.profile();
        let limit = request.deadline().or(self.timeout);
        let deadline = limit.map(|limit| Instant::now() + limit);
        let attempts = self.retries + 1;

        let mut failure = anyhow::anyhow!("no attempt was made");
        for attempt in 1..=attempts {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
            let call = self.model.generate(request.clone());
            let outcome = match deadline {
                Some(deadline) => {
                    future::or(async { Some(call.await) }, async {
                        Timer::at(deadline).await;
                        None
                    })
                    .await
                }
                None => Some(call.await),
            };

            failure = match outcome {
                Some(Ok(text)) if !text.trim().is_empty() => {
                    debug!(backend = %profile.name, attempt, chars = text.len(), "generated");
                    return Ok(text);
                }
                Some(Ok(_)) => anyhow::anyhow!("backend returned an empty answer").context(Permanent),
                Some(Err(error)) => error,
                None => anyhow::anyhow!("timed out after {:?}", limit.unwrap_or_default()),
            };
            if failure.downcast_ref::<Permanent>().is_some() {
                debug!(backend = %profile.name, attempt, "failure is not retryable");
                break;
            }
            if attempt < attempts {
                warn!(backend = %profile.name, attempt, error = %failure, "generation failed, retrying");
            }
        }

        Err(RagError::BackendUnavailable {
            backend: profile.name,
            source: failure,
        })
    }
}
