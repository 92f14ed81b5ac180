use alloc::string::String;

/// Where a model runs.
///
/// Remote deployments fail transiently (network, rate limits) and are worth one retry; local
/// deployments fail deterministically, so retrying them only repeats the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Deployment {
    /// In-process model weights.
    Local,
    /// Hosted API reached over the network.
    Remote,
}

impl Deployment {
    /// Returns `true` when a failed call may succeed if repeated.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Remote)
    }
}

/// Describes a language model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Profile {
    /// Model name, e.g. `gpt-4o-mini` or a GGUF file stem.
    pub name: String,
    /// Provider name, e.g. `openai` or `llama.cpp`.
    pub provider: String,
    /// Where the model runs.
    pub deployment: Deployment,
}

impl Profile {
    /// Creates a new profile.
    pub fn new(name: impl Into<String>, provider: impl Into<String>, deployment: Deployment) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            deployment,
        }
    }
}

/// Sampling parameters. `None` leaves the provider default in place.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Parameters {
    /// Sampling temperature; `0.0` requests greedy decoding.
    pub temperature: Option<f32>,
    /// Nucleus sampling threshold.
    pub top_p: Option<f32>,
    /// Maximum number of generated tokens.
    pub max_tokens: Option<u32>,
    /// Seed for reproducible sampling.
    pub seed: Option<u32>,
}

impl Parameters {
    /// Sets the temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the nucleus sampling threshold.
    #[must_use]
    pub const fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets the maximum number of generated tokens.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling seed.
    #[must_use]
    pub const fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }
}
