//! Backend-independent pieces of a generation: prompt text and sampling choice.

use plaint_core::llm::{Message, Parameters};
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// How the next token is chosen.
#[cfg_attr(not(feature = "native"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Sampling {
    /// Always take the most likely token.
    Greedy,
    /// Sample from the tempered distribution.
    Random {
        temperature: f32,
        top_p: Option<f32>,
        seed: u32,
    },
}

impl Sampling {
    /// Greedy unless a positive temperature is requested.
    pub(crate) fn from_parameters(parameters: &Parameters) -> Self {
        match parameters.temperature {
            Some(temperature) if temperature > 0.0 => Self::Random {
                temperature,
                top_p: parameters.top_p,
                seed: parameters.seed.unwrap_or_else(clock_seed),
            },
            _ => Self::Greedy,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn clock_seed() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |value| value.as_nanos() as u64);
    ((now ^ (now >> 32)) & 0xFFFF_FFFF) as u32
}

/// Renders messages in `ChatML`, for models that ship without a chat template.
#[cfg_attr(not(feature = "native"), allow(dead_code))]
pub(crate) fn chatml(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let _ = write!(
            prompt,
            "<|im_start|>{}\n{}<|im_end|>\n",
            message.role().as_str(),
            message.content()
        );
    }
    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_missing_temperature_is_greedy() {
        assert_eq!(Sampling::from_parameters(&Parameters::default()), Sampling::Greedy);
        assert_eq!(
            Sampling::from_parameters(&Parameters::default().temperature(0.0)),
            Sampling::Greedy
        );
    }

    #[test]
    fn positive_temperature_samples_with_seed() {
        let parameters = Parameters::default().temperature(0.7).top_p(0.9).seed(42);
        assert_eq!(
            Sampling::from_parameters(&parameters),
            Sampling::Random {
                temperature: 0.7,
                top_p: Some(0.9),
                seed: 42
            }
        );
    }

    #[test]
    fn chatml_ends_with_assistant_turn() {
        let prompt = chatml(&[Message::system("Be brief."), Message::user("Why?")]);
        assert_eq!(
            prompt,
            "<|im_start|>system\nBe brief.<|im_end|>\n<|im_start|>user\nWhy?<|im_end|>\n<|im_start|>assistant\n"
        );
    }
}
