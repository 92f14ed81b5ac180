use plaint_core::llm::{Message, Parameters};
use serde::Serialize;

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessagePayload>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
}

impl ChatCompletionRequest {
    /// Request parameters win over the client defaults.
    pub(crate) fn new(
        model: String,
        messages: &[Message],
        parameters: &Parameters,
        default_temperature: f32,
        default_max_tokens: u32,
    ) -> Self {
        Self {
            model,
            messages: to_chat_messages(messages),
            stream: false,
            temperature: Some(parameters.temperature.unwrap_or(default_temperature)),
            top_p: parameters.top_p,
            max_tokens: Some(parameters.max_tokens.unwrap_or(default_max_tokens)),
            seed: parameters.seed,
        }
    }

    pub(crate) fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessagePayload {
    role: &'static str,
    content: String,
}

pub(crate) fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessagePayload> {
    messages
        .iter()
        .map(|message| ChatMessagePayload {
            role: message.role().as_str(),
            content: message.content().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_messages_and_defaults() {
        let messages = [
            Message::system("You are a concise, evidence-backed financial analyst assistant."),
            Message::user("Why are fees disputed?"),
        ];
        let request = ChatCompletionRequest::new(
            "gpt-4o-mini".into(),
            &messages,
            &Parameters::default(),
            0.2,
            256,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are a concise, evidence-backed financial analyst assistant."},
                    {"role": "user", "content": "Why are fees disputed?"}
                ],
                "stream": false,
                "temperature": 0.2_f32,
                "max_tokens": 256
            })
        );
    }

    #[test]
    fn request_parameters_override_defaults() {
        let parameters = Parameters::default()
            .temperature(0.0)
            .max_tokens(32)
            .top_p(0.9)
            .seed(7);
        let request =
            ChatCompletionRequest::new("m".into(), &[Message::user("q")], &parameters, 0.2, 256);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temperature"], json!(0.0));
        assert_eq!(value["max_tokens"], json!(32));
        assert_eq!(value["top_p"], json!(0.9_f32));
        assert_eq!(value["seed"], json!(7));
        assert_eq!(request.message_count(), 1);
    }
}
