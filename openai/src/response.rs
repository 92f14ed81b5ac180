use serde::Deserialize;

/// Non-streaming `chat.completion` object.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    pub(crate) usage: Option<Usage>,
}

impl ChatCompletion {
    /// Text of the first choice that carries any.
    pub(crate) fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .map(MessageContent::into_text)
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Some compatible servers return content as an array of text parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts.into_iter().filter_map(|part| part.text).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub(crate) prompt_tokens: u32,
    #[serde(default)]
    pub(crate) completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extracts `error.message` from an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| {
            let body = body.trim();
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.to_string()
            }
        },
        |envelope| envelope.error.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_non_empty_choice() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  "}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "Fees were charged twice."}}
            ],
            "usage": {"prompt_tokens": 120, "completion_tokens": 6, "total_tokens": 126}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.usage.map(|usage| usage.prompt_tokens), Some(120));
        assert_eq!(completion.into_text().as_deref(), Some("Fees were charged twice."));
    }

    #[test]
    fn joins_content_parts() {
        let body = r#"{"choices": [{"message": {"content": [{"type": "text", "text": "late "}, {"type": "text", "text": "fees"}]}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(body).unwrap();
        assert_eq!(completion.into_text().as_deref(), Some("late fees"));
    }

    #[test]
    fn missing_content_is_none() {
        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(completion.into_text().is_none());
        let completion: ChatCompletion = serde_json::from_str("{}").unwrap();
        assert!(completion.into_text().is_none());
    }

    #[test]
    fn extracts_api_error_messages() {
        assert_eq!(
            error_message(r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#),
            "Incorrect API key provided"
        );
        assert_eq!(error_message("upstream timeout\n"), "upstream timeout");
        assert_eq!(error_message(""), "no response body");
    }
}
