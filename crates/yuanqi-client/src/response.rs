//! Response types for the agent chat completions API.
//!
//! These mirror the server's JSON. Every field defaults when missing so that
//! decoding is purely structural: streaming chunks omit most fields and the
//! server adds new ones without notice.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionResponse {
    /// Request id.
    pub id: String,
    /// Unix timestamp, seconds.
    pub created: i64,
    /// Candidate replies. The API currently always returns exactly one.
    pub choices: Vec<Choice>,
    /// The assistant that actually answered.
    pub assistant_id: String,
    /// Token usage.
    pub usage: Usage,
}

/// One incremental chunk of a streaming response.
///
/// Same shape as [`SessionResponse`]; content arrives in [`Choice::delta`].
pub type StreamEvent = SessionResponse;

impl SessionResponse {
    /// Text of the first choice: the full message content, or the delta
    /// fragment for streaming chunks.
    pub fn text(&self) -> &str {
        self.choices.first().map(Choice::text).unwrap_or_default()
    }

    /// Finish reason of the first choice, if it has finished.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason.as_ref())
    }
}

/// A candidate reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Choice {
    /// Position of this choice.
    pub index: u32,
    /// Why generation stopped. Absent while a stream is still running.
    #[serde(
        deserialize_with = "deserialize_finish_reason",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_reason: Option<FinishReason>,
    /// Complete reply (non-streaming responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceMessage>,
    /// Reply fragment (streaming responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
}

impl Choice {
    /// Message content if present, otherwise delta content.
    pub fn text(&self) -> &str {
        if let Some(message) = &self.message {
            return &message.content;
        }
        self.delta.as_ref().map(|d| d.content.as_str()).unwrap_or_default()
    }
}

/// Why the agent stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Normal end of the reply.
    Stop,
    /// The content was rejected by moderation.
    Sensitive,
    /// A tool invocation failed.
    ToolFail,
    /// A reason this crate does not know yet.
    Other(String),
}

impl FinishReason {
    /// Wire name of the reason.
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Sensitive => "sensitive",
            FinishReason::ToolFail => "tool_fail",
            FinishReason::Other(s) => s,
        }
    }
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => FinishReason::Stop,
            "sensitive" => FinishReason::Sensitive,
            "tool_fail" => FinishReason::ToolFail,
            _ => FinishReason::Other(s),
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FinishReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FinishReason::from)
    }
}

// Streaming chunks send `""` or `null` until the reply is finished.
fn deserialize_finish_reason<'de, D>(deserializer: D) -> Result<Option<FinishReason>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(FinishReason::from))
}

/// Complete reply content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceMessage {
    /// Role name.
    pub role: String,
    /// Reply text.
    pub content: String,
    /// Steps the assistant executed to produce the reply.
    pub steps: Vec<Step>,
}

/// One recorded action: model output (`assistant`) or a tool call (`tool`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    /// `assistant` for model output, `tool` for tool output.
    pub role: String,
    /// Model or tool output.
    pub content: String,
    /// For `tool` steps, the id of the tool call this answers.
    pub tool_call_id: String,
    /// Tool calls the model generated.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage of this step.
    pub usage: Usage,
    /// Time spent, in milliseconds.
    pub time_cost: u64,
}

/// A tool call generated by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCall {
    /// Unique id of the call.
    pub id: String,
    /// Tool type; currently always `function`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The called function.
    pub function: Function,
}

/// Function invoked by a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Function description.
    pub desc: String,
    /// `tool`, `knowledge` or `workflow`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Arguments, JSON encoded.
    pub arguments: String,
}

/// Token counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
}

/// Reply fragment carried by a streaming chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delta {
    /// `assistant` for model output, `tool` for tool output.
    pub role: String,
    /// Content fragment.
    pub content: String,
    /// For `tool` fragments, the id of the tool call this answers.
    pub tool_call_id: String,
    /// Tool calls the model generated.
    pub tool_calls: Vec<ToolCall>,
    /// Time spent on the current step, in milliseconds.
    pub time_cost: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_response_decodes() {
        let resp: SessionResponse = serde_json::from_value(json!({
            "id": "req-1",
            "created": 1_717_000_000,
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": "你好！",
                    "steps": [{
                        "role": "tool",
                        "content": "{\"weather\":\"sunny\"}",
                        "tool_call_id": "call-1",
                        "tool_calls": [],
                        "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7},
                        "time_cost": 120
                    }]
                }
            }],
            "assistant_id": "asst-1",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(resp.id, "req-1");
        assert_eq!(resp.text(), "你好！");
        assert_eq!(resp.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(resp.usage.total_tokens, 15);
        let steps = &resp.choices[0].message.as_ref().unwrap().steps;
        assert_eq!(steps[0].tool_call_id, "call-1");
        assert_eq!(steps[0].usage.total_tokens, 7);
    }

    #[test]
    fn test_stream_chunk_decodes_delta() {
        let event: StreamEvent = serde_json::from_value(json!({
            "id": "req-2",
            "created": 1_717_000_001,
            "choices": [{
                "index": 0,
                "finish_reason": "",
                "delta": {
                    "role": "assistant",
                    "content": "你",
                    "tool_calls": [{
                        "id": "call-9",
                        "type": "function",
                        "function": {"name": "search", "desc": "web search", "type": "tool", "arguments": "{}"}
                    }],
                    "time_cost": 15
                }
            }]
        }))
        .unwrap();

        let choice = &event.choices[0];
        assert_eq!(choice.finish_reason, None);
        assert!(choice.message.is_none());
        assert_eq!(event.text(), "你");
        let delta = choice.delta.as_ref().unwrap();
        assert_eq!(delta.tool_calls[0].kind, "function");
        assert_eq!(delta.tool_calls[0].function.name, "search");
        assert_eq!(delta.time_cost, 15);
    }

    #[test]
    fn test_finish_reasons() {
        for (wire, expected) in [
            ("sensitive", FinishReason::Sensitive),
            ("tool_fail", FinishReason::ToolFail),
            ("length", FinishReason::Other("length".to_string())),
        ] {
            let choice: Choice =
                serde_json::from_value(json!({"finish_reason": wire})).unwrap();
            assert_eq!(choice.finish_reason, Some(expected));
        }

        let choice: Choice = serde_json::from_value(json!({"finish_reason": null})).unwrap();
        assert_eq!(choice.finish_reason, None);
    }

    #[test]
    fn test_empty_object_is_default() {
        let resp: SessionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp, SessionResponse::default());
        assert_eq!(resp.text(), "");
        assert!(resp.finish_reason().is_none());
    }

    #[test]
    fn test_wrong_field_type_is_an_error() {
        let result = serde_json::from_value::<SessionResponse>(json!({"id": 42}));
        assert!(result.is_err());
    }
}
