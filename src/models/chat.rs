use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// A plain string or an array of content parts.
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

/// Body accepted by `POST /api/chat` and forwarded upstream.
///
/// Unknown fields, here and on each message, are kept in `extra` so provider
/// options pass through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            extra: Map::new(),
        }
    }

    /// Fills in what the upstream needs to answer with an event-stream.
    pub fn prepare_for_upstream(mut self, default_model: Option<&str>) -> Self {
        if self.model.is_none() {
            self.model = default_model.map(str::to_string);
        }
        self.extra.entry("stream").or_insert(Value::Bool(true));
        self
    }
}
