use chrono::Utc;
use serde::{ Deserialize, Serialize };

pub const DONE_SENTINEL: &str = "[DONE]";

/// One unit of the relay's outbound line protocol.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum RelayFrame {
    #[serde(rename = "content")] Content {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(skip)]
    Done,
}

impl RelayFrame {
    pub fn content(fragment: impl Into<String>) -> Self {
        RelayFrame::Content {
            content: fragment.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Renders the frame as `data: ...` followed by a blank line.
    pub fn encode(&self) -> String {
        let payload = match self {
            RelayFrame::Done => DONE_SENTINEL.to_string(),
            frame =>
                serde_json
                    ::to_string(frame)
                    .unwrap_or_else(|_| String::from(r#"{"type":"error","message":"encode"}"#)),
        };
        format!("data: {}\n\n", payload)
    }
}
