pub mod upstream;

use serde::Deserialize;

use crate::error::{ RelayError, Result };

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls `choices[0].delta.content` out of an OpenAI-style stream chunk.
///
/// `Ok(None)` covers chunks that carry no text (role announcements, finish
/// reasons, empty deltas).
pub fn extract_delta(payload: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json
        ::from_str(payload)
        .map_err(|e| RelayError::MalformedFrame(e.to_string()))?;

    Ok(
        chunk.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_choice_delta() {
        let payload = r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hel"}},{"delta":{"content":"no"}}]}"#;
        assert_eq!(extract_delta(payload).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn textless_chunks_are_not_fragments() {
        assert_eq!(extract_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(), None);
        assert_eq!(extract_delta(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap(), None);
        assert_eq!(extract_delta(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap(), None);
        assert_eq!(extract_delta(r#"{"choices":[]}"#).unwrap(), None);
        assert_eq!(extract_delta(r#"{"usage":{"total_tokens":3}}"#).unwrap(), None);
    }

    #[test]
    fn broken_json_is_a_malformed_frame() {
        assert!(matches!(extract_delta("{\"choices\":[{"), Err(RelayError::MalformedFrame(_))));
        assert!(matches!(extract_delta("[DONE"), Err(RelayError::MalformedFrame(_))));
    }
}
