//! Line codec for the push-event stream.
//!
//! One event per line. Two envelope shapes are accepted:
//!
//! ```text
//! {"event":"taskDeleted","data":"65f0..."}
//! ["taskDeleted","65f0..."]
//! ```
//!
//! The array form is what socket-style servers emit for a named event with a
//! single argument. Blank lines are keep-alives. Events with a name outside
//! [`EVENT_NAMES`] decode to `None` so newer servers can add events without
//! breaking older clients.

use serde_json::{Value, json};
use tracing::debug;

use super::{EVENT_NAMES, PushEvent};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed event line: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event envelope has no event name")]
    MissingName,

    #[error("invalid payload for '{name}': {source}")]
    Payload {
        name: String,
        source: serde_json::Error,
    },
}

/// Decode one line of the stream.
///
/// # Errors
///
/// Returns [`CodecError`] when the line is not JSON, has no event name, or a
/// known event carries a payload of the wrong shape.
pub fn decode_line(line: &str) -> Result<Option<PushEvent>, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)?;
    let (name, data) = match value {
        Value::Object(mut map) => {
            let name = match map.remove("event") {
                Some(Value::String(name)) => name,
                _ => return Err(CodecError::MissingName),
            };
            (name, map.remove("data").unwrap_or(Value::Null))
        }
        Value::Array(items) => {
            let mut items = items.into_iter();
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(CodecError::MissingName),
            };
            (name, items.next().unwrap_or(Value::Null))
        }
        _ => return Err(CodecError::MissingName),
    };

    if !EVENT_NAMES.contains(&name.as_str()) {
        debug!(event = %name, "skipping unknown push event");
        return Ok(None);
    }

    serde_json::from_value(json!({ "event": name, "data": data }))
        .map(Some)
        .map_err(|source| CodecError::Payload { name, source })
}

/// Encode an event as one stream line (no trailing newline).
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_line(event: &PushEvent) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskId, TaskStatus};

    const TASK: &str = r#"{"_id":"t1","title":"a","description":"","status":"completed","todoAppId":"ws1","createdBy":"u1","priority":"low","createdAt":"2025-01-01T00:00:00Z","updatedAt":"2025-01-01T00:00:00Z"}"#;

    #[test]
    fn decodes_object_envelope() {
        let line = format!(r#"{{"event":"taskUpdated","data":{TASK}}}"#);
        let Some(PushEvent::TaskUpdated(task)) = decode_line(&line).unwrap() else {
            panic!("expected taskUpdated");
        };
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn decodes_array_envelope() {
        let line = r#"["taskDeleted","t1"]"#;
        assert_eq!(
            decode_line(line).unwrap(),
            Some(PushEvent::TaskDeleted(TaskId::new("t1")))
        );
    }

    #[test]
    fn blank_and_unknown_lines_are_skipped() {
        assert!(decode_line("").unwrap().is_none());
        assert!(decode_line("   ").unwrap().is_none());
        assert!(
            decode_line(r#"{"event":"userTyping","data":{}}"#)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn malformed_lines_error() {
        assert!(matches!(decode_line("{nope"), Err(CodecError::Json(_))));
        assert!(matches!(
            decode_line(r#"{"data":1}"#),
            Err(CodecError::MissingName)
        ));
        assert!(matches!(decode_line("42"), Err(CodecError::MissingName)));
        assert!(matches!(
            decode_line(r#"{"event":"taskCreated","data":{"_id":"x"}}"#),
            Err(CodecError::Payload { .. })
        ));
    }

    #[test]
    fn encode_then_decode_preserves_event() {
        let event = PushEvent::TaskDeleted(TaskId::new("t7"));
        let line = encode_line(&event).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(decode_line(&line).unwrap(), Some(event));
    }
}
