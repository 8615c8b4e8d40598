use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const TIMESTAMP_FIELD: &str = "@timestamp";
pub const LEVEL_FIELD: &str = "level";
pub const DEFAULT_LEVEL: &str = "INFO";

/// One structured log event: a JSON object of arbitrary fields.
pub type LogRecord = Map<String, Value>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("record is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("record must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Serialize a record into one newline-terminated JSON frame.
///
/// Missing `@timestamp` and `level` fields are filled in before encoding.
pub fn encode_frame<R: Serialize + ?Sized>(record: &R) -> Result<Vec<u8>, FrameError> {
    let mut object = match serde_json::to_value(record)? {
        Value::Object(object) => object,
        other => return Err(FrameError::NotAnObject(json_type_name(&other))),
    };

    synthesize_defaults(&mut object);

    let mut frame = serde_json::to_vec(&object)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Insert `@timestamp` and `level` when the record lacks them.
pub fn synthesize_defaults(record: &mut LogRecord) {
    if !record.contains_key(TIMESTAMP_FIELD) {
        record.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    if !record.contains_key(LEVEL_FIELD) {
        record.insert(LEVEL_FIELD.to_string(), Value::String(DEFAULT_LEVEL.to_string()));
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Routing fields merged into every record of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

fn default_tenant() -> String {
    "default".to_string()
}

fn default_source() -> String {
    "api_upload".to_string()
}

impl Default for RoutingMetadata {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant(),
            source: default_source(),
            environment: None,
            task_id: None,
        }
    }
}

impl RoutingMetadata {
    /// Overwrite the routing keys of `record` with this metadata.
    pub fn apply(&self, record: &mut LogRecord) {
        record.insert("tenant_id".to_string(), Value::String(self.tenant_id.clone()));
        record.insert("source".to_string(), Value::String(self.source.clone()));
        if let Some(environment) = &self.environment {
            record.insert("environment".to_string(), Value::String(environment.clone()));
        }
        if let Some(task_id) = &self.task_id {
            record.insert("task_id".to_string(), Value::String(task_id.clone()));
        }
    }

    pub fn apply_all(&self, records: &mut [LogRecord]) {
        for record in records {
            self.apply(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn record(value: Value) -> LogRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_frame_is_single_newline_terminated_line() {
        let r = record(json!({"message": "line one\nline two", "level": "WARN"}));
        let frame = encode_frame(&r).unwrap();

        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|&&b| b == b'\n').count(), 1);

        let decoded: Value = serde_json::from_slice(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded["message"], "line one\nline two");
        assert_eq!(decoded["level"], "WARN");
    }

    #[test]
    fn test_missing_timestamp_and_level_are_synthesized() {
        let frame = encode_frame(&record(json!({"message": "x"}))).unwrap();
        let decoded: Value = serde_json::from_slice(&frame).unwrap();

        assert_eq!(decoded[LEVEL_FIELD], DEFAULT_LEVEL);
        let ts = decoded[TIMESTAMP_FIELD].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_existing_timestamp_is_kept() {
        let r = record(json!({"@timestamp": "2024-03-01T00:00:00Z", "message": "x"}));
        let frame = encode_frame(&r).unwrap();
        let decoded: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(decoded[TIMESTAMP_FIELD], "2024-03-01T00:00:00Z");
    }

    #[test]
    fn test_non_string_keys_fail_to_serialize() {
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), "value");
        assert!(matches!(encode_frame(&bad), Err(FrameError::Serialize(_))));
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(matches!(
            encode_frame(&vec![1, 2, 3]),
            Err(FrameError::NotAnObject("array"))
        ));
    }

    #[test]
    fn test_routing_metadata_overrides_routing_keys() {
        let mut r = record(json!({"message": "x", "tenant_id": "spoofed"}));
        let metadata = RoutingMetadata {
            tenant_id: "acme".to_string(),
            environment: Some("prod".to_string()),
            ..RoutingMetadata::default()
        };

        metadata.apply(&mut r);

        assert_eq!(r["tenant_id"], "acme");
        assert_eq!(r["source"], "api_upload");
        assert_eq!(r["environment"], "prod");
        assert!(!r.contains_key("task_id"));
        assert_eq!(r["message"], "x");
    }
}
