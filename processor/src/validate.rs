use crate::errors::{Error, Result};
use crate::model::Event;
use serde_json::Value;

/// Fields every event must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["device_id", "event_type", "value", "timestamp"];

/// Decodes an ingestion request into an [`Event`].
///
/// The request is either the event object itself or an API Gateway proxy
/// envelope whose `body` holds the event as JSON text. Nothing is accepted
/// unless all four fields are present, non-null and non-empty and the typed
/// decode succeeds.
pub fn decode_request(request: Value) -> Result<Event> {
    let payload = unwrap_envelope(request)?;
    validate_fields(&payload)?;

    serde_json::from_value::<Event>(payload).map_err(|e| Error::Validation(e.to_string()))
}

fn unwrap_envelope(request: Value) -> Result<Value> {
    let mut map = match request {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    match map.remove("body") {
        None => Ok(Value::Object(map)),
        Some(Value::String(body)) => serde_json::from_str(&body)
            .map_err(|e| Error::Validation(format!("request body is not valid JSON: {}", e))),
        Some(body @ Value::Object(_)) => Ok(body),
        Some(_) => Err(Error::Validation(
            "request body must be a JSON string or object".to_string(),
        )),
    }
}

fn validate_fields(payload: &Value) -> Result<()> {
    let Value::Object(map) = payload else {
        return Err(Error::Validation("event must be a JSON object".to_string()));
    };

    for field in REQUIRED_FIELDS {
        let present = match map.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(Error::Validation(format!(
                "missing required field `{}`",
                field
            )));
        }
    }

    Ok(())
}
