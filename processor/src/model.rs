use crate::errors::Error;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::fmt;

/// Producer wire format: ISO-8601 UTC at second precision.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Relational column format.
pub const ROW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of reading a device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Temperature,
    Humidity,
    Motion,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Temperature => "temperature",
            EventType::Humidity => "humidity",
            EventType::Motion => "motion",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(EventType::Temperature),
            "humidity" => Ok(EventType::Humidity),
            "motion" => Ok(EventType::Motion),
            other => Err(format!("unknown event type `{}`", other)),
        }
    }
}

/// A numeric reading, kept in the representation the producer chose so it can
/// be stored and archived verbatim.
///
/// `Number` is a JSON number exactly as sent (`212` stays an integer),
/// `Decimal` a JSON string holding a fixed-point decimal such as `"42.50"`.
/// Both decode only when numeric and finite.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Number(Number),
    Decimal(String),
}

impl Reading {
    /// Numeric value of the reading. A `Decimal` that does not parse yields
    /// `None`; decoding rejects those, but items read back from a store are
    /// not re-validated.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Number(n) => n.as_f64(),
            Reading::Decimal(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Number(n) => write!(f, "{}", n),
            Reading::Decimal(s) => f.write_str(s),
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Number(n) => n.serialize(serializer),
            Reading::Decimal(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ReadingVisitor;

        impl<'de> Visitor<'de> for ReadingVisitor {
            type Value = Reading;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or a numeric string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Reading, E> {
                Number::from_f64(v)
                    .map(Reading::Number)
                    .ok_or_else(|| E::custom(format!("value `{}` is not finite", v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Reading, E> {
                Ok(Reading::Number(v.into()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Reading, E> {
                Ok(Reading::Number(v.into()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Reading, E> {
                let reading = Reading::Decimal(v.to_string());
                match reading.as_f64() {
                    Some(_) => Ok(reading),
                    None => Err(E::custom(format!("value `{}` is not numeric", v))),
                }
            }
        }

        deserializer.deserialize_any(ReadingVisitor)
    }
}

/// Serde adapter for the producer timestamp format.
pub mod event_time {
    use super::EVENT_TIME_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(EVENT_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    /// Accepts only the producer format, and only when formatting the parsed
    /// value gives back `raw` unchanged. Offsets, fractional seconds and
    /// unpadded fields are rejected, so the stored timestamp is the one the
    /// producer sent.
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let naive = NaiveDateTime::parse_from_str(raw, EVENT_TIME_FORMAT).map_err(|e| {
            format!(
                "invalid timestamp `{}`: {} (expected YYYY-MM-DDTHH:MM:SSZ)",
                raw, e
            )
        })?;
        if naive.format(EVENT_TIME_FORMAT).to_string() != raw {
            return Err(format!(
                "invalid timestamp `{}`: expected YYYY-MM-DDTHH:MM:SSZ",
                raw
            ));
        }
        Ok(naive.and_utc())
    }
}

/// One telemetry event as produced by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub device_id: String,
    pub event_type: EventType,
    pub value: Reading,
    #[serde(with = "event_time")]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Timestamp in the producer wire format.
    pub fn timestamp_str(&self) -> String {
        self.timestamp.format(EVENT_TIME_FORMAT).to_string()
    }
}

/// Event enriched by the batch stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_celsius: Option<f64>,
}

/// Row written to the relational table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub device_id: String,
    pub event_type: String,
    pub value: f64,
    pub value_celsius: Option<f64>,
    pub timestamp: String,
}

/// Row read back by the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredRow {
    pub id: i64,
    pub device_id: String,
    pub event_type: String,
    pub value: f64,
    pub value_celsius: Option<f64>,
    pub timestamp: chrono::NaiveDateTime,
}

/// Dashboard API response wrapper
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub data: Vec<StoredRow>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// API Gateway proxy response. `body` is itself JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn new(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    pub fn ok(message: &str) -> Self {
        Self::new(200, message)
    }

    /// Collapses an error into the coarse response callers see: a client
    /// error with detail for bad input, a generic server error otherwise.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Validation(detail) => {
                Self::new(err.status_code(), &format!("Invalid event data: {}", detail))
            }
            _ => Self::new(err.status_code(), "Internal server error"),
        }
    }

    /// Message carried in the body, if the body is well formed.
    pub fn message(&self) -> Option<String> {
        let body: serde_json::Value = serde_json::from_str(&self.body).ok()?;
        body.get("message")?.as_str().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = Event {
            device_id: "device-7".to_string(),
            event_type: EventType::Temperature,
            value: Reading::Decimal("98.60".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(
            encoded,
            json!({
                "device_id": "device-7",
                "event_type": "temperature",
                "value": "98.60",
                "timestamp": "2024-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn test_reading_accepts_integers_and_numeric_strings() {
        let r: Reading = serde_json::from_value(json!(212)).unwrap();
        assert_eq!(r, Reading::Number(212.into()));
        assert_eq!(r.to_string(), "212");
        assert_eq!(serde_json::to_value(&r).unwrap(), json!(212));

        let r: Reading = serde_json::from_value(json!(98.6)).unwrap();
        assert_eq!(r.as_f64(), Some(98.6));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!(98.6));

        let r: Reading = serde_json::from_value(json!("10.25")).unwrap();
        assert_eq!(r.as_f64(), Some(10.25));
    }

    #[test]
    fn test_reading_rejects_non_numeric() {
        assert!(serde_json::from_value::<Reading>(json!("hot")).is_err());
        assert!(serde_json::from_value::<Reading>(json!(true)).is_err());
        assert!(serde_json::from_value::<Reading>(json!(null)).is_err());
    }

    #[test]
    fn test_timestamp_requires_producer_format() {
        let ts = event_time::parse("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        for raw in [
            "2024-01-01T02:00:00+02:00",
            "2024-01-01T00:00:00.750Z",
            "2024-1-1T0:0:0Z",
            "2024-01-01 00:00:00",
            "yesterday",
        ] {
            assert!(event_time::parse(raw).is_err(), "{}", raw);
        }
    }

    #[test]
    fn test_processed_event_omits_missing_celsius() {
        let processed = ProcessedEvent {
            event: Event {
                device_id: "device-1".to_string(),
                event_type: EventType::Motion,
                value: Reading::Number(1.into()),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            value_celsius: None,
        };

        let encoded = serde_json::to_value(&processed).unwrap();
        assert!(encoded.get("value_celsius").is_none());
        assert_eq!(encoded["device_id"], "device-1");
    }

    #[test]
    fn test_handler_response_shape() {
        let response = HandlerResponse::new(400, "Invalid event data");
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["statusCode"], 400);
        assert_eq!(response.message().as_deref(), Some("Invalid event data"));
    }

    #[test]
    fn test_error_responses_hide_backend_detail() {
        let response = HandlerResponse::from_error(&Error::Validation(
            "missing required field `value`".to_string(),
        ));
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.message().as_deref(),
            Some("Invalid event data: missing required field `value`")
        );

        let response =
            HandlerResponse::from_error(&Error::ObjectStore("AccessDenied: bucket x".to_string()));
        assert_eq!(response.status_code, 500);
        assert_eq!(response.message().as_deref(), Some("Internal server error"));
    }
}
