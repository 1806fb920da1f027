use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Temperature,
    Humidity,
    Motion,
}

pub const EVENT_TYPES: [EventType; 3] = [
    EventType::Temperature,
    EventType::Humidity,
    EventType::Motion,
];
pub const DEVICE_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
/// Readings are drawn in hundredths so both encodings carry two decimals.
const VALUE_RANGE_HUNDREDTHS: std::ops::RangeInclusive<u32> = 1_000..=10_000;

/// How the reading is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueEncoding {
    /// JSON number, e.g. `42.17`
    Float,
    /// JSON string with two fractional digits, e.g. `"42.10"`
    Decimal,
}

/// Reading as it goes on the wire: a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Float(f64),
    Decimal(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub device_id: String,
    pub event_type: EventType,
    pub value: Reading,
    pub timestamp: String,
}

pub fn generate(rng: &mut impl Rng, encoding: ValueEncoding) -> Event {
    generate_at(rng, encoding, Utc::now())
}

pub fn generate_at(rng: &mut impl Rng, encoding: ValueEncoding, now: DateTime<Utc>) -> Event {
    let device = rng.gen_range(DEVICE_RANGE);
    let event_type = EVENT_TYPES.choose(rng).copied().unwrap_or(EVENT_TYPES[0]);
    let hundredths = rng.gen_range(VALUE_RANGE_HUNDREDTHS);

    let value = match encoding {
        ValueEncoding::Float => Reading::Float(hundredths as f64 / 100.0),
        ValueEncoding::Decimal => {
            Reading::Decimal(format!("{}.{:02}", hundredths / 100, hundredths % 100))
        }
    };

    Event {
        device_id: format!("device-{}", device),
        event_type,
        value,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_events_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let event = generate(&mut rng, ValueEncoding::Float);

            let n: u32 = event.device_id.strip_prefix("device-").unwrap().parse().unwrap();
            assert!(DEVICE_RANGE.contains(&n));
            assert!(EVENT_TYPES.contains(&event.event_type));

            let value = match event.value {
                Reading::Float(v) => v,
                other => panic!("expected a float reading, got {:?}", other),
            };
            assert!((10.0..=100.0).contains(&value));
            assert_eq!((value * 100.0).round() / 100.0, value);
        }
    }

    #[test]
    fn test_decimal_encoding() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let event = generate(&mut rng, ValueEncoding::Decimal);
            let Reading::Decimal(text) = &event.value else {
                panic!("expected a decimal reading, got {:?}", event.value);
            };
            let (_, fraction) = text.split_once('.').unwrap();
            assert_eq!(fraction.len(), 2);
            let value: f64 = text.parse().unwrap();
            assert!((10.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_timestamp_has_second_precision() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::milliseconds(1_250);
        let event = generate_at(&mut rng, ValueEncoding::Float, now);
        assert_eq!(event.timestamp, "2024-01-01T00:00:01Z");
    }

    #[test]
    fn test_wire_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        let event = generate(&mut rng, ValueEncoding::Float);
        let json = serde_json::to_value(&event).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["device_id", "event_type", "value", "timestamp"] {
            assert!(keys.contains(&key));
        }
        assert!(json["value"].is_number());
        assert!(["temperature", "humidity", "motion"].contains(&json["event_type"].as_str().unwrap()));

        let event = generate(&mut rng, ValueEncoding::Decimal);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["value"].is_string());
    }
}
