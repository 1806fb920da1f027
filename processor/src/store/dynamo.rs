use super::{EventStore, ScanPolicy};
use crate::errors::{Error, Result};
use crate::model::{event_time, Event, EventType, Reading};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_json::Number;
use std::collections::HashMap;
use tracing::debug;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed event table.
#[derive(Clone)]
pub struct DynamoEventStore {
    client: Client,
}

impl DynamoEventStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl EventStore for DynamoEventStore {
    async fn put(&self, table: &str, event: &Event) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_item(event)))
            .send()
            .await
            .map_err(|e| Error::KeyValueStore(DisplayErrorContext(e).to_string()))?;

        debug!(table, device_id = %event.device_id, "event stored");
        Ok(())
    }

    async fn scan(&self, table: &str, policy: ScanPolicy) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let mut start_key: Option<Item> = None;
        let mut pages = 0;

        while policy.allows(pages) {
            let output = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| Error::KeyValueStore(DisplayErrorContext(e).to_string()))?;
            pages += 1;

            for item in output.items() {
                events.push(from_item(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(table, pages, items = events.len(), "scan complete");
        Ok(events)
    }
}

/// Numbers go in as `N`, decimal strings as `S`, so a read gives back the
/// same representation that was written.
pub fn to_item(event: &Event) -> Item {
    let value = match &event.value {
        Reading::Number(n) => AttributeValue::N(n.to_string()),
        Reading::Decimal(s) => AttributeValue::S(s.clone()),
    };

    HashMap::from([
        ("device_id".to_string(), AttributeValue::S(event.device_id.clone())),
        (
            "event_type".to_string(),
            AttributeValue::S(event.event_type.as_str().to_string()),
        ),
        ("value".to_string(), value),
        ("timestamp".to_string(), AttributeValue::S(event.timestamp_str())),
    ])
}

pub fn from_item(item: &Item) -> Result<Event> {
    let value = match item.get("value") {
        Some(AttributeValue::N(n)) => Reading::Number(
            n.parse::<Number>()
                .map_err(|_| Error::MalformedItem(format!("`value` {} is not a number", n)))?,
        ),
        Some(AttributeValue::S(s)) => Reading::Decimal(s.clone()),
        _ => {
            return Err(Error::MalformedItem(
                "item has no numeric `value` attribute".to_string(),
            ))
        }
    };

    Ok(Event {
        device_id: string_attr(item, "device_id")?.clone(),
        event_type: string_attr(item, "event_type")?
            .parse::<EventType>()
            .map_err(Error::MalformedItem)?,
        value,
        timestamp: event_time::parse(string_attr(item, "timestamp")?)
            .map_err(Error::MalformedItem)?,
    })
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a String> {
    item.get(name)
        .ok_or_else(|| Error::MalformedItem(format!("item has no `{}` attribute", name)))?
        .as_s()
        .map_err(|_| Error::MalformedItem(format!("`{}` is not a string attribute", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(value: Reading) -> Event {
        Event {
            device_id: "device-3".to_string(),
            event_type: EventType::Humidity,
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
        }
    }

    #[test]
    fn test_item_attributes() {
        let item = to_item(&event(Reading::Number(Number::from_f64(55.5).unwrap())));
        assert_eq!(item["value"], AttributeValue::N("55.5".to_string()));
        assert_eq!(
            item["timestamp"],
            AttributeValue::S("2024-05-06T07:08:09Z".to_string())
        );
        assert_eq!(item["event_type"], AttributeValue::S("humidity".to_string()));
    }

    #[test]
    fn test_item_keeps_value_representation() {
        for value in [
            Reading::Number(12.into()),
            Reading::Number(Number::from_f64(12.5).unwrap()),
            Reading::Decimal("12.00".to_string()),
        ] {
            let original = event(value);
            assert_eq!(from_item(&to_item(&original)).unwrap(), original);
        }
    }

    #[test]
    fn test_malformed_items() {
        let mut item = to_item(&event(Reading::Number(1.into())));
        item.remove("device_id");
        assert!(matches!(from_item(&item), Err(Error::MalformedItem(_))));

        let mut item = to_item(&event(Reading::Number(1.into())));
        item.insert("event_type".to_string(), AttributeValue::S("noise".to_string()));
        assert!(matches!(from_item(&item), Err(Error::MalformedItem(_))));

        let mut item = to_item(&event(Reading::Number(1.into())));
        item.insert("value".to_string(), AttributeValue::Bool(true));
        assert!(matches!(from_item(&item), Err(Error::MalformedItem(_))));
    }
}
