use crate::errors::Result;
use crate::metrics::ALERTS_PUBLISHED_TOTAL;
use crate::model::{Event, EventType, Reading};
use crate::store::NotificationTopic;
use std::sync::Arc;
use tracing::info;

/// Temperatures strictly above this trigger an alert.
pub const TEMPERATURE_ALERT_THRESHOLD: f64 = 100.0;

pub const ALERT_SUBJECT: &str = "High Temperature Alert!";

pub fn alert_message(device_id: &str, value: &Reading) -> String {
    format!(
        "WARNING: High temperature detected!\nDevice: {}\nTemperature: {}°C",
        device_id, value
    )
}

/// Whether `event` is a temperature reading over the threshold.
pub fn should_alert(event: &Event) -> bool {
    event.event_type == EventType::Temperature
        && event
            .value
            .as_f64()
            .is_some_and(|v| v > TEMPERATURE_ALERT_THRESHOLD)
}

#[derive(Clone)]
pub struct AlertNotifier {
    topic: Arc<dyn NotificationTopic>,
}

impl AlertNotifier {
    pub fn new(topic: Arc<dyn NotificationTopic>) -> Self {
        Self { topic }
    }

    /// Publishes the alert. Failures are returned as is; nothing is retried.
    pub async fn notify(&self, topic_arn: &str, device_id: &str, value: &Reading) -> Result<()> {
        let message = alert_message(device_id, value);
        self.topic.publish(topic_arn, ALERT_SUBJECT, &message).await?;

        ALERTS_PUBLISHED_TOTAL.inc();
        info!(device_id, value = %value, "High temperature alert sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTopic;
    use chrono::Utc;

    fn temperature(value: f64) -> Event {
        Event {
            device_id: "device-7".to_string(),
            event_type: EventType::Temperature,
            value: Reading::Number(serde_json::Number::from_f64(value).unwrap()),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!should_alert(&temperature(100.0)));
        assert!(should_alert(&temperature(100.01)));
        assert!(!should_alert(&temperature(42.0)));
    }

    #[test]
    fn test_only_temperature_alerts() {
        let mut event = temperature(250.0);
        event.event_type = EventType::Humidity;
        assert!(!should_alert(&event));
        event.event_type = EventType::Motion;
        assert!(!should_alert(&event));
    }

    #[test]
    fn test_decimal_readings_are_compared_numerically() {
        let mut event = temperature(0.0);
        event.value = Reading::Decimal("100.50".to_string());
        assert!(should_alert(&event));
        event.value = Reading::Decimal("100.00".to_string());
        assert!(!should_alert(&event));
    }

    #[tokio::test]
    async fn test_notify_publishes_message() {
        let topic = Arc::new(MemoryTopic::new());
        let notifier = AlertNotifier::new(topic.clone());

        notifier
            .notify("arn:topic", "device-7", &Reading::Number(212.into()))
            .await
            .unwrap();

        let published = topic.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic_arn, "arn:topic");
        assert_eq!(published[0].subject, ALERT_SUBJECT);
        assert!(published[0].message.contains("device-7"));
        assert!(published[0].message.contains("212"));
    }
}
