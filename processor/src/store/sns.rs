use super::NotificationTopic;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use tracing::debug;

#[derive(Clone)]
pub struct SnsTopic {
    client: Client,
}

impl SnsTopic {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl NotificationTopic for SnsTopic {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::Notification(DisplayErrorContext(e).to_string()))?;

        debug!(topic_arn, message_id = ?output.message_id(), "notification published");
        Ok(())
    }
}
