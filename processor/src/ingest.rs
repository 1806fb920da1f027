//! Single-event ingestion: validate, store, archive, maybe alert.

use crate::alert::{should_alert, AlertNotifier};
use crate::errors::{ErrorKind, Result};
use crate::metrics::{self, BACKEND_FAILURES_TOTAL, EVENTS_ACCEPTED_TOTAL, EVENTS_REJECTED_TOTAL};
use crate::model::{Event, HandlerResponse};
use crate::params::{IngestSettings, ParameterResolver};
use crate::store::{EventStore, ObjectStore};
use crate::validate::decode_request;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const ACCEPTED_MESSAGE: &str = "Event processed successfully";

/// Object key of the raw archive copy of `event`.
pub fn raw_object_key(prefix: &str, event: &Event) -> String {
    format!(
        "{}/{}-{}.json",
        prefix,
        event.device_id,
        event.timestamp_str().replace(':', "-")
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub event: Event,
    pub raw_key: String,
    pub alerted: bool,
}

#[derive(Clone)]
pub struct IngestHandler {
    params: ParameterResolver,
    events: Arc<dyn EventStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: AlertNotifier,
    raw_prefix: String,
}

impl IngestHandler {
    pub fn new(
        params: ParameterResolver,
        events: Arc<dyn EventStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: AlertNotifier,
        raw_prefix: impl Into<String>,
    ) -> Self {
        Self {
            params,
            events,
            objects,
            notifier,
            raw_prefix: raw_prefix.into(),
        }
    }

    /// Entry point: one request in, one gateway response out.
    pub async fn handle(&self, request: Value) -> HandlerResponse {
        let response = match self.process(request).await {
            Ok(outcome) => {
                EVENTS_ACCEPTED_TOTAL.inc();
                info!(
                    device_id = %outcome.event.device_id,
                    event_type = %outcome.event.event_type,
                    key = %outcome.raw_key,
                    alerted = outcome.alerted,
                    "Event processed"
                );
                HandlerResponse::ok(ACCEPTED_MESSAGE)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::Validation => {
                        EVENTS_REJECTED_TOTAL.inc();
                        warn!("Rejected event: {}", e);
                    }
                    kind => {
                        BACKEND_FAILURES_TOTAL.inc();
                        error!(?kind, "Error processing event: {}", e);
                    }
                }
                HandlerResponse::from_error(&e)
            }
        };
        metrics::log_snapshot("ingest");
        response
    }

    /// Validation happens before any backend is touched, so a rejected
    /// request leaves no trace in either store.
    pub async fn process(&self, request: Value) -> Result<IngestOutcome> {
        let event = decode_request(request)?;
        let settings = IngestSettings::resolve(&self.params).await?;

        self.events.put(&settings.table, &event).await?;

        let raw_key = raw_object_key(&self.raw_prefix, &event);
        let body = serde_json::to_vec(&event)?;
        self.objects
            .put_object(&settings.bucket, &raw_key, body, "application/json")
            .await?;

        let alerted = should_alert(&event);
        if alerted {
            self.notifier
                .notify(&settings.topic_arn, &event.device_id, &event.value)
                .await?;
        }

        Ok(IngestOutcome {
            event,
            raw_key,
            alerted,
        })
    }
}
