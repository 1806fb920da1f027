//! Batch stage: read everything from the hot store, derive Celsius for
//! temperature readings, load into the relational table and archive the batch.
//!
//! Runs are not idempotent. Nothing is removed from the hot store, so every
//! run inserts every stored event again.

use crate::errors::{Error, ErrorKind, Result};
use crate::metrics::{self, BACKEND_FAILURES_TOTAL, BATCH_LATENCY_SECONDS, BATCH_ROWS_TOTAL};
use crate::model::{Event, EventRow, EventType, HandlerResponse, ProcessedEvent, ROW_TIME_FORMAT};
use crate::params::{BatchSettings, ParameterResolver};
use crate::store::{EventStore, ObjectStore, RelationalStore, ScanPolicy};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub const NO_DATA_MESSAGE: &str = "No new data to process";
pub const PROCESSED_MESSAGE: &str = "Data processed and saved successfully";

/// `(f - 32) * 5 / 9`, rounded to two decimals.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    ((fahrenheit - 32.0) * 5.0 / 9.0 * 100.0).round() / 100.0
}

pub fn transform(events: Vec<Event>) -> Result<Vec<ProcessedEvent>> {
    events
        .into_iter()
        .map(|event| {
            let value_celsius = match event.event_type {
                EventType::Temperature => Some(fahrenheit_to_celsius(numeric_value(&event)?)),
                _ => None,
            };
            Ok(ProcessedEvent {
                event,
                value_celsius,
            })
        })
        .collect()
}

pub fn to_row(processed: &ProcessedEvent) -> Result<EventRow> {
    let event = &processed.event;
    Ok(EventRow {
        device_id: event.device_id.clone(),
        event_type: event.event_type.as_str().to_string(),
        value: numeric_value(event)?,
        value_celsius: processed.value_celsius,
        timestamp: event.timestamp.format(ROW_TIME_FORMAT).to_string(),
    })
}

fn numeric_value(event: &Event) -> Result<f64> {
    event.value.as_f64().ok_or_else(|| {
        Error::MalformedItem(format!(
            "value `{}` of {} is not numeric",
            event.value, event.device_id
        ))
    })
}

/// Object key of a processed batch archived at `at`.
pub fn processed_object_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}/processed_events_{}.json", prefix, at.format("%Y%m%d%H%M%S"))
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The hot store was empty; nothing was written.
    Empty,
    Processed { rows: u64, key: String },
}

#[derive(Clone)]
pub struct BatchProcessor {
    params: ParameterResolver,
    events: Arc<dyn EventStore>,
    objects: Arc<dyn ObjectStore>,
    relational: Arc<dyn RelationalStore>,
    processed_prefix: String,
    scan_policy: ScanPolicy,
}

impl BatchProcessor {
    pub fn new(
        params: ParameterResolver,
        events: Arc<dyn EventStore>,
        objects: Arc<dyn ObjectStore>,
        relational: Arc<dyn RelationalStore>,
        processed_prefix: impl Into<String>,
    ) -> Self {
        Self {
            params,
            events,
            objects,
            relational,
            processed_prefix: processed_prefix.into(),
            scan_policy: ScanPolicy::default(),
        }
    }

    pub fn with_scan_policy(mut self, policy: ScanPolicy) -> Self {
        self.scan_policy = policy;
        self
    }

    pub async fn handle(&self) -> HandlerResponse {
        let response = match self.run().await {
            Ok(BatchOutcome::Empty) => {
                info!("No events in store, nothing to process");
                HandlerResponse::ok(NO_DATA_MESSAGE)
            }
            Ok(BatchOutcome::Processed { rows, key }) => {
                info!(rows, key = %key, "Batch processed");
                HandlerResponse::ok(PROCESSED_MESSAGE)
            }
            Err(e) => {
                BACKEND_FAILURES_TOTAL.inc();
                let kind: ErrorKind = e.kind();
                error!(?kind, "Error in batch processor: {}", e);
                HandlerResponse::from_error(&e)
            }
        };
        metrics::log_snapshot("batch");
        response
    }

    pub async fn run(&self) -> Result<BatchOutcome> {
        let start = Instant::now();
        let settings = BatchSettings::resolve(&self.params).await?;

        let events = self.events.scan(&settings.table, self.scan_policy).await?;
        if events.is_empty() {
            return Ok(BatchOutcome::Empty);
        }
        info!(count = events.len(), policy = ?self.scan_policy, "Fetched events");

        let processed = transform(events)?;
        let rows = processed.iter().map(to_row).collect::<Result<Vec<_>>>()?;

        let inserted = self
            .relational
            .insert_events(&settings.database, &rows)
            .await?;
        BATCH_ROWS_TOTAL.inc_by(inserted as f64);

        let key = processed_object_key(&self.processed_prefix, Utc::now());
        let body = serde_json::to_vec(&processed)?;
        self.objects
            .put_object(&settings.bucket, &key, body, "application/json")
            .await?;

        BATCH_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        Ok(BatchOutcome::Processed {
            rows: inserted,
            key,
        })
    }
}
