//! AWS Lambda entry point for the ingestion handler.
//!
//! Accepts API Gateway proxy events or bare event objects.

use aws_config::BehaviorVersion;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use processor::alert::AlertNotifier;
use processor::config::Config;
use processor::ingest::IngestHandler;
use processor::params::{ParameterResolver, SsmParameterStore};
use processor::store::{DynamoEventStore, S3ObjectStore, SnsTopic};
use processor::{logging, metrics, HandlerResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    logging::init(config.log_format);
    metrics::init_metrics();

    info!("Lambda cold start - initializing ingestion handler");

    // Clients are built once and reused across invocations.
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let params = ParameterResolver::new(
        Arc::new(SsmParameterStore::new(&aws)),
        config.parameter_prefix.clone(),
    );
    let handler = IngestHandler::new(
        params,
        Arc::new(DynamoEventStore::new(&aws)),
        Arc::new(S3ObjectStore::new(&aws)),
        AlertNotifier::new(Arc::new(SnsTopic::new(&aws))),
        config.raw_prefix,
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move { Ok::<HandlerResponse, Error>(handler.handle(event.payload).await) }
    }))
    .await
}
