//! AWS Lambda entry point for the batch processor. The trigger payload is
//! ignored; every invocation processes whatever the event table holds.

use aws_config::BehaviorVersion;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use processor::batch::BatchProcessor;
use processor::config::Config;
use processor::db::MySqlEventStore;
use processor::params::{ParameterResolver, SsmParameterStore};
use processor::store::{DynamoEventStore, S3ObjectStore};
use processor::{logging, metrics, HandlerResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;
    logging::init(config.log_format);
    metrics::init_metrics();

    info!(scan_policy = ?config.scan_policy, "Lambda cold start - initializing batch processor");

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let params = ParameterResolver::new(
        Arc::new(SsmParameterStore::new(&aws)),
        config.parameter_prefix.clone(),
    );
    let processor = BatchProcessor::new(
        params,
        Arc::new(DynamoEventStore::new(&aws)),
        Arc::new(S3ObjectStore::new(&aws)),
        Arc::new(MySqlEventStore::new()),
        config.processed_prefix,
    )
    .with_scan_policy(config.scan_policy);

    lambda_runtime::run(service_fn(|_event: LambdaEvent<Value>| {
        let processor = processor.clone();
        async move { Ok::<HandlerResponse, Error>(processor.handle().await) }
    }))
    .await
}
