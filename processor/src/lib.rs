//! Serverless processing side of the IoT event pipeline.
//!
//! * [`ingest`] accepts one event, stores it, archives it and raises alerts.
//! * [`batch`] moves everything in the hot store into the relational table.
//! * [`rest`] serves the stored rows.
//!
//! Backends sit behind the traits in [`store`] and [`params`]; the binaries
//! wire in the AWS and MySQL implementations, tests use [`memory`].

pub mod alert;
pub mod batch;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod params;
pub mod rest;
pub mod store;
pub mod validate;

pub use errors::{Error, ErrorKind, Result};
pub use model::{Event, EventType, HandlerResponse, ProcessedEvent, Reading};
