//! Backend seams. Handlers only see these traits; the AWS and MySQL
//! implementations live in the submodules and `crate::db`, the in-memory ones
//! in `crate::memory`.

pub mod dynamo;
pub mod s3;
pub mod sns;

use crate::errors::{Error, Result};
use crate::model::{Event, EventRow};
use crate::params::DatabaseSettings;
use async_trait::async_trait;
use std::str::FromStr;

pub use dynamo::DynamoEventStore;
pub use s3::S3ObjectStore;
pub use sns::SnsTopic;

/// How far a scan walks the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// A single scan call; whatever the backend returns in its first page.
    #[default]
    FirstPage,
    /// Follow continuation keys until the table is exhausted.
    AllPages,
    /// Follow continuation keys for at most this many pages.
    MaxPages(usize),
}

impl ScanPolicy {
    /// Whether another page may be fetched after `pages_read` pages.
    pub fn allows(&self, pages_read: usize) -> bool {
        match self {
            ScanPolicy::FirstPage => pages_read == 0,
            ScanPolicy::AllPages => true,
            ScanPolicy::MaxPages(max) => pages_read < *max,
        }
    }
}

impl FromStr for ScanPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first-page" => Ok(ScanPolicy::FirstPage),
            "all" => Ok(ScanPolicy::AllPages),
            other => other
                .strip_prefix("pages:")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .map(ScanPolicy::MaxPages)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "SCAN_POLICY must be `first-page`, `all` or `pages:<n>`, got `{}`",
                        other
                    ))
                }),
        }
    }
}

/// Hot store the ingestion handler writes and the batch processor reads.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes the event as is; an item with the same key is overwritten.
    async fn put(&self, table: &str, event: &Event) -> Result<()>;

    /// Reads events without removing them.
    async fn scan(&self, table: &str, policy: ScanPolicy) -> Result<Vec<Event>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

#[async_trait]
pub trait NotificationTopic: Send + Sync {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()>;
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Inserts all rows or none of them. Returns the number of rows written.
    async fn insert_events(&self, database: &DatabaseSettings, rows: &[EventRow]) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_policy_parsing() {
        assert_eq!("first-page".parse::<ScanPolicy>().unwrap(), ScanPolicy::FirstPage);
        assert_eq!("all".parse::<ScanPolicy>().unwrap(), ScanPolicy::AllPages);
        assert_eq!("pages:5".parse::<ScanPolicy>().unwrap(), ScanPolicy::MaxPages(5));
        assert!("pages:0".parse::<ScanPolicy>().is_err());
        assert!("pages:x".parse::<ScanPolicy>().is_err());
    }

    #[test]
    fn test_scan_policy_limits() {
        assert!(ScanPolicy::FirstPage.allows(0));
        assert!(!ScanPolicy::FirstPage.allows(1));
        assert!(ScanPolicy::AllPages.allows(1_000));
        assert!(ScanPolicy::MaxPages(2).allows(1));
        assert!(!ScanPolicy::MaxPages(2).allows(2));
    }
}
