//! In-memory backends.
//!
//! Used by the test suites and for running the handlers locally without AWS.
//! Each store can be told to fail so error paths can be exercised.

use crate::errors::{Error, Result};
use crate::model::{Event, EventRow};
use crate::params::{DatabaseSettings, ParameterStore};
use crate::store::{EventStore, NotificationTopic, ObjectStore, RelationalStore, ScanPolicy};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryParameterStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.values).insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        lock(&self.values).remove(name);
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn get(&self, name: &str) -> Result<String> {
        lock(&self.values)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }
}

/// Event tables keyed by `(device_id, timestamp)`, kept in insertion order.
pub struct MemoryEventStore {
    tables: Mutex<HashMap<String, Vec<Event>>>,
    page_size: usize,
    fail: AtomicBool,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::with_page_size(usize::MAX)
    }

    /// Scans return at most `page_size` events per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self, table: &str) -> Vec<Event> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::KeyValueStore("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn put(&self, table: &str, event: &Event) -> Result<()> {
        self.check()?;
        let mut tables = lock(&self.tables);
        let items = tables.entry(table.to_string()).or_default();
        match items
            .iter_mut()
            .find(|e| e.device_id == event.device_id && e.timestamp == event.timestamp)
        {
            Some(existing) => *existing = event.clone(),
            None => items.push(event.clone()),
        }
        Ok(())
    }

    async fn scan(&self, table: &str, policy: ScanPolicy) -> Result<Vec<Event>> {
        self.check()?;
        let items = self.events(table);
        let mut out = Vec::new();
        let mut pages = 0;

        for page in items.chunks(self.page_size) {
            if !policy.allows(pages) {
                break;
            }
            out.extend_from_slice(page);
            pages += 1;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    fail: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ObjectStore("simulated outage".to_string()));
        }
        lock(&self.objects).insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic_arn: String,
    pub subject: String,
    pub message: String,
}

#[derive(Default)]
pub struct MemoryTopic {
    published: Mutex<Vec<PublishedMessage>>,
    fail: AtomicBool,
}

impl MemoryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl NotificationTopic for MemoryTopic {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Notification("simulated outage".to_string()));
        }
        lock(&self.published).push(PublishedMessage {
            topic_arn: topic_arn.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Relational tables with the same all-or-nothing batch semantics as the
/// MySQL store.
#[derive(Default)]
pub struct MemoryRelationalStore {
    tables: Mutex<HashMap<String, Vec<EventRow>>>,
    fail_at_row: Mutex<Option<usize>>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next batches fail when inserting the row at `index`.
    pub fn fail_at_row(&self, index: Option<usize>) {
        *lock(&self.fail_at_row) = index;
    }

    pub fn rows(&self, table: &str) -> Vec<EventRow> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RelationalStore for MemoryRelationalStore {
    async fn insert_events(&self, database: &DatabaseSettings, rows: &[EventRow]) -> Result<u64> {
        let mut pending = Vec::with_capacity(rows.len());
        let fail_at = *lock(&self.fail_at_row);

        for (i, row) in rows.iter().enumerate() {
            if fail_at == Some(i) {
                return Err(Error::Database(sqlx::Error::Protocol(format!(
                    "simulated failure at row {}",
                    i
                ))));
            }
            pending.push(row.clone());
        }

        lock(&self.tables)
            .entry(database.table.clone())
            .or_default()
            .extend(pending);
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, Reading};
    use chrono::{Duration, TimeZone, Utc};

    fn event(n: i64) -> Event {
        Event {
            device_id: format!("device-{}", n),
            event_type: EventType::Motion,
            value: Reading::Number(n.into()),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n),
        }
    }

    #[test]
    fn test_put_overwrites_same_key() {
        tokio_test::block_on(async {
            let store = MemoryEventStore::new();
            let mut e = event(1);
            store.put("t", &e).await.unwrap();
            e.value = Reading::Number(99.into());
            store.put("t", &e).await.unwrap();

            assert_eq!(store.events("t"), vec![e]);
        });
    }

    #[test]
    fn test_relational_failure_keeps_table_untouched() {
        tokio_test::block_on(async {
            let store = MemoryRelationalStore::new();
            let settings = DatabaseSettings {
                host: "localhost".to_string(),
                port: 3306,
                username: "u".to_string(),
                password: "p".to_string(),
                database: "d".to_string(),
                table: "rows".to_string(),
            };
            let row = EventRow {
                device_id: "device-1".to_string(),
                event_type: "motion".to_string(),
                value: 1.0,
                value_celsius: None,
                timestamp: "2024-01-01 00:00:00".to_string(),
            };

            store.fail_at_row(Some(1));
            assert!(store
                .insert_events(&settings, &[row.clone(), row.clone()])
                .await
                .is_err());
            assert!(store.rows("rows").is_empty());

            store.fail_at_row(None);
            assert_eq!(store.insert_events(&settings, &[row.clone(), row]).await.unwrap(), 2);
            assert_eq!(store.rows("rows").len(), 2);
        });
    }

    #[tokio::test]
    async fn test_scan_honours_policy() {
        let store = MemoryEventStore::with_page_size(2);
        for n in 0..5 {
            store.put("t", &event(n)).await.unwrap();
        }

        assert_eq!(store.scan("t", ScanPolicy::FirstPage).await.unwrap().len(), 2);
        assert_eq!(store.scan("t", ScanPolicy::MaxPages(2)).await.unwrap().len(), 4);
        assert_eq!(store.scan("t", ScanPolicy::AllPages).await.unwrap().len(), 5);
        assert!(store.scan("other", ScanPolicy::AllPages).await.unwrap().is_empty());
    }
}
