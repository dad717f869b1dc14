//! Document store adapter.
//!
//! [`DocumentStore`] is the single seam between the access core and the
//! database. It exposes the primitives a DynamoDB-style store offers:
//! single-item reads and writes (optionally guarded by a server-side
//! condition), bounded scans that hand back a resume point, partition queries
//! and batch reads.
//!
//! Two implementations ship with the crate:
//! - [`dynamo::DynamoStore`] - backed by the AWS SDK client
//! - [`memory::MemoryStore`] - in-process, for tests and embedding

/// DynamoDB-backed store.
pub mod dynamo;

/// Expression building for DynamoDB requests.
pub(crate) mod expression;

/// In-memory store.
pub mod memory;

use crate::error::{Error, Result};
use crate::record::{Key, Record, Value};

use std::future::Future;

/// Maximum number of keys a single batch read may carry.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Key attributes of a collection.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeySchema {
    /// The partition key attribute.
    pub partition_key: String,
    /// The sort key attribute, for collections with composite keys.
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Schema with a single partition key.
    pub fn new(partition_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            sort_key: None,
        }
    }

    /// Schema with a partition key and a sort key.
    pub fn composite(partition_key: &str, sort_key: &str) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            sort_key: Some(sort_key.to_string()),
        }
    }

    /// The key attributes of `record`.
    pub fn key_of(&self, collection: &str, record: &Record) -> Result<Key> {
        let mut key = Key::new();
        for attribute in std::iter::once(&self.partition_key).chain(self.sort_key.as_ref()) {
            let value = record.get(attribute).ok_or_else(|| Error::MissingKey {
                collection: collection.to_string(),
                attribute: attribute.clone(),
            })?;
            key.insert(attribute.clone(), value.clone());
        }
        Ok(key)
    }

    /// Whether `key` has exactly this schema's key attributes, each holding a
    /// string or a number.
    pub fn accepts(&self, key: &Key) -> bool {
        let expected = 1 + usize::from(self.sort_key.is_some());
        key.len() == expected
            && std::iter::once(&self.partition_key)
                .chain(self.sort_key.as_ref())
                .all(|attribute| {
                    matches!(
                        key.get(attribute),
                        Some(Value::String(_) | Value::Number(_))
                    )
                })
    }
}

/// Predicate evaluated by the store against the current stored item.
///
/// ```rust
/// use recipe_store::store::Condition;
///
/// let fresh = Condition::AttributeNotExists("Id".to_string());
/// let owned = Condition::Equals("UserId".to_string(), "u-1".into());
/// let both = Condition::And(vec![fresh, owned]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// The attribute is present.
    AttributeExists(String),
    /// The attribute is absent (also true when the item does not exist).
    AttributeNotExists(String),
    /// The attribute equals the value.
    Equals(String, Value),
    /// All conditions hold.
    And(Vec<Condition>),
}

impl Condition {
    /// Evaluate against the current item, `None` meaning no item is stored.
    pub fn matches(&self, record: Option<&Record>) -> bool {
        let attribute = |name: &str| record.and_then(|record| record.get(name));
        match self {
            Self::AttributeExists(name) => attribute(name).is_some(),
            Self::AttributeNotExists(name) => attribute(name).is_none(),
            Self::Equals(name, value) => attribute(name) == Some(value),
            Self::And(conditions) => conditions.iter().all(|condition| condition.matches(record)),
        }
    }
}

/// A single attribute mutation applied by [`DocumentStore::update`].
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// Assign the value.
    Set(String, Value),
    /// Add to a number, or union into a set; creates the attribute if absent.
    Add(String, Value),
    /// Remove the elements from a set; an emptied set disappears.
    Delete(String, Value),
    /// Remove the attribute.
    Remove(String),
}

/// Parameters of a single bounded scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanRequest {
    /// Resume after this key.
    pub exclusive_start_key: Option<Key>,
    /// Filter applied to evaluated items (after `limit`).
    pub filter: Option<Condition>,
    /// Maximum number of items evaluated.
    pub limit: Option<usize>,
    /// Attributes to return; all attributes when `None`.
    pub projection: Option<Vec<String>>,
}

/// One page of scan results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPage {
    /// Items that passed the filter.
    pub items: Vec<Record>,
    /// Where the next scan resumes; `None` once the collection is exhausted.
    pub last_evaluated_key: Option<Key>,
}

/// Parameters of a partition query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    /// Partition key attribute.
    pub partition_key: String,
    /// Partition key value.
    pub partition_value: Value,
    /// Return items in descending sort key order.
    pub descending: bool,
    /// Filter applied to evaluated items (after `limit`).
    pub filter: Option<Condition>,
    /// Maximum number of items evaluated.
    pub limit: Option<usize>,
}

impl QueryRequest {
    /// Query every item of one partition in ascending order.
    pub fn partition(partition_key: &str, partition_value: impl Into<Value>) -> Self {
        Self {
            partition_key: partition_key.to_string(),
            partition_value: partition_value.into(),
            descending: false,
            filter: None,
            limit: None,
        }
    }
}

/// Typed operations of a key-value document store.
///
/// # Invariants
///
/// - `put` and `update` evaluate `condition` and write atomically for the
///   item; a failed condition is reported as [`Error::ConditionFailed`] and
///   nothing is written
/// - `update` creates the item when it does not exist and no condition
///   forbids it, and returns the item as stored afterwards
/// - `batch_get` silently omits keys with no stored item
/// - store failures are returned unchanged, never retried here
pub trait DocumentStore: Send + Sync {
    /// Read one item; `None` when absent.
    fn get(
        &self,
        collection: &str,
        key: Key,
    ) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Create or replace one item.
    fn put(
        &self,
        collection: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Mutate one item and return it as stored afterwards.
    fn update(
        &self,
        collection: &str,
        key: Key,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> impl Future<Output = Result<Record>> + Send;

    /// Run one bounded scan.
    fn scan(
        &self,
        collection: &str,
        request: ScanRequest,
    ) -> impl Future<Output = Result<ScanPage>> + Send;

    /// Read items of one partition, ordered by sort key.
    fn query(
        &self,
        collection: &str,
        request: QueryRequest,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;

    /// Read many items by key, in no particular order.
    fn batch_get(
        &self,
        collection: &str,
        keys: Vec<Key>,
    ) -> impl Future<Output = Result<Vec<Record>>> + Send;
}

/// Scan a whole collection, following every resume point.
pub async fn scan_all<S: DocumentStore>(
    store: &S,
    collection: &str,
    mut request: ScanRequest,
) -> Result<Vec<Record>> {
    let mut items = Vec::new();
    loop {
        let page = store.scan(collection, request.clone()).await?;
        items.extend(page.items);
        match page.last_evaluated_key {
            Some(key) => request.exclusive_start_key = Some(key),
            None => return Ok(items),
        }
    }
}
