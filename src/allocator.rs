//! Collision-free identifier allocation.
//!
//! The store has no auto-increment. [`IdAllocator`] derives a candidate
//! identifier, then writes the new record with a condition that its key is
//! absent. Two allocators racing on the same candidate both try the write;
//! the store lets exactly one through and the other starts over with a fresh
//! candidate. Uniqueness rests entirely on the conditional write being atomic
//! per item; the candidate derivation may read stale data.
//!
//! With [`AllocationStrategy::ScanMax`] every attempt scans the whole
//! collection (key attribute only), so an attempt costs O(collection size).
//! That is a scaling ceiling of the scheme, acceptable for small collections.
//! [`AllocationStrategy::Counter`] replaces the scan with one atomic increment
//! of a counter record.

use crate::config::{AllocationStrategy, AllocatorConfig};
use crate::error::{Error, Result};
use crate::record::{self, Record, Value};
use crate::store::{self, Condition, DocumentStore, ScanRequest, Update};

/// Highest key that reads as a non-negative integer, or 0.
pub(crate) fn highest_id<'a>(keys: impl IntoIterator<Item = &'a Value>) -> u64 {
    keys.into_iter()
        .filter_map(|value| match value {
            Value::String(id) | Value::Number(id) => Some(id.as_str()),
            _ => None,
        })
        .filter(|id| !id.is_empty() && id.bytes().all(|byte| byte.is_ascii_digit()))
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// Allocates identifiers for new records.
///
/// ```rust
/// use recipe_store::allocator::IdAllocator;
/// use recipe_store::record::Record;
/// use recipe_store::store::{KeySchema, memory::MemoryStore};
///
/// # async fn example() -> Result<(), recipe_store::error::Error> {
/// let store = MemoryStore::new().with_collection("Recipes", KeySchema::new("Id"));
/// let allocator = IdAllocator::new(&store, Default::default());
/// let (id, stored) = allocator.allocate("Recipes", Record::new()).await?;
/// assert_eq!(id, "1");
/// assert_eq!(stored["Id"].as_str(), Some("1"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IdAllocator<'a, S> {
    store: &'a S,
    config: AllocatorConfig,
}

impl<'a, S: DocumentStore> IdAllocator<'a, S> {
    /// Allocator over `store`.
    pub fn new(store: &'a S, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    /// Store `record` under a fresh identifier and return the identifier
    /// together with the record as written.
    ///
    /// Any key attribute already in `record` is overwritten. Attempts run one
    /// after the other; after `max_attempts` lost races the call fails with
    /// [`Error::AllocationExhausted`], which callers should surface as
    /// retryable. Store failures are returned at once, without retry.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.allocate", skip(self, record), err)
    )]
    pub async fn allocate(
        &self,
        collection: &str,
        mut record: Record,
    ) -> Result<(String, Record)> {
        let key_attribute = &self.config.key_attribute;
        let mut attempts = 0;
        while attempts < self.config.max_attempts {
            attempts += 1;
            let candidate = self.next_candidate(collection).await?.to_string();
            record.insert(key_attribute.clone(), Value::String(candidate.clone()));
            let condition = Condition::AttributeNotExists(key_attribute.clone());
            match self
                .store
                .put(collection, record.clone(), Some(condition))
                .await
            {
                Ok(()) => return Ok((candidate, record)),
                Err(Error::ConditionFailed) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(collection, candidate, attempts, "identifier taken, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::AllocationExhausted {
            collection: collection.to_string(),
            attempts,
        })
    }

    async fn next_candidate(&self, collection: &str) -> Result<u64> {
        match &self.config.strategy {
            AllocationStrategy::ScanMax => {
                let request = ScanRequest {
                    projection: Some(vec![self.config.key_attribute.clone()]),
                    ..Default::default()
                };
                let records = store::scan_all(self.store, collection, request).await?;
                let highest = highest_id(
                    records
                        .iter()
                        .filter_map(|record| record.get(&self.config.key_attribute)),
                );
                highest
                    .checked_add(1)
                    .ok_or_else(|| Error::UnsupportedValue(format!("{collection} id overflow")))
            }
            AllocationStrategy::Counter {
                collection: counters,
                key_attribute,
                value_attribute,
            } => {
                let counter = self
                    .store
                    .update(
                        counters,
                        record::key(key_attribute, collection),
                        vec![Update::Add(value_attribute.clone(), Value::from(1_u64))],
                        None,
                    )
                    .await?;
                match counter.get(value_attribute) {
                    Some(Value::Number(value)) => value.parse::<u64>().map_err(|_| {
                        Error::UnsupportedValue(format!("counter {collection}: {value}"))
                    }),
                    other => Err(Error::UnsupportedValue(format!(
                        "counter {collection}: {other:?}"
                    ))),
                }
            }
        }
    }
}
