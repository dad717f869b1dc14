//! Resolution of reference sets into the records they point at.
//!
//! A source record (a user's favorites) holds identifiers of target records
//! (recipes). Resolving reads the source record, deduplicates the
//! identifiers, and batch-reads the targets in chunks. Targets that no longer
//! exist are left out; the call still succeeds.

use crate::config::FanOutConfig;
use crate::error::Result;
use crate::record::{self, Key, Record, Value};
use crate::store::DocumentStore;

use std::collections;

/// Flatten the references held by `value` into a deduplicated set.
///
/// Accepts a string set, a list (of strings or numbers), a single string or a
/// single number. Anything else holds no references, and neither does an
/// empty string wherever it appears.
pub fn collect_references(value: &Value) -> collections::BTreeSet<String> {
    let mut references = collections::BTreeSet::new();
    gather(value, &mut references);
    references
}

fn gather(value: &Value, references: &mut collections::BTreeSet<String>) {
    match value {
        Value::StringSet(items) => {
            references.extend(items.iter().filter(|item| !item.is_empty()).cloned())
        }
        Value::List(items) => {
            for item in items {
                match item {
                    Value::String(_) | Value::Number(_) => gather(item, references),
                    _ => {}
                }
            }
        }
        Value::String(item) | Value::Number(item) => {
            if !item.is_empty() {
                references.insert(item.clone());
            }
        }
        Value::Null | Value::Bool(_) | Value::Map(_) => {}
    }
}

/// Batch-read the records of `collection` whose `key_attribute` is one of
/// `references`, at most `batch_size` keys per request.
pub async fn resolve_references<S: DocumentStore>(
    store: &S,
    collection: &str,
    key_attribute: &str,
    references: collections::BTreeSet<String>,
    batch_size: usize,
) -> Result<Vec<Record>> {
    let keys: Vec<Key> = references
        .into_iter()
        .map(|reference| record::key(key_attribute, reference))
        .collect();
    let mut records = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(batch_size.max(1)) {
        records.extend(store.batch_get(collection, chunk.to_vec()).await?);
    }
    #[cfg(feature = "tracing")]
    if records.len() < keys.len() {
        tracing::debug!(
            collection,
            missing = keys.len() - records.len(),
            "dropping dangling references"
        );
    }
    Ok(records)
}

/// Resolves an owner's reference set.
#[derive(Debug)]
pub struct FanOut<'a, S> {
    store: &'a S,
    config: FanOutConfig,
}

impl<'a, S: DocumentStore> FanOut<'a, S> {
    /// Resolver over `store`.
    pub fn new(store: &'a S, config: FanOutConfig) -> Self {
        Self { store, config }
    }

    /// Target records referenced by `owner`, in no particular order.
    ///
    /// An owner without a source record, or without references, resolves to
    /// an empty list.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.resolve", skip(self), err)
    )]
    pub async fn resolve(&self, owner: &str) -> Result<Vec<Record>> {
        let source = self
            .store
            .get(
                &self.config.source_collection,
                record::key(&self.config.source_key, owner),
            )
            .await?;
        let references = source
            .as_ref()
            .and_then(|source| source.get(&self.config.references_attribute))
            .map(collect_references)
            .unwrap_or_default();
        if references.is_empty() {
            return Ok(Vec::new());
        }
        resolve_references(
            self.store,
            &self.config.target_collection,
            &self.config.target_key,
            references,
            self.config.effective_batch_size(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        Condition, KeySchema, QueryRequest, ScanPage, ScanRequest, Update, memory::MemoryStore,
    };

    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recipe(id: &str) -> Record {
        Record::from([
            ("Id".to_string(), Value::from(id)),
            ("Title".to_string(), Value::from(format!("recipe {id}"))),
        ])
    }

    fn favorites(user: &str, references: Value) -> Record {
        Record::from([
            ("UserID".to_string(), Value::from(user)),
            ("RecipeIDs".to_string(), references),
        ])
    }

    fn store(recipes: &[&str]) -> MemoryStore {
        let store = MemoryStore::new()
            .with_collection("Recipes", KeySchema::new("Id"))
            .with_collection("Favorites", KeySchema::new("UserID"));
        for id in recipes {
            store.insert("Recipes", recipe(id)).unwrap();
        }
        store
    }

    fn ids(mut records: Vec<Record>) -> Vec<String> {
        records.sort();
        records
            .into_iter()
            .filter_map(|record| record["Id"].as_str().map(str::to_string))
            .collect()
    }

    #[rstest]
    #[case::string_set(Value::string_set(["5", "7"]), vec!["5", "7"])]
    #[case::list_with_duplicates(
        Value::List(vec![Value::from("5"), Value::from("5"), Value::from("7")]),
        vec!["5", "7"]
    )]
    #[case::list_of_numbers(
        Value::List(vec![Value::from(5_u64), Value::from("5"), Value::Bool(true)]),
        vec!["5"]
    )]
    #[case::single_string(Value::from("9"), vec!["9"])]
    #[case::single_number(Value::from(9_u64), vec!["9"])]
    #[case::empty_string(Value::from(""), vec![])]
    #[case::string_set_with_empty(Value::string_set(["", "5"]), vec!["5"])]
    #[case::list_with_empty(Value::List(vec![Value::from(""), Value::from("7")]), vec!["7"])]
    #[case::map(Value::Map(Default::default()), vec![])]
    #[case::null(Value::Null, vec![])]
    fn test_collect_references(#[case] value: Value, #[case] expected: Vec<&str>) {
        let actual: Vec<_> = collect_references(&value).into_iter().collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_resolve_deduplicates() {
        let store = store(&["5", "7", "8"]);
        let references = Value::List(vec![Value::from("5"), Value::from("5"), Value::from("7")]);
        store.insert("Favorites", favorites("u", references)).unwrap();
        let resolver = FanOut::new(&store, FanOutConfig::default());
        let actual = resolver.resolve("u").await.unwrap();
        assert_eq!(ids(actual), vec!["5", "7"]);
    }

    #[tokio::test]
    async fn test_resolve_drops_dangling_references() {
        let store = store(&["5"]);
        store
            .insert("Favorites", favorites("u", Value::string_set(["5", "404"])))
            .unwrap();
        let resolver = FanOut::new(&store, FanOutConfig::default());
        let actual = resolver.resolve("u").await.unwrap();
        assert_eq!(ids(actual), vec!["5"]);
    }

    #[rstest]
    #[case::no_record(None)]
    #[case::no_attribute(Some(Record::from([("UserID".to_string(), Value::from("u"))])))]
    #[case::empty_list(Some(favorites("u", Value::List(vec![]))))]
    #[tokio::test]
    async fn test_resolve_without_references(#[case] source: Option<Record>) {
        let store = store(&["5"]);
        if let Some(source) = source {
            store.insert("Favorites", source).unwrap();
        }
        let resolver = FanOut::new(&store, FanOutConfig::default());
        assert!(resolver.resolve("u").await.unwrap().is_empty());
    }

    /// Counts batch reads and their sizes.
    struct Counting {
        inner: MemoryStore,
        batches: AtomicUsize,
        largest: AtomicUsize,
    }

    impl DocumentStore for Counting {
        async fn get(&self, collection: &str, key: Key) -> Result<Option<Record>> {
            self.inner.get(collection, key).await
        }

        async fn put(
            &self,
            collection: &str,
            record: Record,
            condition: Option<Condition>,
        ) -> Result<()> {
            self.inner.put(collection, record, condition).await
        }

        async fn update(
            &self,
            collection: &str,
            key: Key,
            updates: Vec<Update>,
            condition: Option<Condition>,
        ) -> Result<Record> {
            self.inner.update(collection, key, updates, condition).await
        }

        async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage> {
            self.inner.scan(collection, request).await
        }

        async fn query(&self, collection: &str, request: QueryRequest) -> Result<Vec<Record>> {
            self.inner.query(collection, request).await
        }

        async fn batch_get(&self, collection: &str, keys: Vec<Key>) -> Result<Vec<Record>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.largest.fetch_max(keys.len(), Ordering::SeqCst);
            self.inner.batch_get(collection, keys).await
        }
    }

    fn counting(recipes: &[&str]) -> Counting {
        Counting {
            inner: store(recipes),
            batches: AtomicUsize::new(0),
            largest: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_empty_reference_never_read() {
        let store = counting(&["5"]);
        store
            .inner
            .insert("Favorites", favorites("u", Value::string_set([""])))
            .unwrap();
        let actual = FanOut::new(&store, FanOutConfig::default())
            .resolve("u")
            .await
            .unwrap();
        assert!(actual.is_empty());
        assert_eq!(store.batches.load(Ordering::SeqCst), 0);
    }

    #[rstest]
    #[case::one_chunk(100, 1, 7)]
    #[case::chunked(3, 3, 3)]
    #[case::one_per_request(1, 7, 1)]
    #[tokio::test]
    async fn test_resolve_in_chunks(
        #[case] batch_size: usize,
        #[case] expected_batches: usize,
        #[case] expected_largest: usize,
    ) {
        let recipes = ["1", "2", "3", "4", "5", "6", "7"];
        let store = counting(&recipes);
        store
            .inner
            .insert("Favorites", favorites("u", Value::string_set(recipes)))
            .unwrap();
        let config = FanOutConfig {
            batch_size,
            ..Default::default()
        };
        let actual = FanOut::new(&store, config).resolve("u").await.unwrap();
        assert_eq!(ids(actual), recipes.to_vec());
        assert_eq!(store.batches.load(Ordering::SeqCst), expected_batches);
        assert_eq!(store.largest.load(Ordering::SeqCst), expected_largest);
    }
}
