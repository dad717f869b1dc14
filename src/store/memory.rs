use crate::error::{Error, Result};
use crate::record::{Key, Record, Value};
use crate::store::{
    Condition, DocumentStore, KeySchema, QueryRequest, ScanPage, ScanRequest, Update,
};

use parking_lot::Mutex;
use std::{collections, ops};

#[derive(Debug, Default)]
struct MemoryCollection {
    schema: KeySchema,
    items: collections::BTreeMap<Key, Record>,
}

/// In-process document store.
///
/// Items of a collection are kept ordered by key, so scans are deterministic.
/// Every operation first yields to the async runtime, which lets concurrent
/// callers interleave between store calls the way they would against a
/// remote store; the condition check and the write itself happen under one
/// lock, which makes conditional writes atomic per item.
///
/// ```rust
/// use recipe_store::store::{KeySchema, memory::MemoryStore};
///
/// let store = MemoryStore::new()
///     .with_collection("Recipes", KeySchema::new("Id"))
///     .with_collection("Reviews", KeySchema::composite("RecipeId", "CreatedAt"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<collections::HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    /// Empty store without collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection with its key schema.
    pub fn with_collection(mut self, name: &str, schema: KeySchema) -> Self {
        self.collections.get_mut().insert(
            name.to_string(),
            MemoryCollection {
                schema,
                ..Default::default()
            },
        );
        self
    }

    /// Store a record without any condition, outside of the async API.
    pub fn insert(&self, collection: &str, record: Record) -> Result<()> {
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let key = target.schema.key_of(collection, &record)?;
        target.items.insert(key, record);
        Ok(())
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> Result<usize> {
        let mut collections = self.collections.lock();
        Ok(lookup(&mut collections, collection)?.items.len())
    }

    /// Whether a collection holds no records.
    pub fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.len(collection)? == 0)
    }
}

fn lookup<'a>(
    collections: &'a mut collections::HashMap<String, MemoryCollection>,
    collection: &str,
) -> Result<&'a mut MemoryCollection> {
    collections
        .get_mut(collection)
        .ok_or_else(|| Error::UnknownCollection(collection.to_string()))
}

fn project(record: &Record, projection: Option<&[String]>) -> Record {
    match projection {
        Some(attributes) => record
            .iter()
            .filter(|(name, _)| attributes.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => record.clone(),
    }
}

fn add_numbers(left: &str, right: &str) -> Option<String> {
    if let (Ok(left), Ok(right)) = (left.parse::<i128>(), right.parse::<i128>()) {
        return left.checked_add(right).map(|sum| sum.to_string());
    }
    let sum = left.parse::<f64>().ok()? + right.parse::<f64>().ok()?;
    sum.is_finite().then(|| sum.to_string())
}

fn apply(record: &mut Record, update: Update) -> Result<()> {
    match update {
        Update::Set(name, value) => {
            record.insert(name, value);
        }
        Update::Remove(name) => {
            record.remove(&name);
        }
        Update::Add(name, value) => {
            let merged = match (record.remove(&name), value) {
                (None, value @ (Value::Number(_) | Value::StringSet(_))) => value,
                (Some(Value::Number(current)), Value::Number(delta)) => {
                    let sum = add_numbers(&current, &delta).ok_or_else(|| {
                        Error::InvalidUpdate(format!("cannot add {delta} to {current}"))
                    })?;
                    Value::Number(sum)
                }
                (Some(Value::StringSet(mut current)), Value::StringSet(added)) => {
                    current.extend(added);
                    Value::StringSet(current)
                }
                (current, value) => {
                    return Err(Error::InvalidUpdate(format!(
                        "ADD {value:?} to {current:?} on {name}"
                    )));
                }
            };
            record.insert(name, merged);
        }
        Update::Delete(name, value) => match (record.remove(&name), value) {
            (None, Value::StringSet(_)) => {}
            (Some(Value::StringSet(mut current)), Value::StringSet(removed)) => {
                current.retain(|item| !removed.contains(item));
                if !current.is_empty() {
                    record.insert(name, Value::StringSet(current));
                }
            }
            (current, value) => {
                return Err(Error::InvalidUpdate(format!(
                    "DELETE {value:?} from {current:?} on {name}"
                )));
            }
        },
    }
    Ok(())
}

fn touches_key(update: &Update, key: &Key) -> bool {
    let name = match update {
        Update::Set(name, _)
        | Update::Add(name, _)
        | Update::Delete(name, _)
        | Update::Remove(name) => name,
    };
    key.contains_key(name)
}

impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, key: Key) -> Result<Option<Record>> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        Ok(target.items.get(&key).cloned())
    }

    async fn put(
        &self,
        collection: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<()> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let key = target.schema.key_of(collection, &record)?;
        if let Some(condition) = condition {
            if !condition.matches(target.items.get(&key)) {
                return Err(Error::ConditionFailed);
            }
        }
        target.items.insert(key, record);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: Key,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> Result<Record> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let key = target.schema.key_of(collection, &key)?;
        let current = target.items.get(&key);
        if let Some(condition) = condition {
            if !condition.matches(current) {
                return Err(Error::ConditionFailed);
            }
        }
        if let Some(update) = updates.iter().find(|update| touches_key(update, &key)) {
            return Err(Error::InvalidUpdate(format!(
                "cannot update key attribute: {update:?}"
            )));
        }
        let mut record = current.cloned().unwrap_or_else(|| key.clone());
        for update in updates {
            apply(&mut record, update)?;
        }
        target.items.insert(key, record.clone());
        Ok(record)
    }

    async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let lower = match request.exclusive_start_key {
            Some(key) => ops::Bound::Excluded(key),
            None => ops::Bound::Unbounded,
        };
        let mut remaining = target.items.range((lower, ops::Bound::Unbounded));
        let limit = request.limit.unwrap_or(usize::MAX);
        let evaluated: Vec<_> = remaining.by_ref().take(limit).collect();
        let exhausted = remaining.next().is_none();
        let last_evaluated_key = match evaluated.last() {
            Some((key, _)) if !exhausted => Some((*key).clone()),
            _ => None,
        };
        let items = evaluated
            .into_iter()
            .map(|(_, record)| record)
            .filter(|record| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(Some(*record)))
            })
            .map(|record| project(record, request.projection.as_deref()))
            .collect();
        let page = ScanPage {
            items,
            last_evaluated_key,
        };
        Ok(page)
    }

    async fn query(&self, collection: &str, request: QueryRequest) -> Result<Vec<Record>> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let sort_key = target.schema.sort_key.clone();
        let mut matching: Vec<&Record> = target
            .items
            .values()
            .filter(|record| record.get(&request.partition_key) == Some(&request.partition_value))
            .collect();
        if let Some(sort_key) = sort_key {
            matching.sort_by(|left, right| left.get(&sort_key).cmp(&right.get(&sort_key)));
        }
        if request.descending {
            matching.reverse();
        }
        let records = matching
            .into_iter()
            .take(request.limit.unwrap_or(usize::MAX))
            .filter(|record| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(Some(*record)))
            })
            .cloned()
            .collect();
        Ok(records)
    }

    async fn batch_get(&self, collection: &str, keys: Vec<Key>) -> Result<Vec<Record>> {
        tokio::task::yield_now().await;
        let mut collections = self.collections.lock();
        let target = lookup(&mut collections, collection)?;
        let records = keys
            .iter()
            .filter_map(|key| target.items.get(key))
            .cloned()
            .collect();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::store::scan_all;

    use rstest::rstest;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_collection("Recipes", KeySchema::new("Id"))
            .with_collection("Favorites", KeySchema::new("UserID"))
            .with_collection("Reviews", KeySchema::composite("RecipeId", "CreatedAt"))
    }

    fn recipe(id: &str, creator: &str) -> Record {
        Record::from([
            ("Id".to_string(), Value::from(id)),
            ("CreatedByUserId".to_string(), Value::from(creator)),
            ("Title".to_string(), Value::from(format!("recipe {id}"))),
        ])
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = store();
        store.put("Recipes", recipe("1", "u"), None).await.unwrap();
        let actual = store.get("Recipes", record::key("Id", "1")).await.unwrap();
        assert_eq!(actual, Some(recipe("1", "u")));
        let missing = store.get("Recipes", record::key("Id", "2")).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_put_condition_failed_keeps_item() {
        let store = store();
        let condition = Condition::AttributeNotExists("Id".to_string());
        store
            .put("Recipes", recipe("1", "a"), Some(condition.clone()))
            .await
            .unwrap();
        let result = store.put("Recipes", recipe("1", "b"), Some(condition)).await;
        assert!(matches!(result, Err(Error::ConditionFailed)));
        let stored = store.get("Recipes", record::key("Id", "1")).await.unwrap();
        assert_eq!(stored, Some(recipe("1", "a")));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let result = store().get("Users", record::key("UserID", "u")).await;
        assert!(matches!(result, Err(Error::UnknownCollection(name)) if name == "Users"));
    }

    #[tokio::test]
    async fn test_put_without_key() {
        let record = Record::from([("Title".to_string(), Value::from("soup"))]);
        let result = store().put("Recipes", record, None).await;
        assert!(matches!(result, Err(Error::MissingKey { .. })));
    }

    #[tokio::test]
    async fn test_update_upserts_string_set() {
        let store = store();
        let key = record::key("UserID", "u");
        let add = |id: &str| vec![Update::Add("RecipeIDs".to_string(), Value::string_set([id]))];
        store.update("Favorites", key.clone(), add("5"), None).await.unwrap();
        store.update("Favorites", key.clone(), add("5"), None).await.unwrap();
        let actual = store.update("Favorites", key, add("7"), None).await.unwrap();
        assert_eq!(actual["RecipeIDs"], Value::string_set(["5", "7"]));
        assert_eq!(actual["UserID"], Value::from("u"));
    }

    #[tokio::test]
    async fn test_update_delete_empties_set() {
        let store = store();
        let key = record::key("UserID", "u");
        let delete = vec![Update::Delete("RecipeIDs".to_string(), Value::string_set(["5"]))];
        let actual = store
            .update("Favorites", key.clone(), delete.clone(), None)
            .await
            .unwrap();
        assert!(!actual.contains_key("RecipeIDs"));
        store
            .update(
                "Favorites",
                key.clone(),
                vec![Update::Add("RecipeIDs".to_string(), Value::string_set(["5"]))],
                None,
            )
            .await
            .unwrap();
        let actual = store.update("Favorites", key, delete, None).await.unwrap();
        assert!(!actual.contains_key("RecipeIDs"));
    }

    #[rstest]
    #[case::numbers(Some(Value::from(41_u64)), Value::from(1_u64), Value::from(42_u64))]
    #[case::missing(None, Value::from(1_u64), Value::from(1_u64))]
    #[case::decimals(
        Some(Value::Number("1.5".to_string())),
        Value::Number("1".to_string()),
        Value::Number("2.5".to_string())
    )]
    fn test_apply_add(#[case] current: Option<Value>, #[case] delta: Value, #[case] expected: Value) {
        let mut record = Record::new();
        if let Some(current) = current {
            record.insert("Value".to_string(), current);
        }
        apply(&mut record, Update::Add("Value".to_string(), delta)).unwrap();
        assert_eq!(record["Value"], expected);
    }

    #[test]
    fn test_apply_add_to_string_fails() {
        let mut record = Record::from([("Value".to_string(), Value::from("a"))]);
        let result = apply(&mut record, Update::Add("Value".to_string(), Value::from(1_u64)));
        assert!(matches!(result, Err(Error::InvalidUpdate(_))));
    }

    #[tokio::test]
    async fn test_update_key_attribute_rejected() {
        let store = store();
        let result = store
            .update(
                "Recipes",
                record::key("Id", "1"),
                vec![Update::Set("Id".to_string(), Value::from("2"))],
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidUpdate(_))));
    }

    #[tokio::test]
    async fn test_update_condition_on_missing_item() {
        let store = store();
        let key = record::composite_key(("RecipeId", "1"), ("CreatedAt", "t"));
        let result = store
            .update(
                "Reviews",
                key,
                vec![Update::Set("ReviewText".to_string(), Value::from("x"))],
                Some(Condition::Equals("UserId".to_string(), Value::from("u"))),
            )
            .await;
        assert!(matches!(result, Err(Error::ConditionFailed)));
        assert!(store.is_empty("Reviews").unwrap());
    }

    #[tokio::test]
    async fn test_scan_pages_follow_key_order() {
        let store = store();
        for id in ["1", "2", "3"] {
            store.insert("Recipes", recipe(id, "u")).unwrap();
        }
        let request = ScanRequest {
            limit: Some(2),
            ..Default::default()
        };
        let first = store.scan("Recipes", request.clone()).await.unwrap();
        assert_eq!(first.items, vec![recipe("1", "u"), recipe("2", "u")]);
        assert_eq!(first.last_evaluated_key, Some(record::key("Id", "2")));
        let second = store
            .scan(
                "Recipes",
                ScanRequest {
                    exclusive_start_key: first.last_evaluated_key,
                    ..request
                },
            )
            .await
            .unwrap();
        assert_eq!(second.items, vec![recipe("3", "u")]);
        assert_eq!(second.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_scan_limit_applies_before_filter() {
        let store = store();
        store.insert("Recipes", recipe("1", "a")).unwrap();
        store.insert("Recipes", recipe("2", "b")).unwrap();
        store.insert("Recipes", recipe("3", "a")).unwrap();
        let request = ScanRequest {
            limit: Some(2),
            filter: Some(Condition::Equals("CreatedByUserId".to_string(), Value::from("b"))),
            projection: Some(vec!["Id".to_string()]),
            ..Default::default()
        };
        let page = store.scan("Recipes", request.clone()).await.unwrap();
        assert_eq!(page.items, vec![record::key("Id", "2")]);
        assert!(page.last_evaluated_key.is_some());
        let all = scan_all(&store, "Recipes", request).await.unwrap();
        assert_eq!(all, vec![record::key("Id", "2")]);
    }

    #[tokio::test]
    async fn test_query_descending_with_limit() {
        let store = store();
        for (recipe_id, created_at) in [("1", "a"), ("1", "c"), ("1", "b"), ("2", "d")] {
            let review = record::composite_key(("RecipeId", recipe_id), ("CreatedAt", created_at));
            store.insert("Reviews", review).unwrap();
        }
        let request = QueryRequest {
            descending: true,
            limit: Some(2),
            ..QueryRequest::partition("RecipeId", "1")
        };
        let actual = store.query("Reviews", request).await.unwrap();
        let created: Vec<_> = actual
            .iter()
            .map(|review| review["CreatedAt"].as_str().unwrap())
            .collect();
        assert_eq!(created, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_batch_get_omits_missing() {
        let store = store();
        store.insert("Recipes", recipe("5", "u")).unwrap();
        let keys = vec![record::key("Id", "5"), record::key("Id", "6")];
        let actual = store.batch_get("Recipes", keys).await.unwrap();
        assert_eq!(actual, vec![recipe("5", "u")]);
    }
}
