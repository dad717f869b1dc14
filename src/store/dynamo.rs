use crate::error::{Error, Result};
use crate::record::{self, Key, Record};
use crate::store::{
    Condition, DocumentStore, MAX_BATCH_GET_KEYS, QueryRequest, ScanPage, ScanRequest, Update,
    expression,
};

use aws_sdk_dynamodb::{Client, error, operation, types};
use std::{collections, fmt, future::Future, time::Duration};

/// How many rounds a batch read may take before keys the service left
/// unprocessed are dropped.
const MAX_UNPROCESSED_ROUNDS: u32 = 3;

/// Delay before the first resend of unprocessed keys.
const BASE_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound of the delay between rounds.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Delay after batch round `round` (1-based), doubling every round.
fn backoff(round: u32) -> Duration {
    let factor = 2_u32.saturating_pow(round.saturating_sub(1));
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Map a write error, keeping conditional-check failures distinguishable.
fn write_error<E, R>(err: error::SdkError<E, R>, is_condition_failure: fn(&E) -> bool) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let condition_failed = err.as_service_error().is_some_and(is_condition_failure);
    if condition_failed {
        Error::ConditionFailed
    } else {
        Error::store(err)
    }
}

/// Outcome of one batch read request for a single collection.
#[derive(Debug)]
struct BatchRound {
    records: Vec<Record>,
    unprocessed: Option<types::KeysAndAttributes>,
}

/// Send `pending` through `send` until every key is processed or the round
/// limit is reached, backing off between rounds.
async fn read_until_processed<F, Fut>(
    _collection: &str,
    mut pending: types::KeysAndAttributes,
    mut send: F,
) -> Result<Vec<Record>>
where
    F: FnMut(types::KeysAndAttributes) -> Fut,
    Fut: Future<Output = Result<BatchRound>>,
{
    let mut records = Vec::new();
    let mut round = 0;
    loop {
        round += 1;
        let response = send(pending).await?;
        records.extend(response.records);
        let unprocessed = response
            .unprocessed
            .filter(|unprocessed| !unprocessed.keys().is_empty());
        match unprocessed {
            Some(unprocessed) if round < MAX_UNPROCESSED_ROUNDS => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    collection = _collection,
                    round,
                    unprocessed = unprocessed.keys().len(),
                    "sending unprocessed keys again"
                );
                tokio::time::sleep(backoff(round)).await;
                pending = unprocessed;
            }
            Some(_unprocessed) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    collection = _collection,
                    dropped = _unprocessed.keys().len(),
                    "batch read left keys unprocessed"
                );
                return Ok(records);
            }
            None => return Ok(records),
        }
    }
}

fn from_items(
    items: Option<Vec<collections::HashMap<String, types::AttributeValue>>>,
) -> Result<Vec<Record>> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(record::from_item)
        .collect()
}

/// Document store backed by Amazon DynamoDB.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use recipe_store::{record, store::{DocumentStore, dynamo::DynamoStore}};
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let store = DynamoStore::new(client);
/// let recipe = store.get("Recipes", record::key("Id", "1")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Wrap an SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send_batch(
        &self,
        collection: &str,
        keys: types::KeysAndAttributes,
    ) -> Result<BatchRound> {
        let output = self
            .client
            .batch_get_item()
            .request_items(collection, keys)
            .send()
            .await
            .map_err(Error::store)?;
        let mut responses = output.responses.unwrap_or_default();
        Ok(BatchRound {
            records: from_items(responses.remove(collection))?,
            unprocessed: output.unprocessed_keys.unwrap_or_default().remove(collection),
        })
    }
}

impl DocumentStore for DynamoStore {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.get", skip(self), err)
    )]
    async fn get(&self, collection: &str, key: Key) -> Result<Option<Record>> {
        let output = self
            .client
            .get_item()
            .table_name(collection)
            .set_key(Some(record::to_item(key)))
            .send()
            .await
            .map_err(Error::store)?;
        output.item.map(record::from_item).transpose()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.put", skip(self, record), err)
    )]
    async fn put(
        &self,
        collection: &str,
        record: Record,
        condition: Option<Condition>,
    ) -> Result<()> {
        let mut expressions = expression::RequestExpressions::default();
        let condition_expression = condition.map(|condition| expressions.condition(condition));
        let (names, values) = expressions.into_parts();
        self.client
            .put_item()
            .table_name(collection)
            .set_item(Some(record::to_item(record)))
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(|err| {
                write_error(
                    err,
                    operation::put_item::PutItemError::is_conditional_check_failed_exception,
                )
            })?;
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.update", skip(self), err)
    )]
    async fn update(
        &self,
        collection: &str,
        key: Key,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> Result<Record> {
        let mut expressions = expression::RequestExpressions::default();
        let update_expression = expressions.update(updates);
        let condition_expression = condition.map(|condition| expressions.condition(condition));
        let (names, values) = expressions.into_parts();
        let output = self
            .client
            .update_item()
            .table_name(collection)
            .set_key(Some(record::to_item(key.clone())))
            .update_expression(update_expression)
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .return_values(types::ReturnValue::AllNew)
            .send()
            .await
            .map_err(|err| {
                write_error(
                    err,
                    operation::update_item::UpdateItemError::is_conditional_check_failed_exception,
                )
            })?;
        match output.attributes {
            Some(attributes) => record::from_item(attributes),
            None => Ok(key),
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.scan", skip(self), err)
    )]
    async fn scan(&self, collection: &str, request: ScanRequest) -> Result<ScanPage> {
        let mut expressions = expression::RequestExpressions::default();
        let filter_expression = request
            .filter
            .map(|condition| expressions.condition(condition));
        let projection_expression = request
            .projection
            .map(|attributes| expressions.projection(attributes));
        let (names, values) = expressions.into_parts();
        let limit = request
            .limit
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));
        let output = self
            .client
            .scan()
            .table_name(collection)
            .set_limit(limit)
            .set_exclusive_start_key(request.exclusive_start_key.map(record::to_item))
            .set_filter_expression(filter_expression)
            .set_projection_expression(projection_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(Error::store)?;
        let page = ScanPage {
            items: from_items(output.items)?,
            last_evaluated_key: output
                .last_evaluated_key
                .filter(|key| !key.is_empty())
                .map(record::from_item)
                .transpose()?,
        };
        Ok(page)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.query", skip(self), err)
    )]
    async fn query(&self, collection: &str, request: QueryRequest) -> Result<Vec<Record>> {
        let mut expressions = expression::RequestExpressions::default();
        let key_condition_expression = expressions.condition(Condition::Equals(
            request.partition_key,
            request.partition_value,
        ));
        let filter_expression = request
            .filter
            .map(|condition| expressions.condition(condition));
        let (names, values) = expressions.into_parts();
        let limit = request
            .limit
            .map(|limit| i32::try_from(limit).unwrap_or(i32::MAX));
        let output = self
            .client
            .query()
            .table_name(collection)
            .key_condition_expression(key_condition_expression)
            .set_filter_expression(filter_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .scan_index_forward(!request.descending)
            .set_limit(limit)
            .send()
            .await
            .map_err(Error::store)?;
        from_items(output.items)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "recipe_store.batch_get",
            skip(self, keys),
            fields(keys = keys.len()),
            err
        )
    )]
    async fn batch_get(&self, collection: &str, keys: Vec<Key>) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_BATCH_GET_KEYS) {
            let items = chunk.iter().cloned().map(record::to_item).collect();
            let pending = types::KeysAndAttributes::builder()
                .set_keys(Some(items))
                .build()
                .map_err(Error::store)?;
            let read = read_until_processed(collection, pending, |unprocessed| {
                self.send_batch(collection, unprocessed)
            })
            .await?;
            records.extend(read);
        }
        Ok(records)
    }
}
