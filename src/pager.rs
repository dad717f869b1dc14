//! Cursor pagination over bounded scans.
//!
//! Each page is one bounded scan resumed after the key carried by the cursor.
//! Pages are not isolated from each other: a record inserted or deleted
//! between two calls may be skipped or returned twice, and the order of
//! records follows the store's scan order, not any sort order. The item count
//! of a page may be below the page size even when more pages follow.
//!
//! A cursor only resumes a scan of a collection with the pager's key schema.
//! Any other cursor restarts from the beginning.

use crate::config::PageConfig;
use crate::cursor;
use crate::error::Result;
use crate::record::Record;
use crate::store::{DocumentStore, KeySchema, ScanRequest};

use serde::{Serialize, Serializer};

/// One page of records.
///
/// Serializes as `{"items": [...], "lastKey": ...}` with items as plain JSON
/// objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Page {
    /// Records of this page.
    #[serde(serialize_with = "plain_items")]
    pub items: Vec<Record>,
    /// Cursor of the next page; `None` on the last page.
    #[serde(rename = "lastKey")]
    pub next_cursor: Option<String>,
}

fn plain_items<S: Serializer>(
    items: &[Record],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(items.iter().map(|item| {
        item.iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>()
    }))
}

/// Serves pages of a collection.
#[derive(Debug)]
pub struct Pager<'a, S> {
    store: &'a S,
    key_schema: KeySchema,
    config: PageConfig,
}

impl<'a, S: DocumentStore> Pager<'a, S> {
    /// Pager over `store`, for collections keyed by `key_schema`.
    pub fn new(store: &'a S, key_schema: KeySchema, config: PageConfig) -> Self {
        Self {
            store,
            key_schema,
            config,
        }
    }

    /// Read the page after `cursor`, or the first page without one.
    ///
    /// `page_size` defaults to the configured size and is capped at the
    /// configured maximum. A cursor that cannot be decoded, or that holds a
    /// key of another schema, restarts from the beginning.
    ///
    /// ```rust
    /// use recipe_store::{pager::Pager, record, store::{KeySchema, memory::MemoryStore}};
    ///
    /// # async fn example() -> Result<(), recipe_store::error::Error> {
    /// let store = MemoryStore::new().with_collection("Recipes", KeySchema::new("Id"));
    /// for id in ["1", "2", "3"] {
    ///     store.insert("Recipes", record::key("Id", id))?;
    /// }
    /// let pager = Pager::new(&store, KeySchema::new("Id"), Default::default());
    /// let first = pager.next_page("Recipes", Some(2), None).await?;
    /// let second = pager.next_page("Recipes", Some(2), first.next_cursor.as_deref()).await?;
    /// assert_eq!(second.next_cursor, None);
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.next_page", skip(self), err)
    )]
    pub async fn next_page(
        &self,
        collection: &str,
        page_size: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let request = ScanRequest {
            exclusive_start_key: cursor::decode_for(cursor, &self.key_schema),
            limit: Some(self.config.page_size(page_size)),
            ..Default::default()
        };
        let page = self.store.scan(collection, request).await?;
        Ok(Page {
            items: page.items,
            next_cursor: cursor::encode(page.last_evaluated_key.as_ref()),
        })
    }
}
