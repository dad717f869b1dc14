//! Recipe categories.
//!
//! Categories are a small, curated collection read as a whole; recipes refer
//! to them through `CategoryId`.

use crate::config::Config;
use crate::error::Result;
use crate::record;
use crate::store::{self, DocumentStore, ScanRequest};

use serde::{Deserialize, Serialize};

/// A stored category.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Category {
    /// Identifier recipes refer to.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Picture shown for the category.
    #[serde(default)]
    pub image_url: String,
}

/// Category operations.
#[derive(Debug)]
pub struct Categories<'a, S> {
    store: &'a S,
    collection: String,
}

impl<'a, S: DocumentStore> Categories<'a, S> {
    /// Categories of `store`, configured by `config`.
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            collection: config.tables.categories.clone(),
        }
    }

    /// Every category, in the store's scan order.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.list_categories", skip(self), err)
    )]
    pub async fn list(&self) -> Result<Vec<Category>> {
        store::scan_all(self.store, &self.collection, ScanRequest::default())
            .await?
            .into_iter()
            .map(record::from_record::<Category>)
            .collect()
    }
}
