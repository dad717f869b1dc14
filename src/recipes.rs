//! Recipe collection.

use crate::allocator::IdAllocator;
use crate::config::{AllocatorConfig, Config, PageConfig};
use crate::error::{Error, Result};
use crate::pager::{Page, Pager};
use crate::record::{self, Record, Value};
use crate::store::{self, Condition, DocumentStore, KeySchema, ScanRequest};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A recipe as submitted by its author.
///
/// Attribute names follow the stored records, including their historical
/// spellings `Couisine` and `Summery`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewRecipe {
    /// Required.
    pub title: String,
    /// Required.
    pub instructions_text: String,
    /// Required.
    pub created_by_user_id: String,
    /// Category the recipe is listed under.
    #[serde(default)]
    pub category_id: String,
    /// Cuisine, stored as `Couisine`.
    #[serde(default, rename = "Couisine")]
    pub cuisine: String,
    /// Unknown when `None`.
    #[serde(default)]
    pub gluten_free: Option<bool>,
    /// Picture of the dish.
    #[serde(default)]
    pub image_url: String,
    /// Original publisher.
    #[serde(default)]
    pub publisher: String,
    /// Where the recipe comes from.
    #[serde(default)]
    pub source_url: String,
    /// Short description, stored as `Summery`.
    #[serde(default, rename = "Summery")]
    pub summary: String,
    /// Unknown when `None`.
    #[serde(default)]
    pub vegan: Option<bool>,
    /// Unknown when `None`.
    #[serde(default)]
    pub vegetarian: Option<bool>,
}

impl NewRecipe {
    fn validate(&self) -> Result<()> {
        let required = [
            ("Title", &self.title),
            ("InstructionsText", &self.instructions_text),
            ("CreatedByUserId", &self.created_by_user_id),
        ];
        match required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(Error::MissingField(field)),
            None => Ok(()),
        }
    }
}

/// A stored recipe.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Recipe {
    /// Allocated identifier.
    pub id: String,
    /// Creation time, RFC 3339 with second precision.
    pub created_at: String,
    /// Everything the author submitted.
    #[serde(flatten)]
    pub details: NewRecipe,
}

/// Recipe operations.
#[derive(Debug)]
pub struct Recipes<'a, S> {
    store: &'a S,
    collection: String,
    allocator: AllocatorConfig,
    paging: PageConfig,
}

impl<'a, S: DocumentStore> Recipes<'a, S> {
    /// Recipes of `store`, configured by `config`.
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            collection: config.tables.recipes.clone(),
            allocator: config.allocator.clone(),
            paging: config.paging,
        }
    }

    /// Store a new recipe under a freshly allocated identifier.
    pub async fn create(&self, recipe: NewRecipe) -> Result<Recipe> {
        self.create_at(recipe, Utc::now()).await
    }

    /// [`Recipes::create`] with an explicit creation time.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.create_recipe", skip(self, recipe), err)
    )]
    pub async fn create_at(&self, recipe: NewRecipe, now: DateTime<Utc>) -> Result<Recipe> {
        recipe.validate()?;
        let created_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut record = record::to_record(&recipe)?;
        record.insert("CreatedAt".to_string(), Value::from(created_at.clone()));
        let (id, _) = IdAllocator::new(self.store, self.allocator.clone())
            .allocate(&self.collection, record)
            .await?;
        Ok(Recipe {
            id,
            created_at,
            details: recipe,
        })
    }

    /// One recipe by identifier.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        let key = record::key(&self.allocator.key_attribute, id);
        self.store.get(&self.collection, key).await
    }

    /// One page of recipes.
    pub async fn page(&self, page_size: Option<usize>, cursor: Option<&str>) -> Result<Page> {
        let key_schema = KeySchema::new(&self.allocator.key_attribute);
        Pager::new(self.store, key_schema, self.paging)
            .next_page(&self.collection, page_size, cursor)
            .await
    }

    /// Every recipe created by `user_id`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.recipes_created_by", skip(self), err)
    )]
    pub async fn created_by(&self, user_id: &str) -> Result<Vec<Record>> {
        if user_id.trim().is_empty() {
            return Err(Error::MissingField("CreatedByUserId"));
        }
        let request = ScanRequest {
            filter: Some(Condition::Equals(
                "CreatedByUserId".to_string(),
                Value::from(user_id),
            )),
            ..Default::default()
        };
        store::scan_all(self.store, &self.collection, request).await
    }
}
