//! Per-user favorite recipes.
//!
//! Each user has at most one record holding a string set of recipe
//! identifiers. Adding and removing are single set updates, so concurrent
//! changes by the same user never overwrite each other.

use crate::config::{Config, FanOutConfig};
use crate::error::{Error, Result};
use crate::fanout::FanOut;
use crate::record::{self, Record, Value};
use crate::store::{DocumentStore, Update};

/// Favorite operations.
#[derive(Debug)]
pub struct Favorites<'a, S> {
    store: &'a S,
    config: FanOutConfig,
}

impl<'a, S: DocumentStore> Favorites<'a, S> {
    /// Favorites of `store`, configured by `config`.
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            config: config.fan_out.clone(),
        }
    }

    async fn change(&self, user_id: &str, update: Update) -> Result<()> {
        let key = record::key(&self.config.source_key, user_id);
        self.store
            .update(&self.config.source_collection, key, vec![update], None)
            .await?;
        Ok(())
    }

    fn recipe_set(recipe_id: &str) -> Result<Value> {
        let recipe_id = recipe_id.trim();
        if recipe_id.is_empty() {
            return Err(Error::MissingField("RecipeId"));
        }
        Ok(Value::string_set([recipe_id]))
    }

    /// Add `recipe_id` to the user's favorites; adding twice has no effect.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.add_favorite", skip(self), err)
    )]
    pub async fn add(&self, user_id: &str, recipe_id: &str) -> Result<()> {
        let recipes = Self::recipe_set(recipe_id)?;
        let update = Update::Add(self.config.references_attribute.clone(), recipes);
        self.change(user_id, update).await
    }

    /// Remove `recipe_id` from the user's favorites; removing an absent
    /// identifier has no effect.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.remove_favorite", skip(self), err)
    )]
    pub async fn remove(&self, user_id: &str, recipe_id: &str) -> Result<()> {
        let recipes = Self::recipe_set(recipe_id)?;
        let update = Update::Delete(self.config.references_attribute.clone(), recipes);
        self.change(user_id, update).await
    }

    /// The recipes the user marked as favorite, in no particular order.
    pub async fn resolve(&self, user_id: &str) -> Result<Vec<Record>> {
        FanOut::new(self.store, self.config.clone())
            .resolve(user_id)
            .await
    }
}
