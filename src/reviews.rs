//! Recipe reviews.
//!
//! Reviews are keyed by `RecipeId` and `CreatedAt`, so the reviews of one
//! recipe form one partition ordered by creation time.

use crate::claims::Claims;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{self, Value};
use crate::store::{Condition, DocumentStore, QueryRequest, Update};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Most reviews returned for one recipe.
pub const MAX_LISTED_REVIEWS: usize = 100;

/// A stored review.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Review {
    /// Reviewed recipe.
    pub recipe_id: String,
    /// Creation time, RFC 3339 with millisecond precision.
    pub created_at: String,
    /// Author's subject.
    pub user_id: String,
    /// Author's display name at posting time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Review body, trimmed.
    pub review_text: String,
    /// Time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn review_text(text: &str) -> Result<&str> {
    let text = text.trim();
    if text.is_empty() {
        Err(Error::MissingField("ReviewText"))
    } else {
        Ok(text)
    }
}

/// Review operations.
#[derive(Debug)]
pub struct Reviews<'a, S> {
    store: &'a S,
    collection: String,
}

impl<'a, S: DocumentStore> Reviews<'a, S> {
    /// Reviews of `store`, configured by `config`.
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            collection: config.tables.reviews.clone(),
        }
    }

    /// Post a review of `recipe_id` as the caller.
    pub async fn post(&self, claims: &Claims, recipe_id: &str, text: &str) -> Result<Review> {
        self.post_at(claims, recipe_id, text, Utc::now()).await
    }

    /// [`Reviews::post`] with an explicit creation time.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.post_review", skip(self, claims, text), err)
    )]
    pub async fn post_at(
        &self,
        claims: &Claims,
        recipe_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        let user_id = claims.require_subject()?;
        let review = Review {
            recipe_id: recipe_id.to_string(),
            created_at: timestamp(now),
            user_id: user_id.to_string(),
            username: claims.username().map(str::to_string),
            review_text: review_text(text)?.to_string(),
            updated_at: None,
        };
        self.store
            .put(&self.collection, record::to_record(&review)?, None)
            .await?;
        Ok(review)
    }

    /// Reviews of `recipe_id`, newest first, at most [`MAX_LISTED_REVIEWS`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.list_reviews", skip(self), err)
    )]
    pub async fn list(&self, recipe_id: &str) -> Result<Vec<Review>> {
        let request = QueryRequest {
            descending: true,
            limit: Some(MAX_LISTED_REVIEWS),
            ..QueryRequest::partition("RecipeId", recipe_id)
        };
        self.store
            .query(&self.collection, request)
            .await?
            .into_iter()
            .map(record::from_record)
            .collect()
    }

    /// Replace the text of the caller's review of `recipe_id`.
    pub async fn update(&self, claims: &Claims, recipe_id: &str, text: &str) -> Result<Review> {
        self.update_at(claims, recipe_id, text, Utc::now()).await
    }

    /// [`Reviews::update`] with an explicit edit time.
    ///
    /// Fails with [`Error::NotFound`] when the caller has no review of the
    /// recipe, or when the review disappears or changes hands before the
    /// write.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.update_review", skip(self, claims, text), err)
    )]
    pub async fn update_at(
        &self,
        claims: &Claims,
        recipe_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        let user_id = claims.require_subject()?;
        let text = review_text(text)?;
        let request = QueryRequest {
            filter: Some(Condition::Equals("UserId".to_string(), Value::from(user_id))),
            ..QueryRequest::partition("RecipeId", recipe_id)
        };
        let existing = self.store.query(&self.collection, request).await?;
        let created_at = existing
            .into_iter()
            .find_map(|review| review.get("CreatedAt").cloned())
            .ok_or(Error::NotFound)?;
        let key = record::composite_key(("RecipeId", recipe_id), ("CreatedAt", created_at));
        let updates = vec![
            Update::Set("ReviewText".to_string(), Value::from(text)),
            Update::Set("UpdatedAt".to_string(), Value::from(timestamp(now))),
        ];
        let owner = Condition::Equals("UserId".to_string(), Value::from(user_id));
        match self
            .store
            .update(&self.collection, key, updates, Some(owner))
            .await
        {
            Ok(updated) => record::from_record(updated),
            Err(Error::ConditionFailed) => Err(Error::NotFound),
            Err(err) => Err(err),
        }
    }
}
