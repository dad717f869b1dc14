//! User profiles.

use crate::claims::Claims;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{self, Record};
use crate::store::{self, Condition, DocumentStore, ScanRequest};

use serde::{Deserialize, Serialize};

/// A stored user profile.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct User {
    /// Subject of the user's identity.
    #[serde(rename = "UserID")]
    pub user_id: String,
    /// Empty when the identity carries none.
    #[serde(default)]
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub user_name: String,
}

impl User {
    /// The profile described by `claims`.
    pub fn from_claims(claims: &Claims) -> Result<Self> {
        Ok(Self {
            user_id: claims.require_subject()?.to_string(),
            email: claims.email().unwrap_or_default().to_string(),
            user_name: claims.username().unwrap_or_default().to_string(),
        })
    }
}

/// Result of [`Users::ensure`].
#[derive(Clone, Debug, PartialEq)]
pub enum EnsureOutcome {
    /// The profile did not exist and was created.
    Created(User),
    /// A profile was already stored; it was left untouched.
    Existing,
}

/// User operations.
#[derive(Debug)]
pub struct Users<'a, S> {
    store: &'a S,
    collection: String,
}

impl<'a, S: DocumentStore> Users<'a, S> {
    /// Users of `store`, configured by `config`.
    pub fn new(store: &'a S, config: &Config) -> Self {
        Self {
            store,
            collection: config.tables.users.clone(),
        }
    }

    /// Create the caller's profile unless one exists.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.ensure_user", skip(self, claims), err)
    )]
    pub async fn ensure(&self, claims: &Claims) -> Result<EnsureOutcome> {
        let user = User::from_claims(claims)?;
        let condition = Condition::AttributeNotExists("UserID".to_string());
        match self
            .store
            .put(&self.collection, record::to_record(&user)?, Some(condition))
            .await
        {
            Ok(()) => Ok(EnsureOutcome::Created(user)),
            Err(Error::ConditionFailed) => Ok(EnsureOutcome::Existing),
            Err(err) => Err(err),
        }
    }

    /// Every profile, for administrators only.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "recipe_store.list_users", skip(self, claims), err)
    )]
    pub async fn list(&self, claims: &Claims) -> Result<Vec<User>> {
        if !claims.is_admin() {
            return Err(Error::Forbidden("admin only"));
        }
        store::scan_all(self.store, &self.collection, ScanRequest::default())
            .await?
            .into_iter()
            .map(record::from_record::<User>)
            .collect()
    }

    /// The stored profile of `user_id`.
    pub async fn get(&self, user_id: &str) -> Result<Option<User>> {
        let key = record::key("UserID", user_id);
        let found: Option<Record> = self.store.get(&self.collection, key).await?;
        found.map(record::from_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tables;
    use crate::store::{KeySchema, memory::MemoryStore};

    use rstest::rstest;

    fn store() -> MemoryStore {
        MemoryStore::new().with_collection("Users", KeySchema::new("UserID"))
    }

    fn claims(value: serde_json::Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let store = store();
        let users = Users::new(&store, &Config::default());
        let caller = claims(serde_json::json!({
            "sub": "u-1",
            "email": "ann@example.com",
            "cognito:username": "ann",
        }));
        let expected = User {
            user_id: "u-1".to_string(),
            email: "ann@example.com".to_string(),
            user_name: "ann".to_string(),
        };
        assert_eq!(
            users.ensure(&caller).await.unwrap(),
            EnsureOutcome::Created(expected.clone())
        );
        let renamed = claims(serde_json::json!({"sub": "u-1", "cognito:username": "other"}));
        assert_eq!(users.ensure(&renamed).await.unwrap(), EnsureOutcome::Existing);
        assert_eq!(users.get("u-1").await.unwrap(), Some(expected));
        assert_eq!(store.len("Users").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ensure_without_subject() {
        let store = store();
        let result = Users::new(&store, &Config::default())
            .ensure(&claims(serde_json::json!({"email": "x@y.z"})))
            .await;
        assert!(matches!(result, Err(Error::Unauthenticated)));
        assert!(store.is_empty("Users").unwrap());
    }

    #[rstest]
    #[case::admin(serde_json::json!({"sub": "a", "cognito:groups": ["Admin"]}), true)]
    #[case::admin_string(serde_json::json!({"sub": "a", "cognito:groups": "cooks,admin"}), true)]
    #[case::member(serde_json::json!({"sub": "a", "cognito:groups": ["cooks"]}), false)]
    #[case::anonymous(serde_json::json!({}), false)]
    #[tokio::test]
    async fn test_list_requires_admin(#[case] caller: serde_json::Value, #[case] allowed: bool) {
        let store = store();
        for id in ["u-1", "u-2", "u-3"] {
            store.insert("Users", record::key("UserID", id)).unwrap();
        }
        let users = Users::new(&store, &Config::default());
        let result = users.list(&claims(caller)).await;
        if allowed {
            let ids: Vec<_> = result
                .unwrap()
                .into_iter()
                .map(|user| user.user_id)
                .collect();
            assert_eq!(ids, vec!["u-1", "u-2", "u-3"]);
        } else {
            assert!(matches!(result, Err(Error::Forbidden(_))));
        }
    }

    #[tokio::test]
    async fn test_configured_collection() {
        let store = MemoryStore::new().with_collection("users-prod", KeySchema::new("UserID"));
        let config = Config {
            tables: Tables {
                users: "users-prod".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let users = Users::new(&store, &config);
        let caller = claims(serde_json::json!({"sub": "u-1"}));
        users.ensure(&caller).await.unwrap();
        assert!(users.get("u-1").await.unwrap().is_some());
        assert_eq!(store.len("users-prod").unwrap(), 1);
    }
}
