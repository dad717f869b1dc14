//! Configuration for the access core and the services built on it.
//!
//! Every struct implements [`Default`] with the values the site runs with, so
//! callers only spell out what differs:
//!
//! ```rust
//! use recipe_store::config::{Config, PageConfig};
//!
//! let config = Config {
//!     paging: PageConfig {
//!         default_page_size: 20,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```

use crate::store::MAX_BATCH_GET_KEYS;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page a caller may ask for.
pub const MAX_PAGE_SIZE: usize = 100;

/// Attempts an allocation makes before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// How the allocator derives the next candidate identifier.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum AllocationStrategy {
    /// Scan the whole collection for the current maximum.
    ///
    /// Costs a full scan per attempt; fine for small collections only.
    #[default]
    ScanMax,
    /// Atomically increment a counter record, one per allocated collection.
    ///
    /// The counter record lives in `collection`, keyed by `key_attribute`
    /// equal to the allocated collection's name, holding the last issued
    /// number in `value_attribute`.
    Counter {
        /// Collection holding the counter records.
        collection: String,
        /// Key attribute of the counter collection.
        key_attribute: String,
        /// Numeric attribute incremented on every attempt.
        value_attribute: String,
    },
}

/// Identifier allocation settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllocatorConfig {
    /// Primary key attribute of the allocated collection.
    pub key_attribute: String,
    /// Attempts before failing with `AllocationExhausted`.
    pub max_attempts: usize,
    /// Candidate derivation.
    pub strategy: AllocationStrategy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            key_attribute: "Id".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strategy: AllocationStrategy::default(),
        }
    }
}

/// Pagination settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageConfig {
    /// Page size when the caller gives none.
    pub default_page_size: usize,
    /// Upper bound on the page size a caller may request.
    pub max_page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageConfig {
    /// The page size actually used for a request.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// Fan-out settings: where the references live and what they point at.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FanOutConfig {
    /// Collection holding the reference sets.
    pub source_collection: String,
    /// Key attribute of the source collection.
    pub source_key: String,
    /// Attribute holding the references.
    pub references_attribute: String,
    /// Collection the references point into.
    pub target_collection: String,
    /// Key attribute of the target collection.
    pub target_key: String,
    /// Keys per batch read, at most [`MAX_BATCH_GET_KEYS`].
    pub batch_size: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        let tables = Tables::default();
        Self {
            source_collection: tables.favorites,
            source_key: "UserID".to_string(),
            references_attribute: "RecipeIDs".to_string(),
            target_collection: tables.recipes,
            target_key: "Id".to_string(),
            batch_size: MAX_BATCH_GET_KEYS,
        }
    }
}

impl FanOutConfig {
    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_GET_KEYS)
    }
}

/// Collection names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tables {
    /// Recipes, keyed by `Id`.
    pub recipes: String,
    /// Reviews, keyed by `RecipeId` and `CreatedAt`.
    pub reviews: String,
    /// Favorite sets, keyed by `UserID`.
    pub favorites: String,
    /// User profiles, keyed by `UserID`.
    pub users: String,
    /// Recipe categories, keyed by `Id`.
    pub categories: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            recipes: "Recipes".to_string(),
            reviews: "Reviews".to_string(),
            favorites: "Favorites".to_string(),
            users: "Users".to_string(),
            categories: "Category".to_string(),
        }
    }
}

impl Tables {
    /// Names from `RECIPES_TABLE`, `REVIEWS_TABLE`, `FAVORITES_TABLE`,
    /// `USERS_TABLE` and `CATEGORIES_TABLE`, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pick = |name: &str, default: String| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(default)
        };
        Self {
            recipes: pick("RECIPES_TABLE", defaults.recipes),
            reviews: pick("REVIEWS_TABLE", defaults.reviews),
            favorites: pick("FAVORITES_TABLE", defaults.favorites),
            users: pick("USERS_TABLE", defaults.users),
            categories: pick("CATEGORIES_TABLE", defaults.categories),
        }
    }
}

/// Everything the services need.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Collection names.
    pub tables: Tables,
    /// Identifier allocation for recipes.
    pub allocator: AllocatorConfig,
    /// Recipe pagination.
    pub paging: PageConfig,
    /// Favorites fan-out.
    pub fan_out: FanOutConfig,
}

impl Config {
    /// Defaults with collection names taken from the environment.
    pub fn from_env() -> Self {
        let tables = Tables::from_env();
        let fan_out = FanOutConfig {
            source_collection: tables.favorites.clone(),
            target_collection: tables.recipes.clone(),
            ..Default::default()
        };
        Self {
            tables,
            fan_out,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::collections;

    #[rstest]
    #[case::default(None, 10)]
    #[case::requested(Some(25), 25)]
    #[case::capped(Some(1000), 100)]
    #[case::zero(Some(0), 1)]
    fn test_page_size(#[case] requested: Option<usize>, #[case] expected: usize) {
        assert_eq!(PageConfig::default().page_size(requested), expected);
    }

    #[rstest]
    #[case::default(100, 100)]
    #[case::small(3, 3)]
    #[case::zero(0, 1)]
    #[case::too_large(500, 100)]
    fn test_batch_size(#[case] batch_size: usize, #[case] expected: usize) {
        let config = FanOutConfig {
            batch_size,
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), expected);
    }

    #[test]
    fn test_tables_from_lookup() {
        let env = collections::HashMap::from([
            ("RECIPES_TABLE", "recipes-prod"),
            ("USERS_TABLE", " "),
            ("CATEGORIES_TABLE", "categories-prod"),
        ]);
        let tables = Tables::from_lookup(|name| env.get(name).map(|value| value.to_string()));
        assert_eq!(
            tables,
            Tables {
                recipes: "recipes-prod".to_string(),
                categories: "categories-prod".to_string(),
                ..Default::default()
            }
        );
        assert_eq!(tables.users, "Users");
    }
}
