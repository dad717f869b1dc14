#![deny(missing_docs)]

//! # Recipe Store
//!
//! Resource-access core of a recipe site, on top of a DynamoDB-style
//! key-value document store.
//!
//! ## Overview
//!
//! The store offers no auto-increment, no ordered pagination and no joins.
//! This crate fills those gaps with three small components that share nothing
//! but the store:
//! - [`allocator::IdAllocator`] hands out collision-free sequential identifiers
//!   through optimistic concurrency: derive a candidate, write it with an
//!   "absent" condition, retry on conflict
//! - [`pager::Pager`] serves bounded scans as pages, with an opaque URL-safe
//!   [`cursor`] to resume from
//! - [`fanout::FanOut`] resolves a set of references (a user's favorites) into
//!   the records they point at, deduplicated and batch-read in chunks
//!
//! The recipe site's collections ([`recipes`], [`favorites`], [`reviews`],
//! [`users`], [`categories`]) are built from these pieces. Each service is
//! built the same way, from a store and a [`config::Config`].
//!
//! ## Quick Example
//!
//! ```rust
//! use recipe_store::{
//!     config::Config,
//!     favorites::Favorites,
//!     recipes::{NewRecipe, Recipes},
//!     store::{KeySchema, memory::MemoryStore},
//! };
//!
//! # async fn example() -> Result<(), recipe_store::error::Error> {
//! let store = MemoryStore::new()
//!     .with_collection("Recipes", KeySchema::new("Id"))
//!     .with_collection("Favorites", KeySchema::new("UserID"));
//! let config = Config::default();
//!
//! let recipes = Recipes::new(&store, &config);
//! let soup = recipes
//!     .create(NewRecipe {
//!         title: "Soup".to_string(),
//!         instructions_text: "Boil.".to_string(),
//!         created_by_user_id: "u-1".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let favorites = Favorites::new(&store, &config);
//! favorites.add("u-1", &soup.id).await?;
//! assert_eq!(favorites.resolve("u-1").await?.len(), 1);
//!
//! let page = recipes.page(None, None).await?;
//! assert_eq!(page.next_cursor, None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@store`] - The document store seam and its DynamoDB and in-memory implementations
//! - [`mod@record`] - Attribute values, records and keys
//! - [`mod@allocator`] - Identifier allocation
//! - [`mod@cursor`] - Pagination cursors
//! - [`mod@pager`] - Paged scans
//! - [`mod@fanout`] - Reference resolution

/// Collision-free identifier allocation.
pub mod allocator;

/// Recipe categories.
pub mod categories;

/// Identity claims of the caller.
pub mod claims;

/// Configuration with defaults and environment overrides.
pub mod config;

/// Opaque pagination cursors.
pub mod cursor;

/// Error and result types.
pub mod error;

/// Favorite recipes per user.
pub mod favorites;

/// Reference set resolution.
pub mod fanout;

/// Cursor pagination.
pub mod pager;

/// Recipes.
pub mod recipes;

/// Attribute values, records and keys.
pub mod record;

/// Reviews of recipes.
pub mod reviews;

/// Document store adapter.
pub mod store;

/// User profiles.
pub mod users;

pub use error::{Error, Result};
pub use store::DocumentStore;
