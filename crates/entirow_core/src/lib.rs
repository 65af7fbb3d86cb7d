//! # entirow Core
//!
//! Row-to-object mapping for entirow.
//!
//! This crate provides:
//! - Entity type descriptors and the schema graph
//! - An identity map per type, one live record per row
//! - Entity records that split columns between indexed row columns and a blob
//! - Deferred, composable entity sets
//! - Transactional create and cascade delete
//!
//! ## Usage
//!
//! ```rust
//! use entirow_codec::columns;
//! use entirow_core::{EntityType, Session};
//! use entirow_storage::InMemoryDriver;
//! use std::sync::Arc;
//!
//! let driver = Arc::new(InMemoryDriver::new());
//! driver.create_table("users", "id", ["hash", "data"]).unwrap();
//! driver.create_table("posts", "id", ["status", "_users", "hash", "data"]).unwrap();
//!
//! let session = Session::new(driver);
//! let users = session.register(EntityType::builder("users").build().unwrap()).unwrap();
//! let posts = session
//!     .register(EntityType::builder("posts").index("status").parent("users").build().unwrap())
//!     .unwrap();
//!
//! let user = users.create(&columns! { "name" => "ada" }).unwrap();
//! posts.create(&columns! { "_users" => user.id(), "status" => "draft" }).unwrap();
//!
//! let drafts = posts.find_all(&columns! { "status" => "draft" });
//! assert_eq!(drafts.len().unwrap(), 1);
//!
//! users.delete(user.id().get()).unwrap();
//! assert!(drafts.parents("users").unwrap().is_empty().unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cascade;
mod class;
mod config;
mod entity;
mod error;
mod schema;
mod session;
mod transaction;

pub use cascade::DeletedRow;
pub use class::{EntityClass, Found};
pub use config::SessionConfig;
pub use entity::{Entity, EntityRecord, EntitySet, FindOptions, IdentityMap};
pub use error::{CoreError, CoreResult};
pub use schema::{ChildLink, EntityType, EntityTypeBuilder, SchemaRegistry, PARENT_LINK_PREFIX};
pub use session::Session;
