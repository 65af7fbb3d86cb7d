//! # entirow Storage
//!
//! The relational driver contract for entirow, plus an in-memory driver.
//!
//! entirow does not generate SQL or manage connections. It talks to a
//! [`Driver`], which exposes row reads, inserts, updates and deletes with
//! equality conditions, and begin/commit/rollback.
//!
//! ## Design Principles
//!
//! - Drivers see plain tables with a numeric primary key
//! - No knowledge of blob columns, hashes or entity types
//! - Must be `Send + Sync`
//! - entirow owns all interpretation of the columns it reads back
//!
//! ## Available Drivers
//!
//! - [`InMemoryDriver`] - For testing and embedding, with call counters and
//!   fail points
//!
//! ## Example
//!
//! ```rust
//! use entirow_codec::columns;
//! use entirow_storage::{Driver, InMemoryDriver};
//!
//! let driver = InMemoryDriver::new();
//! driver.create_table("notes", "id", ["data"]).unwrap();
//! let id = driver.insert("notes", &columns! { "data" => "{}" }).unwrap();
//! assert_eq!(id.get(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod fault;
mod memory;
mod stats;

pub use driver::{Columns, Conditions, Driver, QueryOptions, QueryResult};
pub use error::{StorageError, StorageResult};
pub use fault::{DriverOp, FailPoint};
pub use memory::InMemoryDriver;
pub use stats::{DriverStats, StatsSnapshot};
