//! # entirow Testkit
//!
//! Test utilities for entirow.
//!
//! This crate provides:
//! - A blog schema (users, posts, comments) over the in-memory driver
//! - Property-based test generators using proptest
//! - A shadow harness that checks records against a fresh session
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use entirow_codec::columns;
//! use entirow_testkit::prelude::*;
//!
//! let blog = TestSession::blog();
//! let user = blog.users().create(&columns! { "email" => "a@x" }).unwrap();
//! assert_eq!(blog.driver.row_count("users"), 1);
//! # let _ = user;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::logging::init_tracing;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use logging::init_tracing;
