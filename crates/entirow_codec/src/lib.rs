//! # entirow Codec
//!
//! Column values and blob encoding for entirow.
//!
//! This crate provides:
//! - [`Value`], the scalar stored in a single column
//! - [`ColumnMap`], a flat name-ordered map of columns
//! - [`RowId`], the positive primary key of a row
//! - Deterministic encoding of a column map into blob text
//! - A content hash used for change detection
//!
//! ## Usage
//!
//! ```
//! use entirow_codec::{columns, decode_blob, encode_blob};
//!
//! let fields = columns! { "bio" => "hello", "age" => 30 };
//! let text = encode_blob(&fields).unwrap();
//! assert_eq!(decode_blob(&text).unwrap(), fields);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blob;
mod error;
mod hash;
mod id;
mod value;

pub use blob::{decode_blob, encode_blob, EMPTY_BLOB};
pub use error::{CodecError, CodecResult};
pub use hash::{content_hash, hash_text};
pub use id::RowId;
pub use value::{ColumnMap, Value};
