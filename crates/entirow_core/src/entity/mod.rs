//! Entity records, the identity map and entity sets.

mod identity;
mod record;
mod set;

pub use identity::IdentityMap;
pub use record::{Entity, EntityRecord};
pub use set::{EntitySet, FindOptions};

pub(crate) use set::{by_id, child_links, projection, row_id_of};
