//! Entity type descriptors and the parent/child schema graph.

mod descriptor;
mod registry;

pub use descriptor::{EntityType, EntityTypeBuilder, PARENT_LINK_PREFIX};
pub use registry::{ChildLink, SchemaRegistry};
