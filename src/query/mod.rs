//! Read-only traversals over the concept graph
//!
//! Queries run against a `RelationshipSnapshot` built from one read of the
//! active relationships, so a traversal never holds the store while it walks.

mod path;
mod snapshot;
mod traverse;
mod types;

pub use path::PathQuery;
pub use snapshot::RelationshipSnapshot;
pub use traverse::ComponentQuery;
pub use types::{EdgeFilter, PathResult, TraversalResult};
