//! Storyshelf tag graph: an immutable, referentially consistent category/tag
//! structure with cycle-safe implication closure.
//!
//! ```text
//!   TagGraph (snapshot)
//!     ├── categories: BTreeMap<CategoryId, Category>
//!     ├── tags:       BTreeMap<TagId, Tag>          (each with an implied-id set)
//!     └── lazily built, per instance:
//!           name index ─ tags by category ─ RelationIndex ─► ClosureTable
//! ```
//!
//! ## Invariants (checked by [`TagGraph::build`])
//!
//! 1. No stored category or tag has the unset id `0`.
//! 2. Every tag's category exists in the same snapshot.
//! 3. Every implied id resolves to a tag in the same snapshot.
//! 4. Names are unique case-insensitively per entity kind.
//!
//! Implication cycles are legal. A tag never appears in its own relation
//! lists, even when a cycle leads back to it.
//!
//! ## Mutation
//!
//! Snapshots are never modified. `create_*`, `update_*` and `delete_*` return
//! a new snapshot together with the affected records.

pub mod closure;
pub mod error;
pub mod ids;
pub mod model;
mod mutate;
pub mod relation_index;
mod snapshot;

pub use closure::{ClosureTable, TagClosure};
pub use error::{EntityKind, GraphError, Result};
pub use ids::{CategoryId, TagId};
pub use model::{Category, Color, ExtendedTag, ParseColorError, Tag, TagWithCategory};
pub use mutate::validate_name;
pub use relation_index::RelationIndex;
pub use snapshot::TagGraph;
