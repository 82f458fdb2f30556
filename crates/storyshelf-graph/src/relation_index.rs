//! Forward/reverse implication adjacency for one snapshot.
//!
//! Built in a single scan over every tag's implied-id set. Self edges are
//! dropped here, so nothing downstream has to special-case a tag that lists
//! itself.

use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashMap};

use crate::ids::TagId;
use crate::model::Tag;

#[derive(Debug, Default, Clone)]
pub struct RelationIndex {
    /// `tag -> tags it directly implies`
    forward: HashMap<u32, RoaringBitmap>,
    /// `tag -> tags that directly imply it`
    reverse: HashMap<u32, RoaringBitmap>,
    edge_count: u64,
}

impl RelationIndex {
    pub fn build(tags: &BTreeMap<TagId, Tag>) -> Self {
        let mut out = RelationIndex::default();
        for (id, tag) in tags {
            let source = id.raw();
            for implied in &tag.implies {
                let target = implied.raw();
                if target == source {
                    continue;
                }
                let inserted = out
                    .forward
                    .entry(source)
                    .or_insert_with(RoaringBitmap::new)
                    .insert(target);
                out.reverse
                    .entry(target)
                    .or_insert_with(RoaringBitmap::new)
                    .insert(source);
                if inserted {
                    out.edge_count += 1;
                }
            }
        }
        out
    }

    /// Tags `id` directly implies.
    pub fn implied(&self, id: TagId) -> Option<&RoaringBitmap> {
        self.forward.get(&id.raw())
    }

    /// Tags that directly imply `id`.
    pub fn implying(&self, id: TagId) -> Option<&RoaringBitmap> {
        self.reverse.get(&id.raw())
    }

    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    pub(crate) fn forward(&self) -> &HashMap<u32, RoaringBitmap> {
        &self.forward
    }

    pub(crate) fn reverse(&self) -> &HashMap<u32, RoaringBitmap> {
        &self.reverse
    }
}
