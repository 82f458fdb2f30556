//! Cycle-safe transitive closure over a [`RelationIndex`].
//!
//! For every tag we keep four id sets:
//!
//! ```text
//!   direct_implied        = forward[t]                      \ {t}
//!   indirect_implied      = reach(forward, direct_implied)  \ direct_implied \ {t}
//!   direct_implying       = reverse[t]                      \ {t}
//!   indirect_implying     = reach(reverse, direct_implying) \ direct_implying \ {t}
//! ```
//!
//! `reach` is a worklist traversal with a visited bitmap, so it terminates on
//! any cycle structure. The table is computed once for the whole snapshot.

use roaring::RoaringBitmap;
use std::collections::HashMap;

use crate::ids::TagId;
use crate::relation_index::RelationIndex;

/// The four relation sets of one tag.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TagClosure {
    pub direct_implied: RoaringBitmap,
    pub indirect_implied: RoaringBitmap,
    pub direct_implying: RoaringBitmap,
    pub indirect_implying: RoaringBitmap,
}

impl TagClosure {
    /// `direct_implied ∪ indirect_implied`
    pub fn implied_closure(&self) -> RoaringBitmap {
        &self.direct_implied | &self.indirect_implied
    }

    /// `direct_implying ∪ indirect_implying`
    pub fn implying_closure(&self) -> RoaringBitmap {
        &self.direct_implying | &self.indirect_implying
    }
}

/// Memoized closure for every tag in a snapshot.
#[derive(Debug, Default)]
pub struct ClosureTable {
    by_tag: HashMap<u32, TagClosure>,
}

impl ClosureTable {
    pub fn build<I>(index: &RelationIndex, tag_ids: I) -> Self
    where
        I: IntoIterator<Item = TagId>,
    {
        let mut by_tag = HashMap::new();
        for id in tag_ids {
            let raw = id.raw();
            let direct_implied = neighbours(index.forward(), raw);
            let direct_implying = neighbours(index.reverse(), raw);

            let mut indirect_implied = reach(index.forward(), &direct_implied);
            indirect_implied -= &direct_implied;
            indirect_implied.remove(raw);

            let mut indirect_implying = reach(index.reverse(), &direct_implying);
            indirect_implying -= &direct_implying;
            indirect_implying.remove(raw);

            by_tag.insert(
                raw,
                TagClosure {
                    direct_implied,
                    indirect_implied,
                    direct_implying,
                    indirect_implying,
                },
            );
        }
        tracing::debug!(tags = by_tag.len(), "built tag closure table");
        Self { by_tag }
    }

    pub fn get(&self, id: TagId) -> Option<&TagClosure> {
        self.by_tag.get(&id.raw())
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

fn neighbours(adjacency: &HashMap<u32, RoaringBitmap>, id: u32) -> RoaringBitmap {
    let mut out = adjacency.get(&id).cloned().unwrap_or_default();
    out.remove(id);
    out
}

/// Everything reachable from `start` by one or more further steps, including
/// `start` itself. Each id is expanded at most once.
pub fn reach(adjacency: &HashMap<u32, RoaringBitmap>, start: &RoaringBitmap) -> RoaringBitmap {
    let mut visited = start.clone();
    let mut worklist: Vec<u32> = start.iter().collect();
    while let Some(next) = worklist.pop() {
        let Some(targets) = adjacency.get(&next) else {
            continue;
        };
        for target in targets {
            if visited.insert(target) {
                worklist.push(target);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CategoryId;
    use crate::model::Tag;
    use std::collections::BTreeMap;

    fn table(edges: &[(u32, &[u32])]) -> ClosureTable {
        let tags: BTreeMap<TagId, Tag> = edges
            .iter()
            .map(|(id, implies)| {
                let t = Tag::new(format!("t{id}"), CategoryId::new(1))
                    .with_id(TagId::new(*id))
                    .implying(implies.iter().copied().map(TagId::new));
                (t.id, t)
            })
            .collect();
        let index = RelationIndex::build(&tags);
        ClosureTable::build(&index, tags.keys().copied())
    }

    fn ids(bitmap: &RoaringBitmap) -> Vec<u32> {
        bitmap.iter().collect()
    }

    #[test]
    fn chain_splits_direct_and_indirect() {
        let t = table(&[(1, &[2]), (2, &[3]), (3, &[])]);
        let a = t.get(TagId::new(1)).unwrap();
        assert_eq!(ids(&a.direct_implied), vec![2]);
        assert_eq!(ids(&a.indirect_implied), vec![3]);

        let c = t.get(TagId::new(3)).unwrap();
        assert_eq!(ids(&c.direct_implying), vec![2]);
        assert_eq!(ids(&c.indirect_implying), vec![1]);
    }

    #[test]
    fn two_cycle_excludes_self_and_direct() {
        let t = table(&[(1, &[2]), (2, &[1])]);
        let a = t.get(TagId::new(1)).unwrap();
        assert_eq!(ids(&a.direct_implied), vec![2]);
        assert!(a.indirect_implied.is_empty());
        assert_eq!(ids(&a.direct_implying), vec![2]);
        assert!(a.indirect_implying.is_empty());
    }

    #[test]
    fn longer_cycle_terminates() {
        let t = table(&[(1, &[2]), (2, &[3]), (3, &[4]), (4, &[1])]);
        let a = t.get(TagId::new(1)).unwrap();
        assert_eq!(ids(&a.direct_implied), vec![2]);
        assert_eq!(ids(&a.indirect_implied), vec![3, 4]);
        assert_eq!(ids(&a.direct_implying), vec![4]);
        assert_eq!(ids(&a.indirect_implying), vec![2, 3]);
        assert_eq!(ids(&a.implied_closure()), vec![2, 3, 4]);
    }

    #[test]
    fn diamond_reports_shared_descendant_once() {
        let t = table(&[(1, &[2, 3]), (2, &[4]), (3, &[4]), (4, &[])]);
        let a = t.get(TagId::new(1)).unwrap();
        assert_eq!(ids(&a.indirect_implied), vec![4]);
        let d = t.get(TagId::new(4)).unwrap();
        assert_eq!(ids(&d.direct_implying), vec![2, 3]);
        assert_eq!(ids(&d.indirect_implying), vec![1]);
    }

    #[test]
    fn reach_includes_start() {
        let mut adjacency = HashMap::new();
        adjacency.insert(1, [2u32].into_iter().collect::<RoaringBitmap>());
        let start: RoaringBitmap = [1u32].into_iter().collect();
        assert_eq!(ids(&reach(&adjacency, &start)), vec![1, 2]);
    }
}
