//! The immutable graph snapshot.
//!
//! A [`TagGraph`] is validated once, at construction, and never changes
//! afterwards. Derived indexes live in `OnceLock` cells owned by the instance:
//! they are filled on first use and dropped with the snapshot. Mutations (see
//! `mutate.rs`) clone the backing maps into a fresh instance, so a holder of
//! an older `Arc<TagGraph>` keeps reading exactly what it read before.

use roaring::RoaringBitmap;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::closure::{ClosureTable, TagClosure};
use crate::error::{EntityKind, GraphError, Result};
use crate::ids::{CategoryId, TagId};
use crate::model::{name_key, Category, ExtendedTag, Tag, TagWithCategory};
use crate::relation_index::RelationIndex;

// ============================================================================
// Derived caches
// ============================================================================

#[derive(Debug, Default)]
struct NameIndex {
    categories: HashMap<String, CategoryId>,
    tags: HashMap<String, TagId>,
}

impl NameIndex {
    fn build(
        categories: &BTreeMap<CategoryId, Category>,
        tags: &BTreeMap<TagId, Tag>,
    ) -> Result<Self> {
        let mut out = NameIndex::default();
        for (id, category) in categories {
            if let Some(&existing) = out.categories.get(&name_key(&category.name)) {
                return Err(GraphError::DuplicateName {
                    kind: EntityKind::Category,
                    name: category.name.clone(),
                    conflicting_id: existing.raw(),
                });
            }
            out.categories.insert(name_key(&category.name), *id);
        }
        for (id, tag) in tags {
            if let Some(&existing) = out.tags.get(&name_key(&tag.name)) {
                return Err(GraphError::DuplicateName {
                    kind: EntityKind::Tag,
                    name: tag.name.clone(),
                    conflicting_id: existing.raw(),
                });
            }
            out.tags.insert(name_key(&tag.name), *id);
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct Caches {
    names: OnceLock<NameIndex>,
    tags_by_category: OnceLock<HashMap<CategoryId, Vec<TagId>>>,
    relations: OnceLock<RelationIndex>,
    closure: OnceLock<ClosureTable>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// One immutable, internally consistent instance of the category/tag graph.
#[derive(Debug, Default)]
pub struct TagGraph {
    pub(crate) categories: BTreeMap<CategoryId, Category>,
    pub(crate) tags: BTreeMap<TagId, Tag>,
    caches: Caches,
}

impl TagGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate a (categories, tags) pair and wrap it in a snapshot.
    ///
    /// Rejects, in this order: unset ids, repeated ids, tags whose category
    /// is missing, implied ids that resolve to no tag, and case-insensitive
    /// name collisions. Implication cycles are accepted.
    pub fn build<C, T>(categories: C, tags: T) -> Result<Self>
    where
        C: IntoIterator<Item = Category>,
        T: IntoIterator<Item = Tag>,
    {
        let mut category_map = BTreeMap::new();
        for category in categories {
            if category.id.is_unset() {
                return Err(GraphError::ZeroId {
                    kind: EntityKind::Category,
                });
            }
            let id = category.id;
            if category_map.insert(id, category).is_some() {
                return Err(GraphError::DuplicateId {
                    kind: EntityKind::Category,
                    id: id.raw(),
                });
            }
        }

        let mut tag_map = BTreeMap::new();
        for tag in tags {
            if tag.id.is_unset() {
                return Err(GraphError::ZeroId {
                    kind: EntityKind::Tag,
                });
            }
            let id = tag.id;
            if tag_map.insert(id, tag).is_some() {
                return Err(GraphError::DuplicateId {
                    kind: EntityKind::Tag,
                    id: id.raw(),
                });
            }
        }

        Self::from_maps(category_map, tag_map)
    }

    /// Validation shared by `build` and every copy-and-mutate operation.
    pub(crate) fn from_maps(
        categories: BTreeMap<CategoryId, Category>,
        tags: BTreeMap<TagId, Tag>,
    ) -> Result<Self> {
        if categories.contains_key(&CategoryId::UNSET) {
            return Err(GraphError::ZeroId {
                kind: EntityKind::Category,
            });
        }
        if tags.contains_key(&TagId::UNSET) {
            return Err(GraphError::ZeroId {
                kind: EntityKind::Tag,
            });
        }

        for (id, tag) in &tags {
            if !categories.contains_key(&tag.category) {
                return Err(GraphError::MissingCategory {
                    tag: id.raw(),
                    category: tag.category.raw(),
                });
            }
            if let Some(missing) = tag.implies.iter().find(|implied| !tags.contains_key(*implied)) {
                return Err(GraphError::DanglingImpliedTag {
                    tag: id.raw(),
                    implied: missing.raw(),
                });
            }
        }

        let names = NameIndex::build(&categories, &tags)?;
        let graph = TagGraph {
            categories,
            tags,
            caches: Caches::default(),
        };
        // Freshly created cell; `set` cannot fail here.
        let _ = graph.caches.names.set(names);
        Ok(graph)
    }

    // ========================================================================
    // Point queries
    // ========================================================================

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    /// Case-insensitive, whitespace-trimmed lookup.
    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        let id = self.names().categories.get(&name_key(name))?;
        self.categories.get(id)
    }

    /// Case-insensitive, whitespace-trimmed lookup.
    pub fn tag_by_name(&self, name: &str) -> Option<&Tag> {
        let id = self.names().tags.get(&name_key(name))?;
        self.tags.get(id)
    }

    pub fn tag_count_in_category(&self, id: CategoryId) -> usize {
        self.tags_by_category().get(&id).map_or(0, Vec::len)
    }

    /// Tags owned by a category, ordered by name.
    pub fn tags_in_category(&self, id: CategoryId) -> Vec<&Tag> {
        let Some(ids) = self.tags_by_category().get(&id) else {
            return Vec::new();
        };
        ids.iter().filter_map(|tag_id| self.tags.get(tag_id)).collect()
    }

    /// All categories, ordered by sort order then name.
    pub fn categories(&self) -> Vec<&Category> {
        let mut out: Vec<&Category> = self.categories.values().collect();
        out.sort_by_cached_key(|c| (c.sort_order, name_key(&c.name), c.id));
        out
    }

    /// All tags, ordered by id.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> + '_ {
        self.tags.values()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.tags.is_empty()
    }

    pub fn tag_with_category(&self, id: TagId) -> Option<TagWithCategory> {
        let tag = self.tags.get(&id)?;
        // A validated snapshot never holds a tag without its category.
        let category = self.categories.get(&tag.category)?;
        Some(TagWithCategory {
            tag: tag.clone(),
            category: category.clone(),
        })
    }

    /// Owned copies of the stored records, for persistence.
    pub fn to_parts(&self) -> (Vec<Category>, Vec<Tag>) {
        (
            self.categories.values().cloned().collect(),
            self.tags.values().cloned().collect(),
        )
    }

    // ========================================================================
    // Closure queries
    // ========================================================================

    pub fn relation_index(&self) -> &RelationIndex {
        self.caches
            .relations
            .get_or_init(|| RelationIndex::build(&self.tags))
    }

    fn closure_table(&self) -> &ClosureTable {
        self.caches
            .closure
            .get_or_init(|| ClosureTable::build(self.relation_index(), self.tags.keys().copied()))
    }

    /// Raw relation sets for one tag.
    pub fn closure(&self, id: TagId) -> Option<&TagClosure> {
        self.closure_table().get(id)
    }

    /// The tag, its category, and its four relation lists; `None` for an
    /// unknown id.
    pub fn extended_tag(&self, id: TagId) -> Option<ExtendedTag> {
        let tag = self.tags.get(&id)?;
        let category = self.categories.get(&tag.category)?;
        let closure = self.closure(id)?;
        Some(ExtendedTag {
            tag: tag.clone(),
            category: category.clone(),
            implied: self.resolve_sorted(&closure.direct_implied),
            indirectly_implied: self.resolve_sorted(&closure.indirect_implied),
            implied_by: self.resolve_sorted(&closure.direct_implying),
            indirectly_implied_by: self.resolve_sorted(&closure.indirect_implying),
        })
    }

    /// Direct and indirect implied ids of one tag.
    pub fn implied_closure(&self, id: TagId) -> BTreeSet<TagId> {
        self.closure(id)
            .map(|c| to_ids(&c.implied_closure()))
            .unwrap_or_default()
    }

    /// Direct and indirect implying ids of one tag.
    pub fn implying_closure(&self, id: TagId) -> BTreeSet<TagId> {
        self.closure(id)
            .map(|c| to_ids(&c.implying_closure()))
            .unwrap_or_default()
    }

    /// Union of the implied closures of `explicit`. An explicit id shows up
    /// only when some explicit tag implies it; unknown ids contribute nothing.
    pub fn resolve_implied_closure<'a, I>(&self, explicit: I) -> BTreeSet<TagId>
    where
        I: IntoIterator<Item = &'a TagId>,
    {
        let table = self.closure_table();
        let mut acc = RoaringBitmap::new();
        for id in explicit {
            if let Some(closure) = table.get(*id) {
                acc |= &closure.direct_implied;
                acc |= &closure.indirect_implied;
            }
        }
        to_ids(&acc)
    }

    fn resolve_sorted(&self, ids: &RoaringBitmap) -> Vec<TagWithCategory> {
        let mut out: Vec<TagWithCategory> = ids
            .iter()
            .filter_map(|raw| self.tag_with_category(TagId::new(raw)))
            .collect();
        out.sort_by_cached_key(|t| (t.display_key(), t.id()));
        out
    }

    // ========================================================================
    // Cache accessors
    // ========================================================================

    fn names(&self) -> &NameIndex {
        self.caches.names.get_or_init(|| {
            NameIndex::build(&self.categories, &self.tags).unwrap_or_default()
        })
    }

    fn tags_by_category(&self) -> &HashMap<CategoryId, Vec<TagId>> {
        self.caches.tags_by_category.get_or_init(|| {
            let mut out: HashMap<CategoryId, Vec<TagId>> = HashMap::new();
            for tag in self.tags.values() {
                out.entry(tag.category).or_default().push(tag.id);
            }
            for ids in out.values_mut() {
                ids.sort_by_cached_key(|id| (name_key(&self.tags[id].name), *id));
            }
            out
        })
    }
}

fn to_ids(bitmap: &RoaringBitmap) -> BTreeSet<TagId> {
    bitmap.iter().map(TagId::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Color;

    fn category(id: u32, name: &str) -> Category {
        Category::new(name).with_id(CategoryId::new(id))
    }

    fn tag(id: u32, name: &str, category: u32, implies: &[u32]) -> Tag {
        Tag::new(name, CategoryId::new(category))
            .with_id(TagId::new(id))
            .implying(implies.iter().copied().map(TagId::new))
    }

    #[test]
    fn rejects_zero_ids() {
        let err = TagGraph::build(vec![category(0, "Genre")], vec![]).unwrap_err();
        assert_eq!(
            err,
            GraphError::ZeroId {
                kind: EntityKind::Category
            }
        );

        let err = TagGraph::build(vec![category(1, "Genre")], vec![tag(0, "x", 1, &[])])
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::ZeroId {
                kind: EntityKind::Tag
            }
        );
    }

    #[test]
    fn rejects_missing_category() {
        let err = TagGraph::build(vec![category(1, "Genre")], vec![tag(4, "x", 2, &[])])
            .unwrap_err();
        assert_eq!(err, GraphError::MissingCategory { tag: 4, category: 2 });
    }

    #[test]
    fn rejects_dangling_implied_tag() {
        let err = TagGraph::build(
            vec![category(1, "Genre")],
            vec![tag(1, "a", 1, &[9]), tag(2, "b", 1, &[])],
        )
        .unwrap_err();
        assert_eq!(err, GraphError::DanglingImpliedTag { tag: 1, implied: 9 });
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        let err = TagGraph::build(vec![category(1, "Genre"), category(2, "GENRE")], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::DuplicateName {
                kind: EntityKind::Category,
                conflicting_id: 1,
                ..
            }
        ));

        let err = TagGraph::build(
            vec![category(1, "Genre")],
            vec![tag(1, "foo", 1, &[]), tag(2, "Foo", 1, &[])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GraphError::DuplicateName {
                kind: EntityKind::Tag,
                conflicting_id: 1,
                ..
            }
        ));
    }

    #[test]
    fn same_name_across_kinds_is_fine() {
        let graph = TagGraph::build(vec![category(1, "Romance")], vec![tag(1, "Romance", 1, &[])])
            .unwrap();
        assert_eq!(graph.tag_by_name("romance").unwrap().id, TagId::new(1));
        assert_eq!(graph.category_by_name("ROMANCE").unwrap().id, CategoryId::new(1));
    }

    #[test]
    fn rejects_repeated_ids() {
        let err = TagGraph::build(vec![category(1, "A"), category(1, "B")], vec![]).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateId {
                kind: EntityKind::Category,
                id: 1
            }
        );
    }

    #[test]
    fn point_queries() {
        let graph = TagGraph::build(
            vec![
                category(1, "Genre").with_sort_order(2),
                category(2, "Warnings").with_sort_order(1).with_color(Color::rgb(255, 0, 0)),
            ],
            vec![
                tag(1, "Horror", 1, &[]),
                tag(2, "Angst", 1, &[]),
                tag(3, "Violence", 2, &[]),
            ],
        )
        .unwrap();

        assert_eq!(graph.tag_count_in_category(CategoryId::new(1)), 2);
        assert_eq!(graph.tag_count_in_category(CategoryId::new(9)), 0);
        let names: Vec<&str> = graph
            .tags_in_category(CategoryId::new(1))
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["Angst", "Horror"]);

        let order: Vec<&str> = graph.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["Warnings", "Genre"]);

        assert_eq!(graph.tag_by_name("  horror ").unwrap().id, TagId::new(1));
        assert!(graph.tag_by_name("comedy").is_none());
        let twc = graph.tag_with_category(TagId::new(3)).unwrap();
        assert_eq!(twc.category.name, "Warnings");
    }

    #[test]
    fn extended_tag_on_cycle() {
        let graph = TagGraph::build(
            vec![category(1, "Genre")],
            vec![tag(1, "A", 1, &[2]), tag(2, "B", 1, &[1])],
        )
        .unwrap();
        let ext = graph.extended_tag(TagId::new(1)).unwrap();
        assert_eq!(ext.implied_ids(), [TagId::new(2)].into_iter().collect());
        assert!(ext.indirectly_implied.is_empty());
        assert_eq!(ext.implied_by_ids(), [TagId::new(2)].into_iter().collect());
        assert!(ext.indirectly_implied_by.is_empty());
        assert!(graph.extended_tag(TagId::new(99)).is_none());
    }

    #[test]
    fn self_implication_is_accepted_and_ignored() {
        let graph = TagGraph::build(vec![category(1, "Genre")], vec![tag(1, "A", 1, &[1])])
            .unwrap();
        let ext = graph.extended_tag(TagId::new(1)).unwrap();
        assert!(ext.implied.is_empty());
        assert!(ext.implied_by.is_empty());
        assert!(graph.resolve_implied_closure(&[TagId::new(1)]).is_empty());
    }

    #[test]
    fn resolve_implied_closure_unions_and_skips_unknown() {
        let graph = TagGraph::build(
            vec![category(1, "Genre")],
            vec![tag(1, "A", 1, &[2]), tag(2, "B", 1, &[3]), tag(3, "C", 1, &[])],
        )
        .unwrap();
        let a = TagId::new(1);
        let b = TagId::new(2);
        let c = TagId::new(3);
        assert_eq!(
            graph.resolve_implied_closure(&[a]),
            [b, c].into_iter().collect()
        );
        assert_eq!(
            graph.resolve_implied_closure(&[a, c]),
            [b, c].into_iter().collect()
        );
        assert!(graph.resolve_implied_closure(&[TagId::new(42)]).is_empty());
        assert_eq!(graph.implying_closure(c), [a, b].into_iter().collect());
    }

    #[test]
    fn caches_are_memoized_per_instance() {
        let graph = TagGraph::build(
            vec![category(1, "Genre")],
            vec![tag(1, "A", 1, &[2]), tag(2, "B", 1, &[])],
        )
        .unwrap();
        let first = graph.relation_index() as *const RelationIndex;
        let second = graph.relation_index() as *const RelationIndex;
        assert_eq!(first, second);
        assert_eq!(graph.relation_index().edge_count(), 1);
    }
}
