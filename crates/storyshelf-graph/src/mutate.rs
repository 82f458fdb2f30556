//! Copy-and-mutate operations on [`TagGraph`].
//!
//! Each operation clones the backing maps, applies one change, and runs the
//! full construction validation over the result. `self` is never touched; the
//! caller decides whether to adopt the returned snapshot.
//!
//! The `*_at` variants take the timestamp to stamp; the plain variants use
//! `Utc::now()`.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

use crate::error::{EntityKind, GraphError, Result};
use crate::ids::{next_free, CategoryId, TagId};
use crate::model::{Category, Tag};
use crate::snapshot::TagGraph;

/// Trim a display name and check it is usable for `kind`.
pub fn validate_name(kind: EntityKind, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GraphError::InvalidName {
            kind,
            name: name.to_string(),
            reason: "name is blank",
        });
    }
    if kind == EntityKind::Tag && trimmed.contains(['\n', '\r']) {
        return Err(GraphError::InvalidName {
            kind,
            name: name.to_string(),
            reason: "tag names cannot contain line breaks",
        });
    }
    Ok(trimmed.to_string())
}

impl TagGraph {
    // ========================================================================
    // Categories
    // ========================================================================

    pub fn create_category(&self, category: Category) -> Result<(TagGraph, Category)> {
        self.create_category_at(category, Utc::now())
    }

    pub fn create_category_at(
        &self,
        mut category: Category,
        now: DateTime<Utc>,
    ) -> Result<(TagGraph, Category)> {
        if !category.id.is_unset() {
            return Err(GraphError::IdAlreadySet {
                kind: EntityKind::Category,
                id: category.id.raw(),
            });
        }
        category.name = validate_name(EntityKind::Category, &category.name)?;
        if let Some(existing) = self.category_by_name(&category.name) {
            return Err(GraphError::DuplicateName {
                kind: EntityKind::Category,
                name: category.name,
                conflicting_id: existing.id.raw(),
            });
        }

        let raw = next_free(self.categories.keys().map(|id| id.raw())).ok_or(
            GraphError::IdSpaceExhausted {
                kind: EntityKind::Category,
            },
        )?;
        category.id = CategoryId::new(raw);
        category.created = now;
        category.updated = now;

        let mut categories = self.categories.clone();
        categories.insert(category.id, category.clone());
        let graph = TagGraph::from_maps(categories, self.tags.clone())?;
        Ok((graph, category))
    }

    pub fn update_category(&self, category: Category) -> Result<(TagGraph, Category)> {
        self.update_category_at(category, Utc::now())
    }

    pub fn update_category_at(
        &self,
        mut category: Category,
        now: DateTime<Utc>,
    ) -> Result<(TagGraph, Category)> {
        let Some(current) = self.categories.get(&category.id) else {
            return Err(GraphError::NotFound {
                kind: EntityKind::Category,
                id: category.id.raw(),
            });
        };
        category.name = validate_name(EntityKind::Category, &category.name)?;
        if let Some(existing) = self.category_by_name(&category.name) {
            if existing.id != category.id {
                return Err(GraphError::DuplicateName {
                    kind: EntityKind::Category,
                    name: category.name,
                    conflicting_id: existing.id.raw(),
                });
            }
        }

        category.created = current.created;
        category.updated = now.max(current.created);

        let mut categories = self.categories.clone();
        categories.insert(category.id, category.clone());
        let graph = TagGraph::from_maps(categories, self.tags.clone())?;
        Ok((graph, category))
    }

    /// Fails while any tag still belongs to the category.
    pub fn delete_category(&self, id: CategoryId) -> Result<(TagGraph, Category)> {
        let Some(current) = self.categories.get(&id) else {
            return Err(GraphError::NotFound {
                kind: EntityKind::Category,
                id: id.raw(),
            });
        };
        let blockers: Vec<u32> = self
            .tags_in_category(id)
            .iter()
            .map(|tag| tag.id.raw())
            .collect();
        if !blockers.is_empty() {
            return Err(GraphError::ReferentialIntegrity {
                kind: EntityKind::Category,
                id: id.raw(),
                blockers,
            });
        }

        let removed = current.clone();
        let mut categories = self.categories.clone();
        categories.remove(&id);
        let graph = TagGraph::from_maps(categories, self.tags.clone())?;
        Ok((graph, removed))
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub fn create_tag(&self, tag: Tag) -> Result<(TagGraph, Tag)> {
        self.create_tag_at(tag, Utc::now())
    }

    /// The new tag's category and implied tags must already exist.
    pub fn create_tag_at(&self, mut tag: Tag, now: DateTime<Utc>) -> Result<(TagGraph, Tag)> {
        if !tag.id.is_unset() {
            return Err(GraphError::IdAlreadySet {
                kind: EntityKind::Tag,
                id: tag.id.raw(),
            });
        }
        tag.name = validate_name(EntityKind::Tag, &tag.name)?;
        if let Some(existing) = self.tag_by_name(&tag.name) {
            return Err(GraphError::DuplicateName {
                kind: EntityKind::Tag,
                name: tag.name,
                conflicting_id: existing.id.raw(),
            });
        }

        let raw = next_free(self.tags.keys().map(|id| id.raw()))
            .ok_or(GraphError::IdSpaceExhausted {
                kind: EntityKind::Tag,
            })?;
        tag.id = TagId::new(raw);
        tag.created = now;
        tag.updated = now;

        let mut tags = self.tags.clone();
        tags.insert(tag.id, tag.clone());
        let graph = TagGraph::from_maps(self.categories.clone(), tags)?;
        Ok((graph, tag))
    }

    pub fn update_tag(&self, tag: Tag) -> Result<(TagGraph, Tag)> {
        self.update_tag_at(tag, Utc::now())
    }

    pub fn update_tag_at(&self, tag: Tag, now: DateTime<Utc>) -> Result<(TagGraph, Tag)> {
        let id = tag.id;
        let (graph, mut updated) = self.update_tags_at(vec![tag], now)?;
        let tag = updated.pop().ok_or(GraphError::NotFound {
            kind: EntityKind::Tag,
            id: id.raw(),
        })?;
        Ok((graph, tag))
    }

    pub fn update_tags(&self, tags: Vec<Tag>) -> Result<(TagGraph, Vec<Tag>)> {
        self.update_tags_at(tags, Utc::now())
    }

    /// Apply a batch of tag updates as one snapshot.
    ///
    /// Names are checked against the final state, so two tags in the batch
    /// may swap names. Any failure rejects the whole batch.
    pub fn update_tags_at(
        &self,
        batch: Vec<Tag>,
        now: DateTime<Utc>,
    ) -> Result<(TagGraph, Vec<Tag>)> {
        let mut seen = HashSet::with_capacity(batch.len());
        let mut prepared = Vec::with_capacity(batch.len());

        for mut tag in batch {
            let Some(current) = self.tags.get(&tag.id) else {
                return Err(GraphError::NotFound {
                    kind: EntityKind::Tag,
                    id: tag.id.raw(),
                });
            };
            if !seen.insert(tag.id) {
                return Err(GraphError::DuplicateId {
                    kind: EntityKind::Tag,
                    id: tag.id.raw(),
                });
            }
            tag.name = validate_name(EntityKind::Tag, &tag.name)?;
            tag.created = current.created;
            tag.updated = now.max(current.created);
            prepared.push(tag);
        }

        // Collisions with tags outside the batch get a precise conflicting
        // id; collisions inside the batch are caught by `from_maps`.
        for tag in &prepared {
            if let Some(existing) = self.tag_by_name(&tag.name) {
                if !seen.contains(&existing.id) {
                    return Err(GraphError::DuplicateName {
                        kind: EntityKind::Tag,
                        name: tag.name.clone(),
                        conflicting_id: existing.id.raw(),
                    });
                }
            }
        }

        let mut tags = self.tags.clone();
        for tag in &prepared {
            tags.insert(tag.id, tag.clone());
        }
        let graph = TagGraph::from_maps(self.categories.clone(), tags)?;
        Ok((graph, prepared))
    }

    /// Fails while any other tag still implies `id`.
    pub fn delete_tag(&self, id: TagId) -> Result<(TagGraph, Tag)> {
        let Some(current) = self.tags.get(&id) else {
            return Err(GraphError::NotFound {
                kind: EntityKind::Tag,
                id: id.raw(),
            });
        };
        let blockers: Vec<u32> = self
            .relation_index()
            .implying(id)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default();
        if !blockers.is_empty() {
            return Err(GraphError::ReferentialIntegrity {
                kind: EntityKind::Tag,
                id: id.raw(),
                blockers,
            });
        }

        let removed = current.clone();
        let mut tags = self.tags.clone();
        tags.remove(&id);
        let graph = TagGraph::from_maps(self.categories.clone(), tags)?;
        Ok((graph, removed))
    }

    pub fn strip_and_delete_tag(&self, id: TagId) -> Result<(TagGraph, Vec<Tag>)> {
        self.strip_and_delete_tag_at(id, Utc::now())
    }

    /// Remove `id` from every implying tag and delete it, as one snapshot.
    ///
    /// Returns the implying tags as rewritten.
    pub fn strip_and_delete_tag_at(
        &self,
        id: TagId,
        now: DateTime<Utc>,
    ) -> Result<(TagGraph, Vec<Tag>)> {
        if !self.tags.contains_key(&id) {
            return Err(GraphError::NotFound {
                kind: EntityKind::Tag,
                id: id.raw(),
            });
        }
        let implying: BTreeSet<TagId> = self
            .relation_index()
            .implying(id)
            .map(|ids| ids.iter().map(TagId::new).collect())
            .unwrap_or_default();

        let mut tags = self.tags.clone();
        let mut stripped = Vec::with_capacity(implying.len());
        for implying_id in implying {
            if let Some(tag) = tags.get_mut(&implying_id) {
                tag.implies.remove(&id);
                tag.updated = now.max(tag.created);
                stripped.push(tag.clone());
            }
        }
        tags.remove(&id);

        let graph = TagGraph::from_maps(self.categories.clone(), tags)?;
        Ok((graph, stripped))
    }
}
