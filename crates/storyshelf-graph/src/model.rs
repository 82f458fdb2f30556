//! Stored records and the derived views built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::ids::{CategoryId, TagId};

// ============================================================================
// Color
// ============================================================================

/// 24-bit display color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    pub const GREY: Self = Self(0x80_80_80);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn components(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::GREY
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}': expected #rrggbb")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|_| ParseColorError(s.to_string()))
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

// ============================================================================
// Records
// ============================================================================

/// Case-insensitive lookup key for a display name.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A named grouping of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub color: Color,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Category {
    /// A draft category with the unset id; `create_category` assigns the id
    /// and timestamps.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::UNSET,
            name: name.into(),
            description: None,
            sort_order: 0,
            color: Color::default(),
            created: now,
            updated: now,
        }
    }

    pub fn with_id(mut self, id: CategoryId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// A named, categorized label that may imply other tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub category: CategoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub implies: BTreeSet<TagId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Tag {
    /// A draft tag with the unset id.
    pub fn new(name: impl Into<String>, category: CategoryId) -> Self {
        let now = Utc::now();
        Self {
            id: TagId::UNSET,
            name: name.into(),
            category,
            description: None,
            implies: BTreeSet::new(),
            created: now,
            updated: now,
        }
    }

    pub fn with_id(mut self, id: TagId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn implying<I>(mut self, implied: I) -> Self
    where
        I: IntoIterator<Item = TagId>,
    {
        self.implies.extend(implied);
        self
    }
}

// ============================================================================
// Derived views
// ============================================================================

/// A tag paired with its resolved category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagWithCategory {
    pub tag: Tag,
    pub category: Category,
}

impl TagWithCategory {
    pub fn id(&self) -> TagId {
        self.tag.id
    }

    pub(crate) fn display_key(&self) -> (i32, String, String) {
        (
            self.category.sort_order,
            name_key(&self.category.name),
            name_key(&self.tag.name),
        )
    }
}

/// A tag together with its four implication relation lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedTag {
    pub tag: Tag,
    pub category: Category,
    pub implied: Vec<TagWithCategory>,
    pub indirectly_implied: Vec<TagWithCategory>,
    pub implied_by: Vec<TagWithCategory>,
    pub indirectly_implied_by: Vec<TagWithCategory>,
}

impl ExtendedTag {
    pub fn id(&self) -> TagId {
        self.tag.id
    }

    pub fn implied_ids(&self) -> BTreeSet<TagId> {
        self.implied.iter().map(TagWithCategory::id).collect()
    }

    pub fn indirectly_implied_ids(&self) -> BTreeSet<TagId> {
        self.indirectly_implied.iter().map(TagWithCategory::id).collect()
    }

    pub fn implied_by_ids(&self) -> BTreeSet<TagId> {
        self.implied_by.iter().map(TagWithCategory::id).collect()
    }

    pub fn indirectly_implied_by_ids(&self) -> BTreeSet<TagId> {
        self.indirectly_implied_by
            .iter()
            .map(TagWithCategory::id)
            .collect()
    }
}
