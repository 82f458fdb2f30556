//! Entity identities.
//!
//! Categories and tags share one id scheme: a positive `u32`, with `0`
//! reserved for "not yet created". Snapshots never store the unset id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a [`crate::Category`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct CategoryId(u32);

impl CategoryId {
    /// The "not yet created" id.
    pub const UNSET: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for CategoryId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Identity of a [`crate::Tag`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TagId(u32);

impl TagId {
    /// The "not yet created" id.
    pub const UNSET: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for TagId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Next free id: `max(existing) + 1`, or `1` for an empty set. `None` once
/// `u32::MAX` is taken.
pub(crate) fn next_free<I>(existing: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    match existing.into_iter().max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_is_zero() {
        assert!(TagId::UNSET.is_unset());
        assert!(CategoryId::default().is_unset());
        assert!(!TagId::new(3).is_unset());
    }

    #[test]
    fn next_free_starts_at_one() {
        assert_eq!(next_free(Vec::<u32>::new()), Some(1));
        assert_eq!(next_free(vec![4, 2, 9]), Some(10));
    }

    #[test]
    fn next_free_is_none_when_max_is_taken() {
        assert_eq!(next_free(vec![3, u32::MAX]), None);
        assert_eq!(next_free(vec![u32::MAX - 1]), Some(u32::MAX));
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&TagId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: CategoryId = serde_json::from_str("12").unwrap();
        assert_eq!(back, CategoryId::new(12));
    }
}
