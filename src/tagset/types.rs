//! Core tag types
//!
//! - `Tag`: a single name/value attribute, where a missing value is a wildcard
//! - `Tagset`: an unordered multiset of tags
//!
//! A `Tagset` keeps its tags sorted internally, so equality, hashing and the
//! canonical text form only depend on which tags it holds (and how often),
//! never on insertion order.

use crate::tagset::error::TagsetResult;
use crate::tagset::parser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single `(name, value)` attribute
///
/// A `value` of `None` is a wildcard: as a query it matches any value the
/// candidate holds for `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    /// Tag name (never empty)
    pub name: String,
    /// Tag value, `None` for a wildcard
    pub value: Option<String>,
}

impl Tag {
    /// Create a tag with a concrete value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Create a wildcard tag (no value)
    pub fn wildcard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.value.is_none()
    }
}

/// An unordered multiset of tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tagset {
    /// Sorted by (name, value); duplicates kept
    tags: Vec<Tag>,
}

impl Tagset {
    /// Create an empty tagset
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the canonical text form (`a=1,b`)
    pub fn parse(text: &str) -> TagsetResult<Self> {
        parser::parse_tagset(text)
    }

    /// Builder: add a tag with a value
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(Tag::new(name, value));
        self
    }

    /// Builder: add a wildcard tag
    pub fn wildcard(mut self, name: impl Into<String>) -> Self {
        self.insert(Tag::wildcard(name));
        self
    }

    /// Insert a tag, keeping any existing copies
    pub fn insert(&mut self, tag: Tag) {
        let pos = self.tags.partition_point(|t| t <= &tag);
        self.tags.insert(pos, tag);
    }

    /// Remove one copy of `tag`, returning whether it was present
    pub fn remove(&mut self, tag: &Tag) -> bool {
        match self.tags.binary_search(tag) {
            Ok(pos) => {
                self.tags.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove every tag named `name`, returning how many were removed
    pub fn remove_name(&mut self, name: &str) -> usize {
        let before = self.tags.len();
        self.tags.retain(|t| t.name != name);
        before - self.tags.len()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate tags in canonical order
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    /// Distinct tag names, sorted
    pub fn names(&self) -> BTreeSet<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// All values held for `name` (`None` entries are wildcards)
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name == name)
            .map(|t| t.value.as_deref())
    }

    /// Check whether any tag is named `name`
    pub fn has_name(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    /// Check whether the exact `(name, value)` pair is present
    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.name == name && t.value.as_deref() == Some(value))
    }

    /// Check whether `name` is present as a wildcard
    pub fn has_wildcard(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name && t.is_wildcard())
    }

    /// First value for `name`, if any concrete value exists
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .filter(|t| t.name == name)
            .find_map(|t| t.value.as_deref())
    }
}

impl FromIterator<Tag> for Tagset {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut tags: Vec<Tag> = iter.into_iter().collect();
        tags.sort();
        Self { tags }
    }
}

impl Extend<Tag> for Tagset {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.tags.extend(iter);
        self.tags.sort();
    }
}

impl<'a> IntoIterator for &'a Tagset {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl IntoIterator for Tagset {
    type Item = Tag;
    type IntoIter = std::vec::IntoIter<Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.into_iter()
    }
}

impl fmt::Display for Tagset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&parser::format_tagset(self))
    }
}

impl FromStr for Tagset {
    type Err = crate::tagset::TagsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::parse_tagset(s)
    }
}

// Tagsets travel as their canonical text form.
impl Serialize for Tagset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&parser::format_tagset(self))
    }
}

impl<'de> Deserialize<'de> for Tagset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parser::parse_tagset(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = Tagset::new().tag("color", "red").tag("size", "xl");
        let b = Tagset::new().tag("size", "xl").tag("color", "red");
        assert_eq!(a, b);

        let mut ha = std::collections::hash_map::DefaultHasher::new();
        let mut hb = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(&a, &mut ha);
        std::hash::Hash::hash(&b, &mut hb);
        assert_eq!(
            std::hash::Hasher::finish(&ha),
            std::hash::Hasher::finish(&hb)
        );
    }

    #[test]
    fn test_duplicates_add_multiplicity() {
        let once = Tagset::new().tag("a", "1");
        let twice = Tagset::new().tag("a", "1").tag("a", "1");
        assert_ne!(once, twice);
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn test_values_and_lookup() {
        let tags = Tagset::new()
            .tag("a", "2")
            .tag("a", "1")
            .wildcard("a")
            .tag("b", "x");

        let values: Vec<_> = tags.values("a").collect();
        assert_eq!(values, vec![None, Some("1"), Some("2")]);
        assert!(tags.has_tag("a", "1"));
        assert!(!tags.has_tag("a", "3"));
        assert!(tags.has_wildcard("a"));
        assert!(!tags.has_wildcard("b"));
        assert_eq!(tags.get("b"), Some("x"));
        assert_eq!(tags.get("c"), None);
        assert_eq!(tags.names().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_remove() {
        let mut tags = Tagset::new().tag("a", "1").tag("a", "1").tag("b", "2");
        assert!(tags.remove(&Tag::new("a", "1")));
        assert_eq!(tags.len(), 2);
        assert!(!tags.remove(&Tag::new("a", "9")));
        assert_eq!(tags.remove_name("a"), 1);
        assert_eq!(tags, Tagset::new().tag("b", "2"));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let tags = Tagset::new().tag("color", "red").wildcard("run");
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, "\"color=red,run\"");

        let restored: Tagset = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tags);
    }
}
