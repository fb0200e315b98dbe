//! Pact identifiers and the title hierarchy.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator placed between title segments in a derived id.
const TITLE_SEPARATOR: &str = "__";

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").unwrap());

/// Opaque pact identifier, also used as the storage file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PactId(String);

impl PactId {
    /// Explicit id override, taken verbatim.
    pub fn new(id: impl Into<String>) -> Self {
        PactId(id.into())
    }

    /// Derive an id from a hierarchical title such as `["suite", "test"]`.
    ///
    /// Each segment is trimmed and every run of characters outside
    /// `[A-Za-z0-9_-]` becomes a single `_`. Segments are joined with `__`.
    pub fn from_title<S: AsRef<str>>(title: &[S]) -> Self {
        let parts: Vec<String> = title
            .iter()
            .map(|segment| segment.as_ref().trim())
            .filter(|segment| !segment.is_empty())
            .map(|segment| UNSAFE_CHARS.replace_all(segment, "_").into_owned())
            .collect();
        PactId(parts.join(TITLE_SEPARATOR))
    }

    /// Validate an id received from outside, rejecting anything that could
    /// escape the pact folder.
    pub fn parse(id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return None;
        }
        Some(PactId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PactId {
    fn from(id: &str) -> Self {
        PactId::new(id)
    }
}

/// Pacts grouped by their title path.
///
/// Title segments only ever become keys of a `BTreeMap`; nothing is looked up
/// or assigned by name on a shared object, so segments such as `__proto__`
/// or `constructor` are plain keys like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleTree {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pacts: Vec<PactId>,
    #[serde(flatten)]
    pub children: BTreeMap<String, TitleTree>,
}

impl TitleTree {
    /// Insert a pact under its title path. Blank segments are skipped.
    pub fn insert<S: AsRef<str>>(&mut self, title: &[S], id: PactId) {
        let mut node = self;
        for segment in title.iter().map(|s| s.as_ref().trim()) {
            if segment.is_empty() {
                continue;
            }
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.pacts.push(id);
    }

    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a [String], PactId)>,
    {
        let mut tree = TitleTree::default();
        for (title, id) in entries {
            tree.insert(title, id);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.pacts.len() + self.children.values().map(TitleTree::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_title_is_deterministic_and_safe() {
        let id = PactId::from_title(&["Inventory API", "creates a device/child"]);
        assert_eq!(id.as_str(), "Inventory_API__creates_a_device_child");
        assert_eq!(
            id,
            PactId::from_title(&["Inventory API", "creates a device/child"])
        );
    }

    #[test]
    fn test_from_title_skips_blank_segments() {
        let id = PactId::from_title(&["suite", "  ", "test"]);
        assert_eq!(id.as_str(), "suite__test");
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(PactId::parse("../etc/passwd").is_none());
        assert!(PactId::parse("a/b").is_none());
        assert!(PactId::parse("a\\b").is_none());
        assert!(PactId::parse("   ").is_none());
        assert_eq!(PactId::parse(" suite__test ").unwrap().as_str(), "suite__test");
    }

    #[test]
    fn test_title_tree_groups_by_path() {
        let a = vec!["suite".to_string(), "a".to_string()];
        let b = vec!["suite".to_string(), "b".to_string()];
        let c = vec!["other".to_string()];
        let tree = TitleTree::build([
            (a.as_slice(), PactId::new("suite__a")),
            (b.as_slice(), PactId::new("suite__b")),
            (c.as_slice(), PactId::new("other")),
        ]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.children["suite"].children.len(), 2);
        assert_eq!(tree.children["other"].pacts, vec![PactId::new("other")]);
    }

    #[test]
    fn test_title_tree_treats_reserved_names_as_keys() {
        let title = vec!["__proto__".to_string(), "constructor".to_string()];
        let mut tree = TitleTree::default();
        tree.insert(&title, PactId::new("x"));
        assert_eq!(
            tree.children["__proto__"].children["constructor"].pacts,
            vec![PactId::new("x")]
        );
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["__proto__"]["constructor"]["pacts"][0], "x");
    }
}
