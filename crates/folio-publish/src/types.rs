//! Domain types: principals, projects and resource paths.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identity of a caller interacting with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Account name of the principal.
    pub id: String,
    /// Administrators bypass maintenance mode and may abort any job.
    pub admin: bool,
}

impl Principal {
    /// An ordinary (non-administrator) principal.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: false,
        }
    }

    /// An administrator principal.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admin: true,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Logical unit of work the resources of a job belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized absolute path of a repository resource.
///
/// Construction normalizes to exactly one leading slash and no trailing
/// slash; `/` denotes the repository root folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// Create a normalized resource path.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            Self("/".to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `self` is a strict ancestor folder of `other`.
    pub fn is_ancestor_of(&self, other: &ResourcePath) -> bool {
        if self.0 == "/" {
            return other.0 != "/";
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse duplicates and overlaps in a requested resource set.
///
/// Exact duplicates are dropped, and a path covered by an ancestor folder
/// elsewhere in the set is dropped as well (publishing a folder covers its
/// subtree). First-occurrence order is preserved.
pub fn normalize_resource_set(paths: Vec<ResourcePath>) -> Vec<ResourcePath> {
    let mut result: Vec<ResourcePath> = Vec::with_capacity(paths.len());
    for path in paths {
        if result.iter().any(|kept| kept == &path || kept.is_ancestor_of(&path)) {
            continue;
        }
        result.retain(|kept| !path.is_ancestor_of(kept));
        result.push(path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_normalization() {
        assert_eq!(ResourcePath::new("site/index.html").as_str(), "/site/index.html");
        assert_eq!(ResourcePath::new("/site/").as_str(), "/site");
        assert_eq!(ResourcePath::new("  /site ").as_str(), "/site");
        assert_eq!(ResourcePath::new("/").as_str(), "/");
        assert_eq!(ResourcePath::new("").as_str(), "/");
    }

    #[test]
    fn ancestor_relation() {
        let root = ResourcePath::new("/");
        let site = ResourcePath::new("/site");
        let page = ResourcePath::new("/site/index.html");
        let sibling = ResourcePath::new("/sitemap");

        assert!(root.is_ancestor_of(&site));
        assert!(site.is_ancestor_of(&page));
        assert!(!site.is_ancestor_of(&sibling));
        assert!(!site.is_ancestor_of(&site));
        assert!(!page.is_ancestor_of(&site));
    }

    #[test]
    fn normalize_drops_duplicates_and_overlaps() {
        let normalized = normalize_resource_set(vec![
            ResourcePath::new("/a/b"),
            ResourcePath::new("/a"),
            ResourcePath::new("/a/c"),
            ResourcePath::new("/a"),
            ResourcePath::new("/d"),
        ]);
        assert_eq!(normalized, vec![ResourcePath::new("/a"), ResourcePath::new("/d")]);
    }

    #[test]
    fn normalize_keeps_order() {
        let normalized = normalize_resource_set(vec![
            ResourcePath::new("/z"),
            ResourcePath::new("/a"),
            ResourcePath::new("/m"),
        ]);
        assert_eq!(
            normalized,
            vec![ResourcePath::new("/z"), ResourcePath::new("/a"), ResourcePath::new("/m")]
        );
    }
}
