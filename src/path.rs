//! Path model.
//!
//! A path such as `users/ann/posts[2]/title` addresses a node in the tree.
//! Segments are separated by `/`; array indices are written in brackets and
//! may follow a name directly. The canonical form has no leading or trailing
//! separators and the empty path is the root.

use std::fmt;

/// Path separator.
pub const SEPARATOR: char = '/';

/// One step of a path: a property name or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    Name(String),
    Index(usize),
}

impl PathKey {
    /// Whether this key is a single-segment wildcard in a path pattern:
    /// `*`, `[*]` or a `$variable`.
    pub fn is_wildcard(&self) -> bool {
        match self {
            PathKey::Name(name) => name == "*" || name == "[*]" || name.starts_with('$'),
            PathKey::Index(_) => false,
        }
    }

    /// Whether this key, read as a pattern segment, matches `key`.
    pub fn matches(&self, key: &PathKey) -> bool {
        self.is_wildcard() || self == key
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Name(name) => write!(f, "{}", name),
            PathKey::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Name(name.to_string())
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// Strips leading and trailing separators.
pub fn normalize(path: &str) -> &str {
    path.trim_matches(SEPARATOR)
}

/// Splits a path into its keys. Bracketed numeric segments decode to
/// [`PathKey::Index`]; the content of a bracket is never split on `/`.
pub fn split_to_keys(path: &str) -> Vec<PathKey> {
    let mut keys = Vec::new();
    let mut name = String::new();
    let mut chars = normalize(path).chars();

    while let Some(c) = chars.next() {
        match c {
            SEPARATOR => {
                if !name.is_empty() {
                    keys.push(PathKey::Name(std::mem::take(&mut name)));
                }
            }
            '[' => {
                if !name.is_empty() {
                    keys.push(PathKey::Name(std::mem::take(&mut name)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                match inner.parse::<usize>() {
                    Ok(index) if closed => keys.push(PathKey::Index(index)),
                    _ if closed => keys.push(PathKey::Name(format!("[{}]", inner))),
                    _ => keys.push(PathKey::Name(format!("[{}", inner))),
                }
            }
            _ => name.push(c),
        }
    }
    if !name.is_empty() {
        keys.push(PathKey::Name(name));
    }
    keys
}

/// Builds the canonical path for a key sequence.
pub fn keys_to_path(keys: &[PathKey]) -> String {
    keys.iter().fold(String::new(), |path, key| child_key(&path, key))
}

/// The trailing key of `path`; the root yields an empty name.
pub fn key_of(path: &str) -> PathKey {
    split_to_keys(path)
        .pop()
        .unwrap_or_else(|| PathKey::Name(String::new()))
}

/// The parent path, or `None` at the root.
pub fn parent(path: &str) -> Option<String> {
    let path = normalize(path);
    if path.is_empty() {
        return None;
    }
    let cut = if path.ends_with(']') {
        path.rfind('[')
    } else {
        path.rfind(SEPARATOR)
    };
    Some(match cut {
        Some(index) => normalize(&path[..index]).to_string(),
        None => String::new(),
    })
}

/// Joins `rel` (normalized) below `path` with a single separator. A relative
/// path that starts with a bracket is appended without a separator.
pub fn child(path: &str, rel: &str) -> String {
    let path = normalize(path);
    let rel = normalize(rel);
    if rel.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        rel.to_string()
    } else if rel.starts_with('[') {
        format!("{}{}", path, rel)
    } else {
        format!("{}{}{}", path, SEPARATOR, rel)
    }
}

/// Whether `name` reads back as exactly one property key: non-empty and
/// free of separators and brackets.
pub fn is_valid_key(name: &str) -> bool {
    !name.is_empty() && !name.contains([SEPARATOR, '[', ']'])
}

/// Joins a single typed key below `path`.
pub fn child_key(path: &str, key: &PathKey) -> String {
    match key {
        PathKey::Name(name) => child(path, name),
        PathKey::Index(index) => format!("{}[{}]", normalize(path), index),
    }
}

/// A parsed path with relationship tests against other paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    path: String,
    keys: Vec<PathKey>,
}

impl PathInfo {
    pub fn new(path: &str) -> Self {
        Self {
            path: normalize(path).to_string(),
            keys: split_to_keys(path),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    pub fn is_root(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &PathInfo) -> bool {
        other.keys.len() > self.keys.len() && self.is_prefix_of(other)
    }

    /// Whether this path lies strictly below `other`.
    pub fn is_descendant_of(&self, other: &PathInfo) -> bool {
        other.is_ancestor_of(self)
    }

    pub fn is_parent_of(&self, other: &PathInfo) -> bool {
        other.keys.len() == self.keys.len() + 1 && self.is_prefix_of(other)
    }

    pub fn is_child_of(&self, other: &PathInfo) -> bool {
        other.is_parent_of(self)
    }

    /// Whether `other` is this path, an ancestor of it, or a descendant of it.
    /// Wildcard segments match any key.
    pub fn is_on_trail_of(&self, other: &PathInfo) -> bool {
        self.keys
            .iter()
            .zip(other.keys.iter())
            .all(|(a, b)| a.matches(b) || b.matches(a))
    }

    /// Whether `path` matches this path read as a pattern, segment for segment.
    pub fn matches_pattern(&self, path: &PathInfo) -> bool {
        self.keys.len() == path.keys.len()
            && self.keys.iter().zip(path.keys.iter()).all(|(p, k)| p.matches(k))
    }

    fn is_prefix_of(&self, other: &PathInfo) -> bool {
        self.keys
            .iter()
            .zip(other.keys.iter())
            .all(|(a, b)| a.matches(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PathKey {
        PathKey::Name(s.to_string())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/users/ann/"), "users/ann");
        assert_eq!(normalize("///"), "");
    }

    #[test]
    fn test_split_to_keys() {
        assert_eq!(
            split_to_keys("users/ann/posts[2]/title"),
            vec![name("users"), name("ann"), name("posts"), PathKey::Index(2), name("title")]
        );
        assert_eq!(split_to_keys("m[0][1]"), vec![name("m"), PathKey::Index(0), PathKey::Index(1)]);
        assert_eq!(split_to_keys("a/[3]"), vec![name("a"), PathKey::Index(3)]);
        assert!(split_to_keys("").is_empty());
    }

    #[test]
    fn test_bracket_content_is_not_split() {
        assert_eq!(split_to_keys("a[x/y]/b"), vec![name("a"), name("[x/y]"), name("b")]);
        assert_eq!(parent("a[x/y]"), Some("a".to_string()));
    }

    #[test]
    fn test_key_of_and_parent() {
        assert_eq!(key_of("users/ann"), name("ann"));
        assert_eq!(key_of("list[4]"), PathKey::Index(4));
        assert_eq!(key_of(""), name(""));
        assert_eq!(parent("users/ann"), Some("users".to_string()));
        assert_eq!(parent("list[4]"), Some("list".to_string()));
        assert_eq!(parent("users"), Some(String::new()));
        assert_eq!(parent(""), None);
    }

    #[test]
    fn test_valid_keys() {
        assert!(is_valid_key("name"));
        assert!(is_valid_key("first name.v2"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("list[0]"));
        assert!(!is_valid_key("]"));
    }

    #[test]
    fn test_child() {
        assert_eq!(child("users", "/ann/"), "users/ann");
        assert_eq!(child("", "users"), "users");
        assert_eq!(child("list", "[1]"), "list[1]");
        assert_eq!(child_key("list", &PathKey::Index(7)), "list[7]");
        assert_eq!(keys_to_path(&split_to_keys("a/b[2]/c")), "a/b[2]/c");
    }

    #[test]
    fn test_path_relations() {
        let users = PathInfo::new("users");
        let ann = PathInfo::new("users/ann");
        let email = PathInfo::new("users/ann/email");
        assert!(users.is_ancestor_of(&email));
        assert!(users.is_parent_of(&ann));
        assert!(!users.is_parent_of(&email));
        assert!(email.is_descendant_of(&users));
        assert!(ann.is_child_of(&users));
        assert!(email.is_on_trail_of(&users));
        assert!(users.is_on_trail_of(&email));
        assert!(!PathInfo::new("posts").is_on_trail_of(&users));
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = PathInfo::new("users/$uid/posts/*");
        assert!(pattern.matches_pattern(&PathInfo::new("users/ann/posts/p1")));
        assert!(!pattern.matches_pattern(&PathInfo::new("users/ann/posts")));
        assert!(PathInfo::new("items[*]").matches_pattern(&PathInfo::new("items[3]")));
    }
}
