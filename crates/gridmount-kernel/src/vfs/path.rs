//! Translation between virtual paths and flat store keys.
//!
//! Virtual paths are what the dispatcher hands us (`/photos/2012/a.jpg`).
//! Store keys are the flat filenames kept by the blob store
//! (`photos/2012/a.jpg`). The separator is `/` on both sides.

/// Path separator shared by virtual paths and store keys.
pub const SEPARATOR: char = '/';

/// Returns true for the root path (`""` or `"/"`).
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Strip the leading separator of a virtual path.
pub fn to_store_key(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

/// Join a directory's virtual path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    format!("{parent}{SEPARATOR}{name}")
}

/// Anchored key prefix selecting everything below a virtual directory.
///
/// The literal always ends with exactly one separator, except for the root
/// which maps to the empty prefix and therefore matches every key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    literal: String,
}

impl KeyPrefix {
    /// Prefix for the directory at `path`.
    pub fn for_path(path: &str) -> Self {
        if is_root(path) {
            return Self::root();
        }
        let key = to_store_key(path).trim_end_matches(SEPARATOR);
        if key.is_empty() {
            return Self::root();
        }
        Self {
            literal: format!("{key}{SEPARATOR}"),
        }
    }

    /// The empty prefix.
    pub fn root() -> Self {
        Self {
            literal: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.literal.is_empty()
    }

    /// The unescaped prefix text.
    pub fn as_str(&self) -> &str {
        &self.literal
    }

    /// Returns true if `key` lies below this prefix.
    pub fn matches(&self, key: &str) -> bool {
        key.starts_with(&self.literal)
    }

    /// The part of `key` after this prefix, if it matches.
    pub fn remainder<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.literal.as_str())
    }

    /// Regex source anchored at the start of the key, metacharacters escaped.
    pub fn pattern(&self) -> String {
        format!("^{}", regex::escape(&self.literal))
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_store_key() {
        assert_eq!(to_store_key("/a/b.txt"), "a/b.txt");
        assert_eq!(to_store_key("a/b.txt"), "a/b.txt");
        assert_eq!(to_store_key("/"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b.txt"), "/a/b.txt");
        assert_eq!(join("/a/", "b.txt"), "/a/b.txt");
    }

    #[test]
    fn test_prefix_trailing_separator() {
        assert_eq!(KeyPrefix::for_path("/a").as_str(), "a/");
        assert_eq!(KeyPrefix::for_path("/a/").as_str(), "a/");
        assert_eq!(KeyPrefix::for_path("/a//").as_str(), "a/");
        assert_eq!(KeyPrefix::for_path("/a/b").as_str(), "a/b/");
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        for root in ["", "/"] {
            let prefix = KeyPrefix::for_path(root);
            assert!(prefix.is_root());
            assert!(prefix.matches("anything"));
            assert_eq!(prefix.pattern(), "^");
        }
    }

    #[test]
    fn test_prefix_matching() {
        let prefix = KeyPrefix::for_path("/a");
        assert!(prefix.matches("a/b.txt"));
        assert!(!prefix.matches("ab.txt"));
        assert!(!prefix.matches("a"));
        assert_eq!(prefix.remainder("a/b/c.txt"), Some("b/c.txt"));
        assert_eq!(prefix.remainder("b/c.txt"), None);
    }

    #[test]
    fn test_pattern_escapes_metacharacters() {
        let prefix = KeyPrefix::for_path("/v1.0 (draft)+[x]");
        let re = regex::Regex::new(&prefix.pattern()).unwrap();
        assert!(re.is_match("v1.0 (draft)+[x]/notes.txt"));
        assert!(!re.is_match("v1x0 (draft)+[x]/notes.txt"));
    }
}
