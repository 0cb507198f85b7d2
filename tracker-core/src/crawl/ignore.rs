//! Three-layer ignore rules applied while crawling: exact paths, basename
//! globs, and "content markers" (a directory containing a file with one of
//! these basenames is skipped wholesale, e.g. `.nomedia`/`backup.metadata`).

use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    exact_paths: Vec<String>,
    name_globs: Vec<Regex>,
    content_markers: Vec<String>,
}

impl IgnoreRules {
    /// `patterns` starting with `/` are treated as exact paths; everything
    /// else is a basename glob.
    pub fn new(patterns: &[String], content_markers: &[String]) -> Self {
        let mut exact_paths = Vec::new();
        let mut name_globs = Vec::new();
        for pattern in patterns {
            if pattern.starts_with('/') {
                exact_paths.push(pattern.clone());
            } else if let Some(re) = glob_to_regex(pattern) {
                name_globs.push(re);
            }
        }
        Self {
            exact_paths,
            name_globs,
            content_markers: content_markers.to_vec(),
        }
    }

    pub fn is_path_ignored(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        if self.exact_paths.iter().any(|p| p == path_str.as_ref()) {
            return true;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.name_globs.iter().any(|re| re.is_match(name)) {
                return true;
            }
        }
        false
    }

    /// Whether `dir` should be skipped because it directly contains a file
    /// whose basename matches one of the configured content markers.
    pub fn has_content_marker(&self, dir: &Path) -> bool {
        if self.content_markers.is_empty() {
            return false;
        }
        let Ok(entries) = std::fs::read_dir(dir) else {
            return false;
        };
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if self.content_markers.iter().any(|m| m == name) {
                    return true;
                }
            }
        }
        false
    }
}

/// Whether `entry` is hidden: a leading dot, or (unavailable on this
/// platform, so treated as visible) a FAT hidden-attribute bit.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn exact_path_ignored() {
        let rules = IgnoreRules::new(&["/home/user/private".to_string()], &[]);
        assert!(rules.is_path_ignored(&PathBuf::from("/home/user/private")));
        assert!(!rules.is_path_ignored(&PathBuf::from("/home/user/public")));
    }

    #[test]
    fn glob_matches_basename() {
        let rules = IgnoreRules::new(&["*.tmp".to_string()], &[]);
        assert!(rules.is_path_ignored(&PathBuf::from("/a/b/scratch.tmp")));
        assert!(!rules.is_path_ignored(&PathBuf::from("/a/b/scratch.txt")));
    }

    #[test]
    fn hidden_dotfile_is_hidden() {
        assert!(is_hidden(&PathBuf::from("/a/.hidden")));
        assert!(!is_hidden(&PathBuf::from("/a/visible")));
    }
}
