//! Resolution of the `&DESKTOP`/`&DOCUMENTS`/... aliases against a user's
//! home directory. A real desktop environment resolves these via
//! `xdg-user-dirs`; here we accept an explicit map so the crawler doesn't
//! need to shell out or read `user-dirs.dirs` itself.

use crate::model::SPECIAL_DIR_ALIASES;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A resolved set of XDG user directories, keyed by alias (e.g. `&DESKTOP`).
#[derive(Debug, Clone, Default)]
pub struct XdgUserDirs(HashMap<String, PathBuf>);

impl XdgUserDirs {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, alias: &str, path: impl Into<PathBuf>) {
        self.0.insert(alias.to_string(), path.into());
    }

    /// Builds the conventional `~/Desktop`, `~/Documents`, ... mapping.
    pub fn conventional(home: &Path) -> Self {
        let mut dirs = Self::new();
        dirs.insert("&DESKTOP", home.join("Desktop"));
        dirs.insert("&DOCUMENTS", home.join("Documents"));
        dirs.insert("&DOWNLOAD", home.join("Downloads"));
        dirs.insert("&MUSIC", home.join("Music"));
        dirs.insert("&PICTURES", home.join("Pictures"));
        dirs.insert("&PUBLIC_SHARE", home.join("Public"));
        dirs.insert("&TEMPLATES", home.join("Templates"));
        dirs.insert("&VIDEOS", home.join("Videos"));
        dirs.insert("&HOME", home.to_path_buf());
        dirs
    }

    fn get(&self, alias: &str) -> Option<&Path> {
        self.0.get(alias).map(PathBuf::as_path)
    }
}

/// Resolves a list of configured path/alias entries into concrete,
/// deduplicated paths. Entries equal to the home directory itself are
/// dropped (indexing the whole home tree by accident is a footgun), and
/// unresolvable aliases are dropped with a debug log rather than failing
/// the whole list.
pub fn resolve_dirs(entries: &[String], home: &Path, dirs: &XdgUserDirs) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in entries {
        if entry == "$HOME" {
            continue;
        }
        let resolved = if SPECIAL_DIR_ALIASES.contains(&entry.as_str()) || entry == "&HOME" {
            match dirs.get(entry) {
                Some(path) => path.to_path_buf(),
                None => {
                    tracing::debug!(alias = %entry, "unresolvable XDG alias, skipping");
                    continue;
                }
            }
        } else {
            PathBuf::from(entry)
        };

        if resolved == home {
            continue;
        }
        if !out.contains(&resolved) {
            out.push(resolved);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aliases_and_drops_home() {
        let home = PathBuf::from("/home/alice");
        let dirs = XdgUserDirs::conventional(&home);
        let entries = vec![
            "&DESKTOP".to_string(),
            "$HOME".to_string(),
            "/home/alice".to_string(),
            "/mnt/data".to_string(),
        ];

        let resolved = resolve_dirs(&entries, &home, &dirs);

        assert_eq!(
            resolved,
            vec![
                PathBuf::from("/home/alice/Desktop"),
                PathBuf::from("/mnt/data"),
            ]
        );
    }

    #[test]
    fn unresolvable_alias_is_skipped() {
        let home = PathBuf::from("/home/alice");
        let dirs = XdgUserDirs::new();
        let resolved = resolve_dirs(&["&MUSIC".to_string()], &home, &dirs);
        assert!(resolved.is_empty());
    }
}
