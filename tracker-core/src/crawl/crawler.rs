//! Depth-first directory walk rooted at each configured path. Blocking: the
//! scheduler runs it inline rather than deferring it to a background task.

use crate::crawl::ignore::{is_hidden, IgnoreRules};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlProgress {
    pub files_found: u64,
    pub directories_found: u64,
}

#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub progress: CrawlProgress,
}

pub struct Crawler {
    rules: IgnoreRules,
}

impl Crawler {
    pub fn new(rules: IgnoreRules) -> Self {
        Self { rules }
    }

    /// Walks `root`. When `recursive` is false, only `root`'s direct
    /// children are visited (matches `index-single-directories`); queued
    /// subdirectories are otherwise appended to `directories` for the
    /// scheduler to drain one level at a time.
    pub fn crawl_root(&self, root: &Path, recursive: bool) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        self.visit_dir(root, recursive, &mut outcome);
        outcome
    }

    /// Reads exactly one directory level: the files and (if present)
    /// immediate subdirectories of `dir`, applying hidden/ignore/marker
    /// filtering. Used by the scheduler to drain its directory queue one
    /// entry at a time instead of eagerly walking a whole subtree.
    pub fn scan_one_level(&self, dir: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut outcome = CrawlOutcome::default();
        if self.rules.has_content_marker(dir) {
            return (Vec::new(), Vec::new());
        }
        let Ok(entries) = std::fs::read_dir(dir) else {
            return (Vec::new(), Vec::new());
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if is_hidden(&path) || self.rules.is_path_ignored(&path) {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                outcome.directories.push(path);
            } else if file_type.is_file() {
                outcome.files.push(path);
            }
        }
        (outcome.files, outcome.directories)
    }

    fn visit_dir(&self, dir: &Path, recursive: bool, outcome: &mut CrawlOutcome) {
        if self.rules.has_content_marker(dir) {
            debug!(?dir, "directory skipped: content marker present");
            return;
        }

        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if is_hidden(&path) || self.rules.is_path_ignored(&path) {
                continue;
            }

            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                outcome.progress.directories_found += 1;
                outcome.directories.push(path.clone());
                if recursive {
                    self.visit_dir(&path, recursive, outcome);
                }
            } else if file_type.is_file() {
                outcome.progress.files_found += 1;
                outcome.files.push(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::ignore::IgnoreRules;
    use tempfile::tempdir;

    #[test]
    fn crawls_recursively_and_skips_hidden() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"nope").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"hi").unwrap();

        let crawler = Crawler::new(IgnoreRules::default());
        let outcome = crawler.crawl_root(dir.path(), true);

        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.directories.len(), 1);
    }

    #[test]
    fn content_marker_skips_whole_directory() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("marked")).unwrap();
        std::fs::write(dir.path().join("marked/backup.metadata"), b"").unwrap();
        std::fs::write(dir.path().join("marked/real.txt"), b"hi").unwrap();

        let rules = IgnoreRules::new(&[], &["backup.metadata".to_string()]);
        let crawler = Crawler::new(rules);
        let outcome = crawler.crawl_root(dir.path(), true);

        assert!(outcome.files.is_empty());
    }
}
