//! Per-miner processing queues: files, directories-to-crawl, and the
//! module list awaiting their first crawl. Drain order per tick: one file
//! if available, else one level of the head directory,
//! else the next module; "finished" once all three are empty.

use crate::crawl::Crawler;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RootModule {
    pub path: PathBuf,
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A file is ready for the per-file pipeline.
    File(PathBuf),
    /// No file was ready this tick, but progress was made (a directory
    /// level was read, or a module's root was queued); call `tick` again.
    Progressed,
    /// Every queue and the module list are empty.
    Finished,
}

impl Tick {
    pub fn file(path: PathBuf) -> Self {
        Tick::File(path)
    }
}

pub struct Scheduler {
    files: VecDeque<PathBuf>,
    directories: VecDeque<(PathBuf, bool)>,
    modules: VecDeque<RootModule>,
}

impl Scheduler {
    pub fn new(modules: Vec<RootModule>) -> Self {
        Self {
            files: VecDeque::new(),
            directories: VecDeque::new(),
            modules: modules.into_iter().collect(),
        }
    }

    pub fn enqueue_file(&mut self, path: PathBuf) {
        self.files.push_back(path);
    }

    pub fn enqueue_directory(&mut self, path: PathBuf, recursive: bool) {
        self.directories.push_back((path, recursive));
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty() && self.modules.is_empty()
    }

    /// Advances the schedule by exactly one unit of work.
    pub fn tick(&mut self, crawler: &Crawler) -> Tick {
        if let Some(file) = self.files.pop_front() {
            return Tick::file(file);
        }

        if let Some((dir, recursive)) = self.directories.pop_front() {
            let (files, subdirs) = crawler.scan_one_level(&dir);
            for f in files {
                self.files.push_back(f);
            }
            if recursive {
                for d in subdirs {
                    self.directories.push_back((d, true));
                }
            }
            return Tick::Progressed;
        }

        if let Some(module) = self.modules.pop_front() {
            self.directories.push_back((module.path, module.recursive));
            return Tick::Progressed;
        }

        Tick::Finished
    }

    /// Pre-unmount / move-source cancellation: drops every queued file and
    /// directory entry that lives under `root`.
    pub fn cancel_subtree(&mut self, root: &Path) {
        self.files.retain(|f| !f.starts_with(root));
        self.directories.retain(|(d, _)| !d.starts_with(root));
    }

    /// Rewrites every queued path under `from` to the equivalent path under
    /// `to`, for a monitor-reported move of an in-flight subtree.
    pub fn rename_subtree(&mut self, from: &Path, to: &Path) {
        for f in self.files.iter_mut() {
            if let Ok(suffix) = f.strip_prefix(from) {
                *f = to.join(suffix);
            }
        }
        for (d, _) in self.directories.iter_mut() {
            if let Ok(suffix) = d.strip_prefix(from) {
                *d = to.join(suffix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::IgnoreRules;
    use tempfile::tempdir;

    #[test]
    fn drains_file_before_directory_before_module() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let crawler = Crawler::new(IgnoreRules::default());
        let mut sched = Scheduler::new(vec![RootModule {
            path: dir.path().to_path_buf(),
            recursive: true,
        }]);

        assert_eq!(sched.tick(&crawler), Tick::Progressed); // module -> directory queue
        assert_eq!(sched.tick(&crawler), Tick::Progressed); // directory -> file queue
        assert_eq!(sched.tick(&crawler), Tick::file(dir.path().join("a.txt")));
        assert_eq!(sched.tick(&crawler), Tick::Finished);
    }

    #[test]
    fn cancel_subtree_drops_queued_work_under_root() {
        let mut sched = Scheduler::new(vec![]);
        sched.enqueue_file(PathBuf::from("/mnt/usb/a.txt"));
        sched.enqueue_file(PathBuf::from("/home/user/b.txt"));
        sched.cancel_subtree(Path::new("/mnt/usb"));
        assert_eq!(sched.files.len(), 1);
    }
}
