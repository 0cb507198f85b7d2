//! Configuration model for the filesystem miner.
//!
//! Mirrors the key set documented by the daemon's settings schema: crawl
//! scope, throttling, monitor behaviour, volume handling, and writeback.
//! Every field carries a default so a bare `Config::default()` is a valid,
//! conservative configuration.

use serde::{Deserialize, Serialize};

/// Special directory aliases resolved against the user's XDG user-dirs map.
pub const SPECIAL_DIR_ALIASES: &[&str] = &[
    "&DESKTOP",
    "&DOCUMENTS",
    "&DOWNLOAD",
    "&MUSIC",
    "&PICTURES",
    "&PUBLIC_SHARE",
    "&TEMPLATES",
    "&VIDEOS",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Log verbosity: 0 = errors, 1 = minimal, 2 = detailed, 3 = debug.
    pub verbosity: u8,

    /// Seconds to wait after startup before the first crawl begins, so the
    /// daemon doesn't compete with other services for disk I/O right after
    /// login/boot.
    pub initial_sleep_secs: u32,

    /// Inter-item sleep level (0 = no throttle, 20 = maximally gentle).
    /// Raise this on spinning disks shared with other workloads.
    pub throttle: u8,

    /// Whether filesystem change notifications are subscribed to at all;
    /// disabling this means only explicit/periodic crawls keep the index
    /// fresh.
    pub enable_monitors: bool,

    /// Percent of free space below which crawling pauses; -1 disables the
    /// check entirely (useful on filesystems that don't report free space
    /// reliably).
    pub low_disk_space_limit: i8,

    /// -2 disables periodic crawling outright, -1 crawls once on an unclean
    /// shutdown, 0 always crawls on startup, N re-crawls every N days.
    pub crawling_interval: i16,

    /// Days an unmounted removable volume's resources are kept before the
    /// stale-volume GC deletes them; 0 disables the GC.
    pub removable_days_threshold: u16,

    /// Roots crawled recursively. Entries may be absolute paths or one of
    /// `SPECIAL_DIR_ALIASES`; `$HOME` itself is always ignored to avoid
    /// indexing the whole home directory by accident.
    pub index_recursive_directories: Vec<String>,

    /// Roots crawled non-recursively (only their direct children).
    pub index_single_directories: Vec<String>,

    /// Directories excluded from crawling. A leading `/` means an exact
    /// path; otherwise the entry is a basename glob.
    pub ignored_directories: Vec<String>,

    /// A directory is skipped entirely if it contains any file whose
    /// basename matches one of these markers (e.g. `backup.metadata`).
    pub ignored_directories_with_content: Vec<String>,

    /// Files excluded from crawling, same path/glob rule as
    /// `ignored_directories`.
    pub ignored_files: Vec<String>,

    /// Whether removable (USB, SD) devices are indexed at all.
    pub index_removable_devices: bool,

    /// Whether optical discs are indexed. Forced to `false` when
    /// `index_removable_devices` is `false`, regardless of what's configured
    /// here; see [`Config::normalize`].
    pub index_optical_discs: bool,

    /// Whether indexing proceeds while running on battery power.
    pub index_on_battery: bool,

    /// Whether the very first index pass is allowed to run on battery even
    /// if `index_on_battery` is otherwise false (avoids an indefinitely
    /// empty index on laptops that rarely see AC power).
    pub index_on_battery_first_time: bool,

    /// Whether store updates carrying writeback predicates are forwarded to
    /// an external writer.
    pub enable_writeback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: 0,
            initial_sleep_secs: 15,
            throttle: 0,
            enable_monitors: true,
            low_disk_space_limit: 1,
            crawling_interval: 0,
            removable_days_threshold: 3,
            index_recursive_directories: vec!["&DESKTOP".into(), "&DOCUMENTS".into()],
            index_single_directories: vec!["&HOME".into()],
            ignored_directories: vec![".git".into(), "node_modules".into()],
            ignored_directories_with_content: vec!["backup.metadata".into()],
            ignored_files: vec!["*~".into(), "*.o".into()],
            index_removable_devices: true,
            index_optical_discs: false,
            index_on_battery: false,
            index_on_battery_first_time: true,
            enable_writeback: false,
        }
    }
}

impl Config {
    /// Applies cross-field constraints that can't be expressed as a plain
    /// per-field bound, e.g. optical discs require removable indexing.
    pub fn normalize(&mut self) {
        if !self.index_removable_devices {
            self.index_optical_discs = false;
        }
    }
}
