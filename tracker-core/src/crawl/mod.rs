//! File discovery: the recursive crawler, the long-lived change monitor,
//! and the ignore-rule matching they share.

pub mod crawler;
pub mod ignore;
pub mod monitor;

pub use crawler::{CrawlOutcome, CrawlProgress, Crawler};
pub use ignore::IgnoreRules;
pub use monitor::{FsIntent, Monitor};
