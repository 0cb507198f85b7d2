//! The processing queue (files, directories, modules) and pause-cookie
//! bookkeeping shared by every miner.

pub mod pause;
pub mod queue;

pub use pause::{PauseCookies, PauseReason};
pub use queue::{RootModule, Scheduler, Tick};
