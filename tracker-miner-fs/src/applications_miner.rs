//! Second source-specific miner: indexes `.desktop` entries
//! from the standard application directories as `nfo:SoftwareApplication`
//! resources. Far smaller than the files miner since it has no monitor, no
//! extractor call and no volume awareness, since applications don't move disks.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracker_core::error::Result;
use tracker_core::ontology::Registry;
use tracker_core::orchestrator::{Miner, MinerSummary};
use tracker_core::store::{Interpreter, Object, Statement, Store};
use tracing::{debug, warn};

pub struct ApplicationsMiner {
    directories: Vec<PathBuf>,
    store: Arc<Store>,
    registry: Arc<Registry>,
}

impl ApplicationsMiner {
    pub fn new(directories: Vec<PathBuf>, store: Arc<Store>, registry: Arc<Registry>) -> Self {
        Self {
            directories,
            store,
            registry,
        }
    }
}

#[async_trait]
impl Miner for ApplicationsMiner {
    fn name(&self) -> &str {
        "applications"
    }

    async fn run(&self, cancel: CancellationToken) -> Result<MinerSummary> {
        let mut processed = 0u64;
        let mut indexed = 0u64;

        for dir in &self.directories {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                if cancel.is_cancelled() {
                    break;
                }
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                processed += 1;
                match index_one(&self.store, &self.registry, &path).await {
                    Ok(()) => indexed += 1,
                    Err(err) => warn!(?path, %err, "failed to index application entry"),
                }
            }
        }

        debug!(processed, indexed, "applications miner finished a pass");
        Ok(MinerSummary { processed, indexed })
    }
}

async fn index_one(store: &Store, registry: &Arc<Registry>, path: &PathBuf) -> Result<()> {
    let contents = std::fs::read_to_string(path).map_err(|e| tracker_core::TrackerError::Io {
        path: path.clone(),
        source: e,
    })?;
    let name = parse_desktop_entry(&contents, "Name").unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let url = format!("file://{}", path.display());
    let interpreter = Interpreter::begin(store.pool(), registry.clone(), store.allocator()).await?;
    let statements = vec![
        Statement::InsertType {
            subject: url.clone(),
            class: "nfo:SoftwareApplication".to_string(),
        },
        Statement::InsertValue {
            subject: url.clone(),
            property: "nie:url".to_string(),
            object: Object::Literal(url.clone()),
        },
        Statement::InsertValue {
            subject: url,
            property: "nfo:fileName".to_string(),
            object: Object::Literal(name),
        },
    ];
    interpreter.run(&statements).await?;
    Ok(())
}

/// `.desktop` files are flat `key=value` INI-style text; we only need the
/// unlocalized `Name` field from the `[Desktop Entry]` group.
fn parse_desktop_entry(contents: &str, key: &str) -> Option<String> {
    let mut in_group = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_group {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_from_desktop_entry_group() {
        let contents = "[Desktop Entry]\nType=Application\nName=Text Editor\n";
        assert_eq!(
            parse_desktop_entry(contents, "Name"),
            Some("Text Editor".to_string())
        );
    }

    #[test]
    fn ignores_keys_outside_desktop_entry_group() {
        let contents = "[Desktop Action New]\nName=New Window\n[Desktop Entry]\nName=Editor\n";
        assert_eq!(parse_desktop_entry(contents, "Name"), Some("Editor".to_string()));
    }
}
