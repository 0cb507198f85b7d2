//! Volume lifecycle: tracks removable/optical mounts by stable UUID, keeps
//! the store's `isMounted`/`mountPoint`/`unmountDate` in sync with what the
//! OS reports, and GCs resources belonging to long-unmounted volumes.

use crate::error::Result;
use crate::store::{Interpreter, Object, Statement, Store};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const NON_REMOVABLE_URN: &str = "urn:nepomuk:datasource:non-removable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Fixed,
    Removable,
    Optical,
}

#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub uuid: String,
    pub mount_point: PathBuf,
    pub kind: StorageKind,
    pub mounted: bool,
    pub unmount_date: Option<DateTime<Utc>>,
}

impl VolumeInfo {
    pub fn uri(&self) -> String {
        format!("urn:nepomuk:datasource:{}", self.uuid)
    }
}

/// What the OS reports as currently mounted; supplied by the platform
/// layer, which is out of scope here.
#[derive(Debug, Clone)]
pub struct ObservedMount {
    pub uuid: String,
    pub mount_point: PathBuf,
    pub kind: StorageKind,
}

/// Owns the UUID → volume map for the process lifetime.
pub struct VolumeManager {
    store: Arc<Store>,
    volumes: HashMap<String, VolumeInfo>,
}

impl VolumeManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            volumes: HashMap::new(),
        }
    }

    pub fn get(&self, uuid: &str) -> Option<&VolumeInfo> {
        self.volumes.get(uuid)
    }

    /// Startup reconciliation: compares what the store believes is
    /// mounted against what the OS reports, asserting/withdrawing
    /// `isMounted` for every mismatch.
    pub async fn reconcile(&mut self, observed: &[ObservedMount]) -> Result<()> {
        let observed_uuids: Vec<&str> = observed.iter().map(|m| m.uuid.as_str()).collect();

        for mount in observed {
            if !self.volumes.contains_key(&mount.uuid) {
                self.mount_add(mount).await?;
            }
        }

        let stale: Vec<String> = self
            .volumes
            .iter()
            .filter(|(uuid, v)| v.mounted && !observed_uuids.contains(&uuid.as_str()))
            .map(|(uuid, _)| uuid.clone())
            .collect();
        for uuid in stale {
            self.mount_remove(&uuid).await?;
        }
        Ok(())
    }

    /// Adds a newly observed mount: writes `isMounted=true`, links
    /// `mountPoint`, and sets removable/optical flags by storage kind.
    pub async fn mount_add(&mut self, mount: &ObservedMount) -> Result<()> {
        let info = VolumeInfo {
            uuid: mount.uuid.clone(),
            mount_point: mount.mount_point.clone(),
            kind: mount.kind,
            mounted: true,
            unmount_date: None,
        };
        let uri = info.uri();

        let interpreter = Interpreter::begin(self.store.pool(), self.store.registry(), self.store.allocator()).await?;
        let statements = vec![
            Statement::InsertType {
                subject: uri.clone(),
                class: "tracker:Volume".to_string(),
            },
            Statement::InsertValue {
                subject: uri.clone(),
                property: "tracker:isMounted".to_string(),
                object: Object::Literal("true".to_string()),
            },
            Statement::InsertValue {
                subject: uri.clone(),
                property: "tracker:mountPoint".to_string(),
                object: Object::Uri(format!("file://{}", mount.mount_point.display())),
            },
            Statement::InsertValue {
                subject: uri.clone(),
                property: "tracker:isRemovable".to_string(),
                object: Object::Literal(bool_literal(mount.kind != StorageKind::Fixed)),
            },
            Statement::InsertValue {
                subject: uri,
                property: "tracker:isOptical".to_string(),
                object: Object::Literal(bool_literal(mount.kind == StorageKind::Optical)),
            },
        ];
        interpreter.run(&statements).await?;

        info!(uuid = %mount.uuid, mount_point = %mount.mount_point.display(), "volume mounted");
        self.volumes.insert(mount.uuid.clone(), info);
        Ok(())
    }

    /// Withdraws a mount: sets `isMounted=false`, records `unmountDate`, and
    /// clears `available` on every resource whose `dataSource` is this
    /// volume.
    pub async fn mount_remove(&mut self, uuid: &str) -> Result<()> {
        let Some(info) = self.volumes.get_mut(uuid) else {
            warn!(uuid, "mount_remove for unknown volume");
            return Ok(());
        };
        info.mounted = false;
        let now = Utc::now();
        info.unmount_date = Some(now);
        let uri = info.uri();

        let interpreter = Interpreter::begin(self.store.pool(), self.store.registry(), self.store.allocator()).await?;
        let statements = vec![
            Statement::InsertValue {
                subject: uri.clone(),
                property: "tracker:isMounted".to_string(),
                object: Object::Literal("false".to_string()),
            },
            Statement::InsertValue {
                subject: uri.clone(),
                property: "tracker:unmountDate".to_string(),
                object: Object::Literal(now.to_rfc3339()),
            },
        ];
        interpreter.run(&statements).await?;

        clear_available_for_datasource(&self.store, &uri).await?;
        info!(uuid, "volume unmounted");
        Ok(())
    }

    /// Deletes every resource whose `dataSource` is a volume unmounted for
    /// longer than `threshold_days` (0 disables GC). The volume resource
    /// itself is retained.
    pub async fn gc_stale(&mut self, threshold_days: i64) -> Result<usize> {
        if threshold_days <= 0 {
            return Ok(0);
        }
        let cutoff = Utc::now() - ChronoDuration::days(threshold_days);
        let mut removed = 0;

        let stale_uuids: Vec<String> = self
            .volumes
            .iter()
            .filter(|(_, v)| !v.mounted && v.unmount_date.map(|d| d < cutoff).unwrap_or(false))
            .map(|(uuid, _)| uuid.clone())
            .collect();

        for uuid in stale_uuids {
            let uri = self.volumes[&uuid].uri();
            removed += purge_datasource_resources(&self.store, &uri).await?;
            info!(uuid, removed, "stale volume garbage collected");
        }
        Ok(removed)
    }
}

fn bool_literal(b: bool) -> String {
    if b { "true".to_string() } else { "false".to_string() }
}

async fn clear_available_for_datasource(store: &Store, datasource_uri: &str) -> Result<()> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT \"nfo:FileDataObject\".id FROM \"nfo:FileDataObject\" \
         JOIN Resource src ON src.id = \"nfo:FileDataObject\".\"nie:dataSource\" \
         WHERE src.uri = ?",
    )
    .bind(datasource_uri)
    .fetch_all(store.pool())
    .await
    .unwrap_or_default();

    for id in ids {
        sqlx::query("UPDATE Resource SET available = 0 WHERE id = ?")
            .bind(id)
            .execute(store.pool())
            .await?;
    }
    Ok(())
}

async fn purge_datasource_resources(store: &Store, datasource_uri: &str) -> Result<usize> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT Resource.id FROM Resource \
         JOIN \"nfo:FileDataObject\" ON \"nfo:FileDataObject\".id = Resource.id \
         JOIN Resource src ON src.id = \"nfo:FileDataObject\".\"nie:dataSource\" \
         WHERE src.uri = ?",
    )
    .bind(datasource_uri)
    .fetch_all(store.pool())
    .await
    .unwrap_or_default();

    for &id in &ids {
        sqlx::query("DELETE FROM Resource WHERE id = ?").bind(id).execute(store.pool()).await?;
        sqlx::query("DELETE FROM fts WHERE rowid = ?").bind(id).execute(store.pool()).await?;
    }
    Ok(ids.len())
}
