//! JSON directory store.
//!
//! Layout:
//!
//! ```text
//! <dir>/links.json
//! <dir>/nodes.json
//! <dir>/park_and_rides.json
//! <dir>/route_systems/<name>.json
//! ```
//!
//! A missing table reads as empty. Commit copies the whole directory to a
//! sibling `<dir>_YYYYMMDDHHMMSS` first, replaces each table by writing a
//! temporary file and renaming it over the old one, and removes the backup
//! once every table is written.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use super::{NetworkStore, StoreError};
use crate::domain::{Link, NetworkSnapshot, Node, NodeId, RouteSystem};

const LINKS: &str = "links.json";
const NODES: &str = "nodes.json";
const PARK_AND_RIDES: &str = "park_and_rides.json";
const ROUTE_SYSTEMS: &str = "route_systems";

/// Network store backed by a directory of JSON tables.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`. The directory is created on first
    /// commit.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn route_system_path(&self, name: &str) -> PathBuf {
        self.dir.join(ROUTE_SYSTEMS).join(format!("{name}.json"))
    }

    fn read_table<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::json(path, e))
    }

    /// A fresh sibling directory name for a backup taken at `now`.
    fn backup_path(&self, now: DateTime<Local>) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "network".to_string());
        let stamp = now.format("%Y%m%d%H%M%S");

        let mut candidate = self.dir.with_file_name(format!("{name}_{stamp}"));
        let mut attempt = 1;
        while candidate.exists() {
            candidate = self.dir.with_file_name(format!("{name}_{stamp}_{attempt}"));
            attempt += 1;
        }
        candidate
    }

    fn write_tables(&self, snapshot: &NetworkSnapshot) -> Result<(), StoreError> {
        let systems_dir = self.dir.join(ROUTE_SYSTEMS);
        fs::create_dir_all(&systems_dir).map_err(|e| StoreError::io(&systems_dir, e))?;

        write_table(&self.dir.join(LINKS), &snapshot.links)?;
        write_table(&self.dir.join(NODES), &snapshot.nodes)?;
        write_table(&self.dir.join(PARK_AND_RIDES), &snapshot.park_and_rides)?;
        for system in &snapshot.route_systems {
            write_table(&self.route_system_path(&system.name), system)?;
        }
        Ok(())
    }
}

impl NetworkStore for JsonStore {
    fn read_links(&self) -> Result<Vec<Link>, StoreError> {
        Ok(self.read_table(&self.dir.join(LINKS))?.unwrap_or_default())
    }

    fn read_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.read_table(&self.dir.join(NODES))?.unwrap_or_default())
    }

    fn read_route_system(&self, name: &str) -> Result<Option<RouteSystem>, StoreError> {
        self.read_table(&self.route_system_path(name))
    }

    fn read_park_and_rides(&self) -> Result<Vec<NodeId>, StoreError> {
        Ok(self
            .read_table(&self.dir.join(PARK_AND_RIDES))?
            .unwrap_or_default())
    }

    fn commit(&mut self, snapshot: &NetworkSnapshot) -> Result<(), StoreError> {
        let backup = if self.dir.exists() {
            let backup = self.backup_path(Local::now());
            copy_dir(&self.dir, &backup).map_err(|e| StoreError::io(&backup, e))?;
            info!(backup = %backup.display(), "backed up network store");
            Some(backup)
        } else {
            None
        };

        match (self.write_tables(snapshot), backup) {
            (Ok(()), backup) => {
                if let Some(backup) = backup
                    && let Err(e) = fs::remove_dir_all(&backup)
                {
                    warn!(backup = %backup.display(), error = %e, "failed to remove backup");
                }
                info!(
                    dir = %self.dir.display(),
                    links = snapshot.links.len(),
                    nodes = snapshot.nodes.len(),
                    route_systems = snapshot.route_systems.len(),
                    "committed network"
                );
                Ok(())
            }
            (Err(e), Some(backup)) => {
                error!(backup = %backup.display(), error = %e, "commit failed");
                Err(StoreError::Commit {
                    message: e.to_string(),
                    backup,
                })
            }
            (Err(e), None) => Err(e),
        }
    }
}

/// Write `value` to a temporary file beside `path`, then move it into place.
fn write_table<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
