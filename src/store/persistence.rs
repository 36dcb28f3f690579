use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{Node, Session, Settings};

/// Durable home of nodes, settings and the session pointer.
///
/// Node order is insertion order; it drives sibling positions for colors.
pub trait Persistence {
    fn load_all_nodes(&mut self) -> Result<Vec<Node>>;
    fn load_settings(&mut self) -> Result<Option<Settings>>;
    fn load_session(&mut self) -> Result<Option<Session>>;

    /// Inserts or replaces by id.
    fn save_node(&mut self, node: &Node) -> Result<()>;
    fn save_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.save_node(node)?;
        }
        Ok(())
    }
    fn delete_nodes(&mut self, ids: &HashSet<String>) -> Result<()>;
    fn clear_nodes(&mut self) -> Result<()>;

    fn save_session(&mut self, session: &Session) -> Result<()>;
    fn save_settings(&mut self, settings: &Settings) -> Result<()>;
}

fn upsert(nodes: &mut Vec<Node>, node: &Node) {
    match nodes.iter_mut().find(|existing| existing.id == node.id) {
        Some(existing) => *existing = node.clone(),
        None => nodes.push(node.clone()),
    }
}

/// Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    nodes: Vec<Node>,
    settings: Option<Settings>,
    session: Option<Session>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }
}

impl Persistence for MemoryPersistence {
    fn load_all_nodes(&mut self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }

    fn load_settings(&mut self) -> Result<Option<Settings>> {
        Ok(self.settings.clone())
    }

    fn load_session(&mut self) -> Result<Option<Session>> {
        Ok(self.session.clone())
    }

    fn save_node(&mut self, node: &Node) -> Result<()> {
        upsert(&mut self.nodes, node);
        Ok(())
    }

    fn delete_nodes(&mut self, ids: &HashSet<String>) -> Result<()> {
        self.nodes.retain(|node| !ids.contains(&node.id));
        Ok(())
    }

    fn clear_nodes(&mut self) -> Result<()> {
        self.nodes.clear();
        Ok(())
    }

    fn save_session(&mut self, session: &Session) -> Result<()> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.settings = Some(settings.clone());
        Ok(())
    }
}

const NODES_FILE: &str = "nodes.json";
const SETTINGS_FILE: &str = "settings.json";
const SESSION_FILE: &str = "session.json";

/// One pretty-printed JSON file per table inside a data directory. Every write
/// goes to a temporary file first and is renamed into place.
#[derive(Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
    nodes: Option<Vec<Node>>,
}

impl JsonFilePersistence {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
        Ok(Self { dir, nodes: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        Ok(Some(value))
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        let tmp = self.path(&format!("{file}.tmp"));
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("failed to encode {file}"))?;
        fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move {} into place", path.display()))?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    fn cached_nodes(&mut self) -> Result<&mut Vec<Node>> {
        if self.nodes.is_none() {
            self.nodes = Some(self.read(NODES_FILE)?.unwrap_or_default());
        }
        Ok(self.nodes.get_or_insert_with(Vec::new))
    }

    fn flush_nodes(&mut self) -> Result<()> {
        let nodes = self.nodes.as_deref().unwrap_or(&[]);
        self.write(NODES_FILE, nodes)
    }
}

impl Persistence for JsonFilePersistence {
    fn load_all_nodes(&mut self) -> Result<Vec<Node>> {
        self.nodes = None;
        Ok(self.cached_nodes()?.clone())
    }

    fn load_settings(&mut self) -> Result<Option<Settings>> {
        self.read(SETTINGS_FILE)
    }

    fn load_session(&mut self) -> Result<Option<Session>> {
        self.read(SESSION_FILE)
    }

    fn save_node(&mut self, node: &Node) -> Result<()> {
        upsert(self.cached_nodes()?, node);
        self.flush_nodes()
    }

    fn save_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        let cached = self.cached_nodes()?;
        for node in nodes {
            upsert(cached, node);
        }
        self.flush_nodes()
    }

    fn delete_nodes(&mut self, ids: &HashSet<String>) -> Result<()> {
        self.cached_nodes()?.retain(|node| !ids.contains(&node.id));
        self.flush_nodes()
    }

    fn clear_nodes(&mut self) -> Result<()> {
        self.nodes = Some(Vec::new());
        self.flush_nodes()
    }

    fn save_session(&mut self, session: &Session) -> Result<()> {
        self.write(SESSION_FILE, session)
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.write(SETTINGS_FILE, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_root_color;

    fn node(id: &str, parent: Option<&str>) -> Node {
        Node::new(
            id.to_owned(),
            parent.map(str::to_owned),
            id.to_uppercase(),
            default_root_color(),
            1,
        )
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = JsonFilePersistence::open(dir.path()).unwrap();
            store.save_node(&node("r", None)).unwrap();
            store.save_node(&node("a", Some("r"))).unwrap();
            store.save_node(&node("b", Some("r"))).unwrap();
            store
                .delete_nodes(&HashSet::from(["a".to_owned()]))
                .unwrap();
            store.save_session(&Session::new("b".into(), 7)).unwrap();
        }

        let mut reopened = JsonFilePersistence::open(dir.path()).unwrap();
        let ids = reopened
            .load_all_nodes()
            .unwrap()
            .into_iter()
            .map(|node| node.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["r", "b"]);
        assert_eq!(
            reopened.load_session().unwrap().unwrap().current_root_id,
            "b"
        );
        assert_eq!(reopened.load_settings().unwrap(), None);
    }

    #[test]
    fn json_store_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFilePersistence::open(dir.path()).unwrap();
        store.save_node(&node("r", None)).unwrap();
        store.save_node(&node("a", Some("r"))).unwrap();

        let mut renamed = node("r", None);
        renamed.title = "Renamed".into();
        store.save_node(&renamed).unwrap();

        let nodes = store.load_all_nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].title, "Renamed");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(NODES_FILE), "{ nope").unwrap();
        let mut store = JsonFilePersistence::open(dir.path()).unwrap();
        let error = store.load_all_nodes().unwrap_err();
        assert!(format!("{error:#}").contains("invalid JSON"));
    }

    #[test]
    fn memory_store_clears() {
        let mut store = MemoryPersistence::with_nodes(vec![node("r", None)]);
        store.clear_nodes().unwrap();
        assert!(store.load_all_nodes().unwrap().is_empty());
    }
}
