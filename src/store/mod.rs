//! Single-writer state container for the mind map.
//!
//! Every read and write of the node set goes through `MindMapStore`. Writes hit
//! the persistence backend first; a failed save is logged and the in-memory
//! state still moves forward. Observers get `StoreEvent`s over channels.

mod error;
mod interchange;
mod mutate;
mod persistence;
mod seed;
mod view;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Context as _;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::camera::CameraPose;
use crate::model::{Node, Session, Settings};
use crate::navigation::ViewState;
use crate::util::now_millis;

pub use error::StoreError;
pub use interchange::ImportSummary;
pub use persistence::{JsonFilePersistence, MemoryPersistence, Persistence};
pub use view::SearchHit;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    NodesChanged,
    RootChanged { root_id: Option<String> },
    SelectionChanged { node_id: Option<String> },
    GodModeChanged(bool),
    LayoutApplied,
}

impl StoreEvent {
    /// Whether the visible node or edge set may differ after this event.
    pub fn invalidates_layout(&self) -> bool {
        matches!(
            self,
            Self::NodesChanged | Self::RootChanged { .. } | Self::GodModeChanged(_)
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenOptions {
    /// Plant the demo tree instead of a single root when the store is empty.
    pub seed_demo: bool,
    /// Fixed seed for ids and colors; entropy when `None`.
    pub rng_seed: Option<u64>,
}

pub struct MindMapStore {
    persistence: Box<dyn Persistence + Send>,
    rng: StdRng,
    nodes: Vec<Node>,
    index_by_id: HashMap<String, usize>,
    settings: Settings,
    session: Option<Session>,
    view: ViewState,
    god_mode: bool,
    auto_layout: bool,
    link_source: Option<String>,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl MindMapStore {
    /// Loads everything, bootstraps an empty store and repairs a session that
    /// points at a node which no longer exists.
    pub fn open(
        mut persistence: Box<dyn Persistence + Send>,
        options: OpenOptions,
    ) -> anyhow::Result<Self> {
        let loaded = persistence
            .load_all_nodes()
            .context("failed to load nodes")?;
        let total = loaded.len();
        let mut nodes = Vec::with_capacity(total);
        let mut index_by_id = HashMap::with_capacity(total);
        for node in loaded {
            if !node.is_well_formed() || index_by_id.contains_key(&node.id) {
                continue;
            }
            index_by_id.insert(node.id.clone(), nodes.len());
            nodes.push(node);
        }
        if nodes.len() != total {
            warn!("dropped {} malformed or duplicate node records", total - nodes.len());
        }

        let settings = match persistence.load_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(error) => {
                warn!("using default settings: {error:#}");
                Settings::default()
            }
        };
        let session = match persistence.load_session() {
            Ok(session) => session,
            Err(error) => {
                warn!("ignoring unreadable session: {error:#}");
                None
            }
        };

        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut store = Self {
            persistence,
            rng,
            nodes,
            index_by_id,
            settings,
            session,
            view: ViewState::default(),
            god_mode: false,
            auto_layout: true,
            link_source: None,
            subscribers: Vec::new(),
        };

        if store.structural_root_id().is_none() {
            if options.seed_demo {
                seed::plant_demo(&mut store);
            } else {
                store.bootstrap_root();
            }
        }
        store.restore_session();

        info!(
            "opened mind map with {} nodes at root {:?}",
            store.nodes.len(),
            store.view.root_id
        );
        Ok(store)
    }

    pub fn in_memory() -> Self {
        let mut store = Self {
            persistence: Box::new(MemoryPersistence::new()),
            rng: StdRng::from_entropy(),
            nodes: Vec::new(),
            index_by_id: HashMap::new(),
            settings: Settings::default(),
            session: None,
            view: ViewState::default(),
            god_mode: false,
            auto_layout: true,
            link_source: None,
            subscribers: Vec::new(),
        };
        store.bootstrap_root();
        store.restore_session();
        store
    }

    fn bootstrap_root(&mut self) {
        let welcome = "Welcome to your mind map! Double-click nodes to explore deeper.";
        if let Err(error) = self.create_node("My Mind Map", None, Some(welcome.to_owned())) {
            warn!("failed to bootstrap root node: {error}");
        }
    }

    fn restore_session(&mut self) {
        let Some(fallback) = self.structural_root_id() else {
            self.session = None;
            self.view.clear();
            return;
        };

        let now = now_millis();
        let session = match self.session.take() {
            Some(session) if self.contains(&session.current_root_id) => session,
            Some(mut session) => {
                warn!(
                    "session root {} no longer exists; resetting to {fallback}",
                    session.current_root_id
                );
                session.current_root_id = fallback;
                session.last_accessed = now;
                self.persist("session", |p| p.save_session(&session));
                session
            }
            None => {
                let session = Session::new(fallback, now);
                self.persist("session", |p| p.save_session(&session));
                session
            }
        };

        let root_id = session.current_root_id.clone();
        self.session = Some(session);
        self.view.navigate(&self.nodes, &root_id);
    }

    pub(crate) fn persist(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut dyn Persistence) -> anyhow::Result<()>,
    ) {
        if let Err(error) = op(self.persistence.as_mut()) {
            warn!("{what} not saved, keeping in-memory state: {error:#}");
        }
    }

    fn reindex(&mut self) {
        self.index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
    }

    pub fn subscribe(&mut self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let index = *self.index_by_id.get(id)?;
        self.nodes.get_mut(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The oldest parentless node.
    pub fn structural_root_id(&self) -> Option<String> {
        self.nodes
            .iter()
            .filter(|node| node.is_structural_root())
            .min_by_key(|node| (node.created_at, node.id.as_str()))
            .map(|node| node.id.clone())
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn root_id(&self) -> Option<&str> {
        self.view.root_id.as_deref()
    }

    pub fn breadcrumb(&self) -> &[String] {
        &self.view.breadcrumb
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.persist("settings", |p| p.save_settings(&settings));
        self.settings = settings;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn camera_pose(&self) -> CameraPose {
        self.session
            .as_ref()
            .map(|session| CameraPose {
                position: session.camera_position,
                target: session.camera_target,
            })
            .unwrap_or_default()
    }

    pub fn remember_camera(&mut self, pose: CameraPose) {
        let Some(mut session) = self.session.clone() else {
            return;
        };
        session.camera_position = pose.position;
        session.camera_target = pose.target;
        session.last_accessed = now_millis();
        self.persist("session", |p| p.save_session(&session));
        self.session = Some(session);
    }

    fn save_session_root(&mut self, root_id: &str) {
        let now = now_millis();
        let mut session = self
            .session
            .clone()
            .unwrap_or_else(|| Session::new(root_id.to_owned(), now));
        session.current_root_id = root_id.to_owned();
        session.last_accessed = now;
        self.persist("session", |p| p.save_session(&session));
        self.session = Some(session);
    }

    pub fn god_mode(&self) -> bool {
        self.god_mode
    }

    pub fn auto_layout(&self) -> bool {
        self.auto_layout
    }

    pub fn link_source(&self) -> Option<&str> {
        self.link_source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_root_color;

    fn node(id: &str, parent: Option<&str>, created_at: u64) -> Node {
        Node::new(
            id.to_owned(),
            parent.map(str::to_owned),
            id.to_uppercase(),
            default_root_color(),
            created_at,
        )
    }

    #[test]
    fn empty_store_bootstraps_default_root() {
        let store = MindMapStore::open(
            Box::new(MemoryPersistence::new()),
            OpenOptions {
                rng_seed: Some(1),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        let root = &store.nodes()[0];
        assert_eq!(root.title, "My Mind Map");
        assert!(root.body.is_some());
        assert_eq!(store.root_id(), Some(root.id.as_str()));
        assert_eq!(store.breadcrumb(), ["My Mind Map"]);
        assert_eq!(
            store.session().unwrap().current_root_id,
            store.root_id().unwrap()
        );
    }

    #[test]
    fn stale_session_heals_to_structural_root() {
        let persistence = MemoryPersistence::with_nodes(vec![node("r", None, 1), node("a", Some("r"), 2)])
            .with_session(Session::new("deleted-long-ago".into(), 0));
        let store = MindMapStore::open(Box::new(persistence), OpenOptions::default()).unwrap();
        assert_eq!(store.root_id(), Some("r"));
        assert_eq!(store.session().unwrap().current_root_id, "r");
    }

    #[test]
    fn valid_session_is_restored() {
        let persistence = MemoryPersistence::with_nodes(vec![node("r", None, 1), node("a", Some("r"), 2)])
            .with_session(Session::new("a".into(), 0));
        let store = MindMapStore::open(Box::new(persistence), OpenOptions::default()).unwrap();
        assert_eq!(store.root_id(), Some("a"));
        assert_eq!(store.breadcrumb(), ["R", "A"]);
    }

    #[test]
    fn malformed_records_are_dropped() {
        let mut blank = node("blank", Some("r"), 2);
        blank.title = "   ".into();
        let persistence =
            MemoryPersistence::with_nodes(vec![node("r", None, 1), blank, node("r", None, 3)]);
        let store = MindMapStore::open(Box::new(persistence), OpenOptions::default()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn demo_seed_plants_a_tree() {
        let store = MindMapStore::open(
            Box::new(MemoryPersistence::new()),
            OpenOptions {
                seed_demo: true,
                rng_seed: Some(3),
            },
        )
        .unwrap();
        assert!(store.len() > 4);
        let root = store.structural_root_id().unwrap();
        assert_eq!(store.root_id(), Some(root.as_str()));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = MindMapStore::in_memory();
        let kept = store.subscribe();
        drop(store.subscribe());
        store.emit(StoreEvent::LayoutApplied);
        assert_eq!(store.subscribers.len(), 1);
        assert_eq!(kept.try_recv().unwrap(), StoreEvent::LayoutApplied);
    }

    #[test]
    fn layout_invalidation_by_event() {
        assert!(StoreEvent::NodesChanged.invalidates_layout());
        assert!(StoreEvent::GodModeChanged(true).invalidates_layout());
        assert!(!StoreEvent::LayoutApplied.invalidates_layout());
        assert!(!StoreEvent::SelectionChanged { node_id: None }.invalidates_layout());
    }
}
