use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use log::{debug, info, warn};

use super::{MindMapStore, StoreEvent};
use crate::layout::simulation_links;
use crate::model::Node;
use crate::navigation::{self, Edge};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub score: i64,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

fn node_score(matcher: &SkimMatcherV2, node: &Node, query: &str) -> Option<i64> {
    let title = fuzzy_match_score(matcher, &node.title, query);
    let body = node
        .body
        .as_deref()
        .and_then(|body| fuzzy_match_score(matcher, body, query));
    let tags = node
        .tags
        .iter()
        .filter_map(|tag| fuzzy_match_score(matcher, tag, query))
        .max();
    // Title hits outrank body and tag hits of the same quality.
    [title.map(|score| score * 2), body, tags]
        .into_iter()
        .flatten()
        .max()
}

impl MindMapStore {
    /// Moves the navigation root. Unknown ids are ignored and the current
    /// breadcrumb is returned unchanged.
    pub fn navigate_to(&mut self, id: &str) -> Vec<String> {
        if !self.view.navigate(&self.nodes, id) {
            return self.view.breadcrumb.clone();
        }

        let selection_cleared = self.view.selected_node_id.take().is_some();
        self.save_session_root(id);
        debug!("navigated to {id}");
        self.emit(StoreEvent::RootChanged {
            root_id: Some(id.to_owned()),
        });
        if selection_cleared {
            self.emit(StoreEvent::SelectionChanged { node_id: None });
        }
        self.view.breadcrumb.clone()
    }

    /// Returns `false` at the structural root.
    pub fn go_to_parent(&mut self) -> bool {
        let parent_id = self
            .root_id()
            .and_then(|root_id| self.node(root_id))
            .and_then(|root| root.parent_id.clone());
        match parent_id {
            Some(parent_id) if self.contains(&parent_id) => {
                self.navigate_to(&parent_id);
                true
            }
            _ => false,
        }
    }

    /// Unknown ids clear the selection. While link mode is on, selecting a
    /// node other than the link source links the two and leaves link mode.
    pub fn select_node(&mut self, id: Option<&str>) {
        let id = id.filter(|id| self.contains(id)).map(str::to_owned);

        if let (Some(source), Some(target)) = (self.link_source.clone(), id.as_deref()) {
            if source != target {
                match self.create_link(&source, target) {
                    Ok(true) => info!("linked {source} -> {target}"),
                    Ok(false) => debug!("{source} already links to {target}"),
                    Err(error) => warn!("link not created: {error}"),
                }
                self.link_source = None;
            }
        }

        if self.view.selected_node_id != id {
            self.view.selected_node_id = id.clone();
            self.emit(StoreEvent::SelectionChanged { node_id: id });
        }
    }

    pub fn hover_node(&mut self, id: Option<&str>) {
        self.view.hovered_node_id = id.filter(|id| self.contains(id)).map(str::to_owned);
    }

    pub fn set_god_mode(&mut self, enabled: bool) {
        if self.god_mode == enabled {
            return;
        }
        self.god_mode = enabled;
        info!("god mode {}", if enabled { "on" } else { "off" });
        self.emit(StoreEvent::GodModeChanged(enabled));
    }

    pub fn toggle_god_mode(&mut self) -> bool {
        self.set_god_mode(!self.god_mode);
        self.god_mode
    }

    pub fn toggle_auto_layout(&mut self) -> bool {
        self.auto_layout = !self.auto_layout;
        self.auto_layout
    }

    /// Enters link mode from `source`, or leaves it if it is already on.
    pub fn toggle_link_mode(&mut self, source: &str) -> bool {
        if self.link_source.take().is_some() || !self.contains(source) {
            return false;
        }
        self.link_source = Some(source.to_owned());
        true
    }

    pub fn visible_nodes(&self) -> Vec<&Node> {
        match self.root_id() {
            Some(root_id) => navigation::visible_nodes(&self.nodes, root_id, self.god_mode),
            None => Vec::new(),
        }
    }

    pub fn visible_edges(&self) -> Vec<Edge> {
        navigation::visible_edges(&self.visible_nodes())
    }

    /// Nodes and edges for the normal-mode force simulation.
    pub fn simulation_input(&self) -> (Vec<Node>, Vec<(String, String)>) {
        let Some(root_id) = self.root_id() else {
            return (Vec::new(), Vec::new());
        };
        let nodes = navigation::simulation_nodes(&self.nodes, root_id)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        let links = simulation_links(&nodes);
        (nodes, links)
    }

    /// Root id and a snapshot of every node for the God-Mode layout.
    pub fn god_input(&self) -> Option<(String, Vec<Node>)> {
        let root_id = self.root_id()?.to_owned();
        Some((root_id, self.nodes.clone()))
    }

    /// Fuzzy search over titles, bodies and tags, best match first.
    pub fn search_nodes(&self, query: &str) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let matcher = SkimMatcherV2::default();
        let mut hits = self
            .nodes
            .iter()
            .filter_map(|node| {
                node_score(&matcher, node, query).map(|score| SearchHit {
                    id: node.id.clone(),
                    score,
                })
            })
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodePatch;
    use crate::navigation::EdgeKind;

    fn store_with_children() -> (MindMapStore, String, String, String) {
        let mut store = MindMapStore::in_memory();
        let root = store.root_id().unwrap().to_owned();
        let a = store.create_node("Alpha", None, None).unwrap();
        let b = store.create_node("Beta", None, None).unwrap();
        (store, root, a, b)
    }

    #[test]
    fn navigation_clears_selection_and_saves_session() {
        let (mut store, root, a, _) = store_with_children();
        store.select_node(Some(&a));
        let crumbs = store.navigate_to(&a);
        assert_eq!(crumbs, ["My Mind Map", "Alpha"]);
        assert_eq!(store.view().selected_node_id, None);
        assert_eq!(store.session().unwrap().current_root_id, a);

        assert_eq!(store.navigate_to("ghost"), crumbs);
        assert_eq!(store.root_id(), Some(a.as_str()));

        assert!(store.go_to_parent());
        assert_eq!(store.root_id(), Some(root.as_str()));
        assert!(!store.go_to_parent());
    }

    #[test]
    fn unknown_selection_clears_pointer() {
        let (mut store, _, a, _) = store_with_children();
        store.select_node(Some(&a));
        store.select_node(Some("ghost"));
        assert_eq!(store.view().selected_node_id, None);
        store.hover_node(Some("ghost"));
        assert_eq!(store.view().hovered_node_id, None);
        store.hover_node(Some(&a));
        assert_eq!(store.view().hovered_node_id.as_deref(), Some(a.as_str()));
    }

    #[test]
    fn link_mode_links_next_selection() {
        let (mut store, _, a, b) = store_with_children();
        assert!(store.toggle_link_mode(&a));
        store.select_node(Some(&a));
        assert_eq!(store.link_source(), Some(a.as_str()));

        store.select_node(Some(&b));
        assert_eq!(store.link_source(), None);
        assert_eq!(store.node(&a).unwrap().links, vec![b.clone()]);

        assert!(store.toggle_link_mode(&a));
        assert!(!store.toggle_link_mode(&a));
        assert_eq!(store.link_source(), None);
    }

    #[test]
    fn god_mode_widens_visible_set() {
        let (mut store, _, a, b) = store_with_children();
        store.create_node("Alpha child", Some(&a), None).unwrap();
        let events = store.subscribe();

        assert_eq!(store.visible_nodes().len(), 3);
        assert!(store.toggle_god_mode());
        assert_eq!(store.visible_nodes().len(), 4);
        assert_eq!(events.try_recv().unwrap(), StoreEvent::GodModeChanged(true));

        store.set_god_mode(true);
        assert!(events.try_recv().is_err());

        store.create_link(&a, &b).unwrap();
        let edges = store.visible_edges();
        assert_eq!(edges.iter().filter(|edge| edge.kind == EdgeKind::Link).count(), 1);
        assert_eq!(edges.iter().filter(|edge| edge.kind == EdgeKind::Hierarchy).count(), 3);
    }

    #[test]
    fn simulation_input_includes_link_targets() {
        let (mut store, _, a, b) = store_with_children();
        let deep = store.create_node("Deep", Some(&b), None).unwrap();
        store.create_link(&a, &deep).unwrap();

        let (nodes, links) = store.simulation_input();
        assert!(nodes.iter().any(|node| node.id == deep));
        assert!(links.contains(&(a.clone(), deep.clone())));
        assert!(!store.visible_nodes().iter().any(|node| node.id == deep));
    }

    #[test]
    fn auto_layout_toggles() {
        let mut store = MindMapStore::in_memory();
        assert!(store.auto_layout());
        assert!(!store.toggle_auto_layout());
        assert!(store.toggle_auto_layout());
    }

    #[test]
    fn search_ranks_title_hits_first() {
        let (mut store, _, a, b) = store_with_children();
        store
            .update_node(
                &b,
                NodePatch {
                    body: Some(Some("notes about alpha particles".into())),
                    tags: Some(vec!["physics".into()]),
                    ..NodePatch::default()
                },
            )
            .unwrap();

        let hits = store.search_nodes("alpha");
        assert_eq!(hits[0].id, a);
        assert!(hits.iter().any(|hit| hit.id == b));
        assert_eq!(store.search_nodes("PHYSICS")[0].id, b);
        assert!(store.search_nodes("   ").is_empty());
        assert!(store.search_nodes("zzqxj").is_empty());
    }
}
