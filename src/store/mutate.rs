use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use super::{MindMapStore, StoreError, StoreEvent};
use crate::model::{
    ChildIndex, Node, NodePatch, OklchColor, Position3, child_color, default_root_color,
    propagate_colors, random_root_color,
};
use crate::navigation::{ancestor_path, reanchor_target};
use crate::util::{generate_node_id, now_millis};

impl MindMapStore {
    fn fresh_id(&mut self, is_root: bool, now: u64) -> String {
        let mut id = generate_node_id(&mut self.rng, is_root, now);
        while self.contains(&id) {
            id = generate_node_id(&mut self.rng, false, now);
        }
        id
    }

    /// Adds a node and returns its id.
    ///
    /// On an empty store the node becomes the structural root. Otherwise a
    /// missing `parent_id` means "under the current navigation root".
    pub fn create_node(
        &mut self,
        title: &str,
        parent_id: Option<&str>,
        body: Option<String>,
    ) -> Result<String, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }

        let now = now_millis();
        if self.nodes.is_empty() {
            let id = self.fresh_id(true, now);
            let node = Node::new(id.clone(), None, title.to_owned(), default_root_color(), now)
                .with_body(body);
            self.insert_node(node);
            self.view.navigate(&self.nodes, &id);
            self.save_session_root(&id);
            self.emit(StoreEvent::RootChanged {
                root_id: Some(id.clone()),
            });
            return Ok(id);
        }

        let parent_id = match parent_id.or(self.view.root_id.as_deref()) {
            Some(parent_id) => parent_id.to_owned(),
            None => return Err(StoreError::UnknownParent(String::new())),
        };
        let Some(parent) = self.node(&parent_id) else {
            return Err(StoreError::UnknownParent(parent_id));
        };

        let parent_color = parent.oklch();
        let sibling_hues = self
            .nodes
            .iter()
            .filter(|node| node.parent_id.as_deref() == Some(parent_id.as_str()))
            .map(|node| node.oklch().h)
            .collect::<Vec<_>>();
        let color = child_color(parent_color, free_sibling_position(parent_color, &sibling_hues));

        let id = self.fresh_id(false, now);
        let node = Node::new(id.clone(), Some(parent_id), title.to_owned(), color, now).with_body(body);
        self.insert_node(node);
        Ok(id)
    }

    fn insert_node(&mut self, node: Node) {
        self.persist("node", |p| p.save_node(&node));
        debug!("created node {} under {:?}", node.id, node.parent_id);
        self.index_by_id.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.emit(StoreEvent::NodesChanged);
    }

    /// Applies the set fields of `patch`. Links are filtered to existing,
    /// distinct, non-self targets.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<(), StoreError> {
        if !self.contains(id) {
            return Err(StoreError::UnknownNode(id.to_owned()));
        }
        let title = match &patch.title {
            Some(title) if title.trim().is_empty() => return Err(StoreError::EmptyTitle),
            Some(title) => Some(title.trim().to_owned()),
            None => None,
        };
        let links = patch.links.map(|links| self.clean_links(id, links));

        let Some(node) = self.node_mut(id) else {
            return Err(StoreError::UnknownNode(id.to_owned()));
        };
        let title_changed = title.is_some();
        if let Some(title) = title {
            node.title = title;
        }
        if let Some(body) = patch.body {
            node.body = body.filter(|text| !text.trim().is_empty());
        }
        if let Some(tags) = patch.tags {
            node.tags = tags
                .into_iter()
                .map(|tag| tag.trim().to_owned())
                .filter(|tag| !tag.is_empty())
                .collect();
        }
        if let Some(links) = links {
            node.links = links;
        }
        node.updated_at = now_millis().max(node.created_at);
        let saved = node.clone();

        self.persist("node", |p| p.save_node(&saved));
        if title_changed && self.on_breadcrumb_path(id) {
            self.view.refresh_breadcrumb(&self.nodes);
        }
        self.emit(StoreEvent::NodesChanged);
        Ok(())
    }

    fn clean_links(&self, id: &str, links: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        links
            .into_iter()
            .filter(|target| {
                if target == id || !self.contains(target) {
                    debug!("dropping link {id} -> {target}");
                    return false;
                }
                seen.insert(target.clone())
            })
            .collect()
    }

    fn on_breadcrumb_path(&self, id: &str) -> bool {
        let Some(root_id) = self.view.root_id.as_deref() else {
            return false;
        };
        ancestor_path(&self.nodes, root_id)
            .iter()
            .any(|node| node.id == id)
    }

    /// Removes `id` and its whole subtree and returns the removed ids.
    /// Deleting the structural root empties the store.
    pub fn delete_node(&mut self, id: &str) -> Result<HashSet<String>, StoreError> {
        let Some(target) = self.node(id) else {
            return Err(StoreError::UnknownNode(id.to_owned()));
        };

        if target.is_structural_root() {
            let removed = self
                .nodes
                .iter()
                .map(|node| node.id.clone())
                .collect::<HashSet<_>>();
            self.persist("node removal", |p| p.clear_nodes());
            self.nodes.clear();
            self.index_by_id.clear();
            self.view.clear();
            self.session = None;
            self.link_source = None;
            info!("deleted structural root {id}; store is now empty");
            self.emit(StoreEvent::NodesChanged);
            self.emit(StoreEvent::RootChanged { root_id: None });
            return Ok(removed);
        }

        let removed = {
            let index = ChildIndex::new(&self.nodes);
            let mut removed = index
                .descendants(id)
                .into_iter()
                .map(str::to_owned)
                .collect::<HashSet<_>>();
            removed.insert(id.to_owned());
            removed
        };

        let previous_root = self.view.root_id.clone();
        let next_root = reanchor_target(&self.nodes, previous_root.as_deref(), &removed);

        self.persist("node removal", |p| p.delete_nodes(&removed));
        self.nodes.retain(|node| !removed.contains(&node.id));

        let mut relinked = Vec::new();
        for node in &mut self.nodes {
            let before = node.links.len();
            node.links.retain(|target| !removed.contains(target));
            if node.links.len() != before {
                relinked.push(node.clone());
            }
        }
        if !relinked.is_empty() {
            self.persist("link cleanup", |p| p.save_nodes(&relinked));
        }
        self.reindex();

        if self
            .link_source
            .as_ref()
            .is_some_and(|source| removed.contains(source))
        {
            self.link_source = None;
        }
        self.view.forget_missing(&self.nodes);
        debug!("deleted {} nodes under {id}", removed.len());
        self.emit(StoreEvent::NodesChanged);

        if next_root != previous_root {
            match next_root {
                Some(root_id) => {
                    info!("navigation root re-anchored to {root_id}");
                    self.view.navigate(&self.nodes, &root_id);
                    self.save_session_root(&root_id);
                    self.emit(StoreEvent::RootChanged {
                        root_id: Some(root_id),
                    });
                }
                None => {
                    self.view.clear();
                    self.emit(StoreEvent::RootChanged { root_id: None });
                }
            }
        } else {
            self.view.refresh_breadcrumb(&self.nodes);
        }

        Ok(removed)
    }

    /// Adds `target` to `source.links`. Returns `false` if it was already there.
    pub fn create_link(&mut self, source: &str, target: &str) -> Result<bool, StoreError> {
        if source == target {
            return Err(StoreError::SelfLink);
        }
        if !self.contains(target) {
            return Err(StoreError::UnknownNode(target.to_owned()));
        }
        let Some(node) = self.node(source) else {
            return Err(StoreError::UnknownNode(source.to_owned()));
        };
        if node.links.iter().any(|link| link == target) {
            return Ok(false);
        }

        let mut links = node.links.clone();
        links.push(target.to_owned());
        self.update_node(source, NodePatch::links(links))?;
        Ok(true)
    }

    /// Returns `false` if there was no such link.
    pub fn remove_link(&mut self, source: &str, target: &str) -> Result<bool, StoreError> {
        let Some(node) = self.node(source) else {
            return Err(StoreError::UnknownNode(source.to_owned()));
        };
        if !node.links.iter().any(|link| link == target) {
            return Ok(false);
        }

        let links = node
            .links
            .iter()
            .filter(|link| *link != target)
            .cloned()
            .collect();
        self.update_node(source, NodePatch::links(links))?;
        Ok(true)
    }

    /// Picks a fresh random color for `root_id` and re-derives every descendant.
    pub fn recolor_subtree(&mut self, root_id: &str) -> Result<(), StoreError> {
        if !self.contains(root_id) {
            return Err(StoreError::UnknownNode(root_id.to_owned()));
        }

        let root_color = random_root_color(&mut self.rng);
        let colors = propagate_colors(&self.nodes, root_id, root_color);
        let now = now_millis();

        let mut changed = Vec::with_capacity(colors.len());
        for node in &mut self.nodes {
            if let Some(color) = colors.get(&node.id) {
                node.color = (*color).into();
                node.updated_at = now.max(node.created_at);
                changed.push(node.clone());
            }
        }
        self.persist("recolor", |p| p.save_nodes(&changed));
        debug!("recolored {} nodes under {root_id}", changed.len());
        self.emit(StoreEvent::NodesChanged);
        Ok(())
    }

    /// Stores computed layout positions. Unknown ids and non-finite positions
    /// are skipped. Positions are layout output and are not persisted.
    pub fn apply_positions(&mut self, positions: &HashMap<String, Position3>) -> usize {
        let mut applied = 0;
        for (id, position) in positions {
            if !position.is_finite() {
                warn!("ignoring non-finite position for {id}");
                continue;
            }
            if let Some(node) = self.node_mut(id) {
                node.position = Some(*position);
                applied += 1;
            }
        }
        if applied > 0 {
            self.emit(StoreEvent::LayoutApplied);
        }
        applied
    }
}

/// First position past the current siblings whose hue no sibling already
/// wears, so a child added after a delete never repeats a sibling's hue.
fn free_sibling_position(parent: OklchColor, sibling_hues: &[f32]) -> usize {
    let first = sibling_hues.len() + 1;
    (first..=first + sibling_hues.len())
        .find(|&position| {
            let hue = child_color(parent, position).h;
            sibling_hues.iter().all(|&taken| hue_distance(taken, hue) > HUE_TOLERANCE)
        })
        .unwrap_or(first)
}

const HUE_TOLERANCE: f32 = 0.5;

fn hue_distance(a: f32, b: f32) -> f32 {
    let delta = (a - b).rem_euclid(360.0);
    delta.min(360.0 - delta)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use anyhow::anyhow;

    use super::*;
    use crate::model::{Session, Settings};
    use crate::store::Persistence;

    fn store() -> MindMapStore {
        MindMapStore::in_memory()
    }

    #[test]
    fn empty_title_is_refused() {
        let mut store = store();
        let before = store.len();
        assert_eq!(store.create_node("   ", None, None), Err(StoreError::EmptyTitle));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn unknown_parent_is_refused() {
        let mut store = store();
        assert_eq!(
            store.create_node("x", Some("ghost"), None),
            Err(StoreError::UnknownParent("ghost".into()))
        );
    }

    #[test]
    fn child_color_uses_sibling_position() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        let root_color = store.node(&root).unwrap().oklch();
        let first = store.create_node("First", None, None).unwrap();
        let second = store.create_node("Second", Some(&root), None).unwrap();

        assert_eq!(store.node(&first).unwrap().oklch(), child_color(root_color, 1));
        assert_eq!(store.node(&second).unwrap().oklch(), child_color(root_color, 2));
        assert_eq!(store.node(&first).unwrap().parent_id.as_deref(), Some(root.as_str()));
    }

    #[test]
    fn child_after_delete_gets_an_unused_hue() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        store.create_node("One", Some(&root), None).unwrap();
        let two = store.create_node("Two", Some(&root), None).unwrap();
        store.create_node("Three", Some(&root), None).unwrap();
        store.delete_node(&two).unwrap();

        let fresh = store.create_node("Four", Some(&root), None).unwrap();
        let hue = store.node(&fresh).unwrap().oklch().h;
        for sibling in store.nodes() {
            if sibling.parent_id.as_deref() == Some(root.as_str()) && sibling.id != fresh {
                assert!(hue_distance(sibling.oklch().h, hue) > HUE_TOLERANCE);
            }
        }
        let root_color = store.node(&root).unwrap().oklch();
        assert_eq!(store.node(&fresh).unwrap().oklch(), child_color(root_color, 4));
    }

    #[test]
    fn update_rebuilds_breadcrumb_on_path() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        let child = store.create_node("Child", None, None).unwrap();
        store.navigate_to(&child);

        store.update_node(&root, NodePatch::title("Renamed")).unwrap();
        assert_eq!(store.breadcrumb(), ["Renamed", "Child"]);
        assert_eq!(
            store.update_node(&root, NodePatch::title(" ")),
            Err(StoreError::EmptyTitle)
        );
    }

    #[test]
    fn update_filters_links() {
        let mut store = store();
        let a = store.create_node("A", None, None).unwrap();
        let b = store.create_node("B", None, None).unwrap();
        store
            .update_node(&a, NodePatch::links(vec![b.clone(), b.clone(), a.clone(), "ghost".into()]))
            .unwrap();
        assert_eq!(store.node(&a).unwrap().links, vec![b]);
    }

    #[test]
    fn delete_cascades_and_reanchors() {
        let mut store = store();
        let a = store.create_node("A", None, None).unwrap();
        let b = store.create_node("B", Some(&a), None).unwrap();
        let c = store.create_node("C", Some(&b), None).unwrap();
        let other = store.create_node("Other", None, None).unwrap();
        store.create_link(&other, &c).unwrap();
        store.navigate_to(&c);

        let removed = store.delete_node(&b).unwrap();
        assert_eq!(removed, HashSet::from([b.clone(), c.clone()]));
        assert!(!store.contains(&b) && !store.contains(&c));
        assert_eq!(store.root_id(), Some(a.as_str()));
        assert!(store.node(&other).unwrap().links.is_empty());
        for node in store.nodes() {
            if let Some(parent) = &node.parent_id {
                assert!(store.contains(parent));
            }
        }
    }

    #[test]
    fn deleting_current_root_moves_to_parent() {
        let mut store = store();
        let a = store.create_node("A", None, None).unwrap();
        let b = store.create_node("B", Some(&a), None).unwrap();
        store.navigate_to(&b);
        store.select_node(Some(&b));

        store.delete_node(&b).unwrap();
        assert_eq!(store.root_id(), Some(a.as_str()));
        assert_eq!(store.view().selected_node_id, None);
        assert_eq!(store.session().unwrap().current_root_id, a);
    }

    #[test]
    fn deleting_structural_root_clears_everything() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        store.create_node("A", None, None).unwrap();
        let events = store.subscribe();

        let removed = store.delete_node(&root).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(store.is_empty());
        assert_eq!(store.root_id(), None);
        assert!(store.breadcrumb().is_empty());
        let seen = events.try_iter().collect::<Vec<_>>();
        assert!(seen.contains(&StoreEvent::RootChanged { root_id: None }));

        let fresh = store.create_node("Again", Some("whatever"), None).unwrap();
        assert!(store.node(&fresh).unwrap().is_structural_root());
        assert_eq!(store.root_id(), Some(fresh.as_str()));
    }

    #[test]
    fn links_reject_self_and_duplicates() {
        let mut store = store();
        let a = store.create_node("A", None, None).unwrap();
        let b = store.create_node("B", None, None).unwrap();
        assert_eq!(store.create_link(&a, &a), Err(StoreError::SelfLink));
        assert_eq!(store.create_link(&a, &b), Ok(true));
        assert_eq!(store.create_link(&a, &b), Ok(false));
        assert_eq!(
            store.create_link(&a, "ghost"),
            Err(StoreError::UnknownNode("ghost".into()))
        );
        assert_eq!(store.remove_link(&a, &b), Ok(true));
        assert_eq!(store.remove_link(&a, &b), Ok(false));
    }

    #[test]
    fn recolor_follows_propagation() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        let a = store.create_node("A", None, None).unwrap();
        let a1 = store.create_node("A1", Some(&a), None).unwrap();

        store.recolor_subtree(&root).unwrap();
        let root_color = store.node(&root).unwrap().oklch();
        let a_color = store.node(&a).unwrap().oklch();
        assert_eq!(a_color, child_color(root_color, 1));
        assert_eq!(store.node(&a1).unwrap().oklch(), child_color(a_color, 1));
        assert!(store.recolor_subtree("ghost").is_err());
    }

    #[test]
    fn positions_skip_unknown_and_non_finite() {
        let mut store = store();
        let root = store.root_id().unwrap().to_owned();
        let positions = HashMap::from([
            (root.clone(), Position3::new(1.0, 2.0, 3.0)),
            ("ghost".to_owned(), Position3::ZERO),
        ]);
        assert_eq!(store.apply_positions(&positions), 1);
        assert_eq!(store.node(&root).unwrap().position, Some(Position3::new(1.0, 2.0, 3.0)));

        let bad = HashMap::from([(root.clone(), Position3::new(f32::NAN, 0.0, 0.0))]);
        assert_eq!(store.apply_positions(&bad), 0);
    }

    struct FailingPersistence;

    impl Persistence for FailingPersistence {
        fn load_all_nodes(&mut self) -> anyhow::Result<Vec<Node>> {
            Ok(Vec::new())
        }
        fn load_settings(&mut self) -> anyhow::Result<Option<Settings>> {
            Ok(None)
        }
        fn load_session(&mut self) -> anyhow::Result<Option<Session>> {
            Ok(None)
        }
        fn save_node(&mut self, _node: &Node) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
        fn delete_nodes(&mut self, _ids: &HashSet<String>) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
        fn clear_nodes(&mut self) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
        fn save_session(&mut self, _session: &Session) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
        fn save_settings(&mut self, _settings: &Settings) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    #[test]
    fn failed_saves_keep_in_memory_state() {
        let mut store =
            MindMapStore::open(Box::new(FailingPersistence), Default::default()).unwrap();
        assert_eq!(store.len(), 1);
        let child = store.create_node("Child", None, None).unwrap();
        assert!(store.contains(&child));
        store.delete_node(&child).unwrap();
        assert!(!store.contains(&child));
    }
}
