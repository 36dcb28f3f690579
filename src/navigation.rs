//! Which nodes and edges are on screen for a given navigation root, and how
//! the navigation root stays valid while the tree changes underneath it.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::model::{ChildIndex, Node};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub root_id: Option<String>,
    pub selected_node_id: Option<String>,
    pub hovered_node_id: Option<String>,
    /// Titles from the structural root down to `root_id`.
    pub breadcrumb: Vec<String>,
}

impl ViewState {
    /// Moves the navigation root to `id`. Unknown ids leave the state untouched
    /// and return `false`.
    pub fn navigate(&mut self, nodes: &[Node], id: &str) -> bool {
        if !nodes.iter().any(|node| node.id == id) {
            warn!("ignoring navigation to unknown node {id}");
            return false;
        }

        self.root_id = Some(id.to_owned());
        self.refresh_breadcrumb(nodes);
        true
    }

    pub fn refresh_breadcrumb(&mut self, nodes: &[Node]) {
        self.breadcrumb = match &self.root_id {
            Some(root_id) => breadcrumb(nodes, root_id),
            None => Vec::new(),
        };
    }

    /// Drops selection and hover pointers whose node no longer exists.
    pub fn forget_missing(&mut self, nodes: &[Node]) {
        let exists = |id: &String| nodes.iter().any(|node| &node.id == id);
        if self.selected_node_id.as_ref().is_some_and(|id| !exists(id)) {
            self.selected_node_id = None;
        }
        if self.hovered_node_id.as_ref().is_some_and(|id| !exists(id)) {
            self.hovered_node_id = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn root_is_valid(&self, nodes: &[Node]) -> bool {
        match &self.root_id {
            Some(root_id) => nodes.iter().any(|node| &node.id == root_id),
            None => nodes.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Hierarchy,
    Link,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// Normal mode: the root and its direct children. God Mode: the root and every
/// transitive descendant. Root first; unknown root gives an empty set.
pub fn visible_node_ids<'a>(nodes: &'a [Node], root_id: &str, god_mode: bool) -> Vec<&'a str> {
    let index = ChildIndex::new(nodes);
    let Some(root) = index.node(root_id) else {
        debug!("no visible nodes: root {root_id} is not in the node set");
        return Vec::new();
    };

    let mut ids = vec![root.id.as_str()];
    if god_mode {
        ids.extend(index.descendants(root_id));
    } else {
        ids.extend(index.children_of(root_id).iter().copied());
    }
    ids
}

pub fn visible_nodes<'a>(nodes: &'a [Node], root_id: &str, god_mode: bool) -> Vec<&'a Node> {
    let by_id = nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect::<HashMap<_, _>>();
    visible_node_ids(nodes, root_id, god_mode)
        .into_iter()
        .filter_map(|id| by_id.get(id).copied())
        .collect()
}

/// Normal-mode visible set plus every node linked from it, which the force
/// simulation relaxes together.
pub fn simulation_nodes<'a>(nodes: &'a [Node], root_id: &str) -> Vec<&'a Node> {
    let mut selected = visible_nodes(nodes, root_id, false);
    let mut seen = selected
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let by_id = nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect::<HashMap<_, _>>();

    let mut extra = Vec::new();
    for node in &selected {
        for target in &node.links {
            if let Some(&linked) = by_id.get(target.as_str()) {
                if seen.insert(linked.id.as_str()) {
                    extra.push(linked);
                }
            }
        }
    }
    selected.extend(extra);
    selected
}

/// Parent edges plus one link edge per `links` entry, both ends in `visible`.
/// Mutual links therefore yield two edges, one per direction.
pub fn visible_edges(visible: &[&Node]) -> Vec<Edge> {
    let ids = visible
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();

    let mut edges = Vec::new();
    for node in visible {
        if let Some(parent_id) = node.parent_id.as_deref() {
            if ids.contains(parent_id) {
                edges.push(Edge {
                    source: parent_id.to_owned(),
                    target: node.id.clone(),
                    kind: EdgeKind::Hierarchy,
                });
            }
        }
    }

    for node in visible {
        for target in &node.links {
            if target == &node.id || !ids.contains(target.as_str()) {
                continue;
            }
            edges.push(Edge {
                source: node.id.clone(),
                target: target.clone(),
                kind: EdgeKind::Link,
            });
        }
    }

    edges
}

/// Nodes from the structural root down to `id`. A dangling parent reference or a
/// cycle truncates the path at that point.
pub fn ancestor_path<'a>(nodes: &'a [Node], id: &str) -> Vec<&'a Node> {
    let by_id = nodes
        .iter()
        .map(|node| (node.id.as_str(), node))
        .collect::<HashMap<_, _>>();

    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = by_id.get(id).copied();
    while let Some(node) = cursor {
        if !visited.insert(node.id.as_str()) {
            warn!("parent chain of {id} loops at {}", node.id);
            break;
        }
        path.push(node);

        cursor = match node.parent_id.as_deref() {
            Some(parent_id) => {
                let parent = by_id.get(parent_id).copied();
                if parent.is_none() {
                    debug!("breadcrumb for {id} truncated at dangling parent {parent_id}");
                }
                parent
            }
            None => None,
        };
    }

    path.reverse();
    path
}

pub fn breadcrumb(nodes: &[Node], root_id: &str) -> Vec<String> {
    ancestor_path(nodes, root_id)
        .into_iter()
        .map(|node| node.title.clone())
        .collect()
}

/// Where the navigation root should go after `deleted` ids are removed.
///
/// `nodes` is the set before deletion. A surviving root stays put; otherwise
/// the closest surviving ancestor wins, then the structural root of what is
/// left. `None` means nothing survives.
pub fn reanchor_target(
    nodes: &[Node],
    current_root: Option<&str>,
    deleted: &HashSet<String>,
) -> Option<String> {
    if let Some(root_id) = current_root {
        if !deleted.contains(root_id) && nodes.iter().any(|node| node.id == root_id) {
            return Some(root_id.to_owned());
        }

        let surviving_ancestor = ancestor_path(nodes, root_id)
            .into_iter()
            .rev()
            .find(|node| !deleted.contains(&node.id));
        if let Some(ancestor) = surviving_ancestor {
            return Some(ancestor.id.clone());
        }
    }

    nodes
        .iter()
        .filter(|node| node.parent_id.is_none() && !deleted.contains(&node.id))
        .min_by_key(|node| (node.created_at, node.id.as_str()))
        .map(|node| node.id.clone())
}
