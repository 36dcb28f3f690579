//! Parent/child indexing and the hierarchical tree used by the radial layout.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use log::warn;

use super::node::Node;

/// Parent id -> child ids, in node-list order. Built once per invocation.
pub struct ChildIndex<'a> {
    by_id: HashMap<&'a str, &'a Node>,
    children: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> ChildIndex<'a> {
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in nodes {
            by_id.insert(node.id.as_str(), node);
            if let Some(parent_id) = node.parent_id.as_deref() {
                children
                    .entry(parent_id)
                    .or_default()
                    .push(node.id.as_str());
            }
        }

        Self { by_id, children }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn children_of(&self, id: &str) -> &[&'a str] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Children sorted by title (case-insensitive, then raw title, then id).
    pub fn sorted_children_of(&self, id: &str) -> Vec<&'a str> {
        let mut children = self.children_of(id).to_vec();
        children.sort_by(|a, b| self.compare_titles(a, b));
        children
    }

    fn compare_titles(&self, a: &str, b: &str) -> Ordering {
        let title_a = self.node(a).map(|node| node.title.as_str()).unwrap_or("");
        let title_b = self.node(b).map(|node| node.title.as_str()).unwrap_or("");
        title_a
            .to_lowercase()
            .cmp(&title_b.to_lowercase())
            .then_with(|| title_a.cmp(title_b))
            .then_with(|| a.cmp(b))
    }

    /// All transitive descendants of `id` (excluding `id`), breadth-first.
    pub fn descendants(&self, id: &str) -> Vec<&'a str> {
        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut out = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &child in self.children_of(current) {
                if !visited.insert(child) {
                    warn!("cycle detected below {current}: {child} already visited");
                    continue;
                }
                out.push(child);
                queue.push_back(child);
            }
        }

        out
    }

    /// `ancestor` is `id` itself or one of its transitive parents.
    pub fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            cursor = self
                .node(current)
                .and_then(|node| node.parent_id.as_deref());
        }
        false
    }

    pub fn structural_root(&self) -> Option<&'a Node> {
        self.by_id
            .values()
            .copied()
            .filter(|node| node.parent_id.is_none())
            .min_by_key(|node| (node.created_at, node.id.as_str()))
    }
}

/// One entry of a [`Tree`].
#[derive(Clone, Debug, PartialEq)]
pub struct TreeEntry {
    pub id: String,
    /// Slots of the children in the owning tree, sorted by title.
    pub children: Vec<usize>,
    /// 1 for a leaf, else the sum over children.
    pub leaf_count: usize,
    /// Number of nodes in this subtree, including the entry itself.
    pub size: usize,
    pub depth: usize,
}

impl TreeEntry {
    fn new(id: &str, depth: usize) -> Self {
        Self {
            id: id.to_owned(),
            children: Vec::new(),
            leaf_count: 1,
            size: 1,
            depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Subtree stored flat. Slot 0 is the root and every parent precedes its
/// children, so arbitrarily deep chains never recurse.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn root(&self) -> &TreeEntry {
        &self.entries[0]
    }

    pub fn get(&self, slot: usize) -> Option<&TreeEntry> {
        self.entries.get(slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn children<'a>(&'a self, entry: &'a TreeEntry) -> impl Iterator<Item = &'a TreeEntry> + 'a {
        entry
            .children
            .iter()
            .filter_map(|&slot| self.entries.get(slot))
    }

    /// Parents before children.
    pub fn iter(&self) -> std::slice::Iter<'_, TreeEntry> {
        self.entries.iter()
    }
}

/// Builds the subtree rooted at `root_id`. Unknown root gives `None`;
/// nodes with a dangling parent are never reached and therefore excluded.
pub fn build_tree(root_id: &str, nodes: &[Node]) -> Option<Tree> {
    let index = ChildIndex::new(nodes);
    let root = index.node(root_id)?;

    let mut visited = HashSet::from([root.id.as_str()]);
    let mut ids = vec![root.id.as_str()];
    let mut entries = vec![TreeEntry::new(&root.id, 0)];
    let mut stack = vec![0];

    while let Some(parent) = stack.pop() {
        let depth = entries[parent].depth + 1;
        for child in index.sorted_children_of(ids[parent]) {
            if !visited.insert(child) {
                warn!("skipping {child}: parent chain forms a cycle");
                continue;
            }
            let slot = entries.len();
            entries.push(TreeEntry::new(child, depth));
            ids.push(child);
            entries[parent].children.push(slot);
            stack.push(slot);
        }
    }

    for slot in (0..entries.len()).rev() {
        let entry = &entries[slot];
        if entry.is_leaf() {
            continue;
        }
        let (leaf_count, size) = entry
            .children
            .iter()
            .fold((0, 1), |(leaves, size), &child| {
                (leaves + entries[child].leaf_count, size + entries[child].size)
            });
        entries[slot].leaf_count = leaf_count;
        entries[slot].size = size;
    }

    Some(Tree { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::color::default_root_color;

    fn node(id: &str, parent: Option<&str>, title: &str) -> Node {
        Node::new(
            id.to_owned(),
            parent.map(str::to_owned),
            title.to_owned(),
            default_root_color(),
            0,
        )
    }

    #[test]
    fn leaf_counts_and_depths() {
        let nodes = vec![
            node("r", None, "Root"),
            node("a", Some("r"), "A"),
            node("b", Some("r"), "B"),
            node("a1", Some("a"), "a1"),
            node("a2", Some("a"), "a2"),
        ];
        let tree = build_tree("r", &nodes).unwrap();
        let root = tree.root();
        assert_eq!(root.leaf_count, 3);
        assert_eq!(root.size, 5);
        assert_eq!(tree.len(), 5);

        let children = tree.children(root).collect::<Vec<_>>();
        assert_eq!(children[0].id, "a");
        assert_eq!(children[0].leaf_count, 2);
        assert_eq!(children[0].size, 3);
        assert!(tree.children(children[0]).all(|leaf| leaf.depth == 2));
        assert_eq!(children[1].leaf_count, 1);
    }

    #[test]
    fn children_sorted_by_title() {
        let nodes = vec![
            node("r", None, "Root"),
            node("z", Some("r"), "zebra"),
            node("a", Some("r"), "Apple"),
            node("m", Some("r"), "mango"),
        ];
        let tree = build_tree("r", &nodes).unwrap();
        let order = tree
            .children(tree.root())
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, ["a", "m", "z"]);
    }

    #[test]
    fn dangling_parent_is_excluded() {
        let nodes = vec![
            node("r", None, "Root"),
            node("a", Some("r"), "A"),
            node("orphan", Some("gone"), "Orphan"),
        ];
        let tree = build_tree("r", &nodes).unwrap();
        assert!(tree.iter().all(|entry| entry.id != "orphan"));
        assert_eq!(tree.root().size, 2);
    }

    #[test]
    fn unknown_root_gives_none() {
        let nodes = vec![node("r", None, "Root")];
        assert!(build_tree("missing", &nodes).is_none());
    }

    #[test]
    fn cycles_terminate() {
        let nodes = vec![node("a", Some("b"), "A"), node("b", Some("a"), "B")];
        let tree = build_tree("a", &nodes).unwrap();
        assert_eq!(tree.root().size, 2);
        assert_eq!(tree.len(), 2);

        let index = ChildIndex::new(&nodes);
        assert_eq!(index.descendants("a"), ["b"]);
        assert!(!index.is_ancestor_or_self("x", "a"));
    }

    #[test]
    fn descendants_are_breadth_first() {
        let nodes = vec![
            node("r", None, "Root"),
            node("a", Some("r"), "A"),
            node("a1", Some("a"), "a1"),
            node("b", Some("r"), "B"),
        ];
        let index = ChildIndex::new(&nodes);
        assert_eq!(index.descendants("r"), ["a", "b", "a1"]);
        assert!(index.is_ancestor_or_self("r", "a1"));
        assert_eq!(index.structural_root().map(|n| n.id.as_str()), Some("r"));
    }

    #[test]
    fn deep_chain_builds_without_recursion() {
        let mut nodes = vec![node("n0", None, "n0")];
        for depth in 1..100_000 {
            let parent = format!("n{}", depth - 1);
            nodes.push(node(&format!("n{depth}"), Some(&parent), "link"));
        }
        let tree = build_tree("n0", &nodes).unwrap();
        assert_eq!(tree.len(), 100_000);
        assert_eq!(tree.root().size, 100_000);
        assert_eq!(tree.root().leaf_count, 1);
        assert_eq!(tree.iter().map(|entry| entry.depth).max(), Some(99_999));
    }
}
