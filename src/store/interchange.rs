use std::collections::HashSet;

use log::{info, warn};

use super::{MindMapStore, StoreError, StoreEvent};
use crate::model::{ChildIndex, MindMapExport, Node, parse_document};
use crate::util::now_millis;

/// What an import did to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// Imported nodes re-parented under the navigation root.
    pub attached: usize,
}

impl MindMapStore {
    /// Snapshot of every node. `rootId` is the current navigation root.
    pub fn export_document(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<MindMapExport, StoreError> {
        let root_id = self.root_id().ok_or(StoreError::EmptyTree)?;
        MindMapExport::build(name, description, &self.nodes, root_id, now_millis())
            .ok_or(StoreError::EmptyTree)
    }

    /// Parses `raw` and merges or replaces. Nothing is touched when the
    /// document is rejected.
    pub fn import_json(&mut self, raw: &str, replace: bool) -> Result<ImportSummary, StoreError> {
        let document = parse_document(raw)?;
        if replace {
            self.import_replace(document)
        } else {
            self.import_merge(document)
        }
    }

    /// Adds every node whose id is not taken yet. Parentless nodes and nodes
    /// whose parent exists nowhere are attached under the navigation root.
    pub fn import_merge(&mut self, document: MindMapExport) -> Result<ImportSummary, StoreError> {
        document.validate()?;
        if self.nodes.is_empty() {
            return self.import_replace(document);
        }

        let total = document.nodes.len();
        let mut seen = HashSet::new();
        let fresh = document
            .nodes
            .into_iter()
            .filter(|node| !self.contains(&node.id) && seen.insert(node.id.clone()))
            .collect::<Vec<_>>();
        if fresh.is_empty() {
            return Err(StoreError::NothingToImport);
        }

        let Some(anchor) = self.root_id().map(str::to_owned) else {
            return Err(StoreError::EmptyTree);
        };
        let fresh_ids = fresh
            .iter()
            .map(|node| node.id.clone())
            .collect::<HashSet<_>>();

        let mut attached = 0;
        let mut incoming = Vec::with_capacity(fresh.len());
        for mut node in fresh {
            let has_parent = node
                .parent_id
                .as_deref()
                .is_some_and(|parent| fresh_ids.contains(parent) || self.contains(parent));
            if !has_parent {
                node.parent_id = Some(anchor.clone());
                attached += 1;
            }
            node.links.retain(|target| fresh_ids.contains(target) || self.contains(target));
            node.position = None;
            incoming.push(node);
        }

        let summary = ImportSummary {
            imported: incoming.len(),
            skipped: total - incoming.len(),
            attached,
        };

        self.persist("import", |p| p.save_nodes(&incoming));
        self.nodes.extend(incoming);
        self.reindex();
        info!(
            "merged {} nodes ({} skipped, {} attached under {anchor})",
            summary.imported, summary.skipped, summary.attached
        );
        self.emit(StoreEvent::NodesChanged);
        self.view.refresh_breadcrumb(&self.nodes);
        Ok(summary)
    }

    /// Clears the store, loads the document verbatim and navigates to its root.
    pub fn import_replace(&mut self, document: MindMapExport) -> Result<ImportSummary, StoreError> {
        document.validate()?;

        let total = document.nodes.len();
        let mut seen = HashSet::new();
        let nodes = document
            .nodes
            .into_iter()
            .filter(|node| node.is_well_formed() && seen.insert(node.id.clone()))
            .collect::<Vec<Node>>();
        if nodes.len() != total {
            warn!("dropped {} malformed or duplicate imported nodes", total - nodes.len());
        }
        if !nodes.iter().any(|node| node.id == document.root_id) {
            return Err(StoreError::UnknownNode(document.root_id));
        }
        let orphans = {
            let index = ChildIndex::new(&nodes);
            nodes
                .iter()
                .filter(|node| {
                    node.parent_id
                        .as_deref()
                        .is_some_and(|parent| !index.contains(parent))
                })
                .count()
        };
        if orphans > 0 {
            warn!("{orphans} imported nodes reference a missing parent");
        }

        self.persist("import", |p| {
            p.clear_nodes()?;
            p.save_nodes(&nodes)
        });
        self.nodes = nodes;
        self.reindex();
        self.view.clear();
        self.link_source = None;
        self.set_god_mode(false);
        self.emit(StoreEvent::NodesChanged);
        info!("replaced store with {} imported nodes", self.nodes.len());
        self.navigate_to(&document.root_id);

        Ok(ImportSummary {
            imported: self.nodes.len(),
            skipped: total - self.nodes.len(),
            attached: 0,
        })
    }
}
