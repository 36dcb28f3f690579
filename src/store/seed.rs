use log::{info, warn};

use super::{MindMapStore, StoreError};
use crate::model::NodePatch;

struct DemoNode {
    title: &'static str,
    body: Option<&'static str>,
    tags: &'static [&'static str],
    children: &'static [DemoNode],
}

const DEMO: DemoNode = DemoNode {
    title: "My Map",
    body: Some("The central hub for your thoughts, projects and ideas. Double-click a node to explore it."),
    tags: &["root", "central"],
    children: &[
        DemoNode {
            title: "Ideas",
            body: Some("Creative thoughts and brainstorming. Capture a spark before it fades."),
            tags: &["creative", "innovation", "brainstorming"],
            children: &[
                DemoNode {
                    title: "App Concepts",
                    body: Some("Application ideas that solve a real problem for someone."),
                    tags: &["apps", "mobile", "web"],
                    children: &[],
                },
                DemoNode {
                    title: "Business Ideas",
                    body: None,
                    tags: &[],
                    children: &[],
                },
                DemoNode {
                    title: "Creative Projects",
                    body: None,
                    tags: &[],
                    children: &[],
                },
            ],
        },
        DemoNode {
            title: "Reading",
            body: Some("Books and articles on the list, with the insights worth keeping."),
            tags: &["books", "learning", "knowledge"],
            children: &[DemoNode {
                title: "Technical Books",
                body: Some("Programming and software architecture reading."),
                tags: &["programming", "technical", "skills"],
                children: &[],
            }],
        },
        DemoNode {
            title: "Revision",
            body: Some("Study material and topics to revisit before they slip."),
            tags: &["study", "review", "education"],
            children: &[],
        },
    ],
};

fn plant(
    store: &mut MindMapStore,
    node: &DemoNode,
    parent_id: Option<&str>,
) -> Result<usize, StoreError> {
    let id = store.create_node(node.title, parent_id, node.body.map(str::to_owned))?;
    if !node.tags.is_empty() {
        let tags = node.tags.iter().map(|tag| (*tag).to_owned()).collect();
        store.update_node(
            &id,
            NodePatch {
                tags: Some(tags),
                ..NodePatch::default()
            },
        )?;
    }

    let mut planted = 1;
    for child in node.children {
        planted += plant(store, child, Some(&id))?;
    }
    Ok(planted)
}

/// Fills an empty store with a small example tree.
pub(super) fn plant_demo(store: &mut MindMapStore) {
    match plant(store, &DEMO, None) {
        Ok(planted) => info!("planted demo tree with {planted} nodes"),
        Err(error) => warn!("demo tree incomplete: {error}"),
    }
}
