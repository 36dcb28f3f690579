use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::Node;

pub const FORMAT_VERSION: &str = "1.0.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub node_count: usize,
    pub created_at: u64,
    pub last_modified: u64,
}

/// Flat JSON interchange document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapExport {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub exported_at: u64,
    pub version: String,
    pub nodes: Vec<Node>,
    pub root_id: String,
    pub metadata: ExportMetadata,
}

impl MindMapExport {
    /// `None` when there is nothing to export.
    pub fn build(
        name: &str,
        description: Option<&str>,
        nodes: &[Node],
        root_id: &str,
        now: u64,
    ) -> Option<Self> {
        let created_at = nodes.iter().map(|node| node.created_at).min()?;
        let last_modified = nodes.iter().map(|node| node.updated_at).max()?;

        Some(Self {
            name: name.to_owned(),
            description: description
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_owned),
            exported_at: now,
            version: FORMAT_VERSION.to_owned(),
            nodes: nodes.to_vec(),
            root_id: root_id.to_owned(),
            metadata: ExportMetadata {
                node_count: nodes.len(),
                created_at,
                last_modified,
            },
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), FormatError> {
        if self.nodes.is_empty() {
            return Err(FormatError::EmptyNodes);
        }

        let ids = self
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        if !ids.contains(self.root_id.as_str()) {
            return Err(FormatError::UnknownRoot(self.root_id.clone()));
        }

        Ok(())
    }
}

/// Import rejections, raised before any state is touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// Not JSON, or JSON that does not match the document shape.
    InvalidJson(String),
    /// The `nodes` field is absent.
    MissingNodes,
    /// `nodes` is present but empty.
    EmptyNodes,
    /// `rootId` does not name a node inside the document.
    UnknownRoot(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(detail) => write!(f, "invalid mind map document: {detail}"),
            Self::MissingNodes => write!(f, "mind map document has no nodes field"),
            Self::EmptyNodes => write!(f, "mind map document contains no nodes"),
            Self::UnknownRoot(id) => {
                write!(f, "mind map rootId {id} does not reference a node in the document")
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Parses and validates an interchange document.
pub fn parse_document(raw: &str) -> Result<MindMapExport, FormatError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| FormatError::InvalidJson(error.to_string()))?;

    match value.get("nodes") {
        None | Some(serde_json::Value::Null) => return Err(FormatError::MissingNodes),
        Some(serde_json::Value::Array(items)) if items.is_empty() => {
            return Err(FormatError::EmptyNodes);
        }
        _ => {}
    }

    let document = MindMapExport::deserialize(&value)
        .map_err(|error| FormatError::InvalidJson(error.to_string()))?;
    document.validate()?;
    Ok(document)
}

/// `My Map!` -> `my_map__mindmap.json`.
pub fn export_file_name(name: &str) -> String {
    let stem = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("{stem}_mindmap.json")
}
