use serde::{Deserialize, Serialize};

/// Perceptual color triple: lightness `l` in `[0, 1]`, chroma `c`, hue `h` in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OklchColor {
    pub l: f32,
    pub c: f32,
    pub h: f32,
}

/// Wire wrapper kept so stored documents read `"color": { "oklch": { .. } }`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeColor {
    pub oklch: OklchColor,
}

impl From<OklchColor> for NodeColor {
    fn from(oklch: OklchColor) -> Self {
        Self { oklch }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_origin(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub color: NodeColor,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position3>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Node {
    pub fn new(
        id: String,
        parent_id: Option<String>,
        title: String,
        color: OklchColor,
        now: u64,
    ) -> Self {
        Self {
            id,
            parent_id,
            title,
            body: None,
            tags: Vec::new(),
            color: color.into(),
            links: Vec::new(),
            position: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body.filter(|body| !body.trim().is_empty());
        self
    }

    pub fn is_structural_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn oklch(&self) -> OklchColor {
        self.color.oklch
    }

    /// Records with no id or no title are dropped on load.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty()
    }
}

/// Partial update for `update_node`; `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub title: Option<String>,
    pub body: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
}

impl NodePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn links(links: Vec<String>) -> Self {
        Self {
            links: Some(links),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    Always,
    #[default]
    Hover,
    Never,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeThickness {
    Thick,
    #[default]
    Normal,
    Thin,
}

impl EdgeThickness {
    pub fn stroke_width(self) -> f32 {
        match self {
            Self::Thick => 2.4,
            Self::Normal => 1.4,
            Self::Thin => 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceCap {
    pub node_labels: LabelMode,
    pub max_visible_nodes: usize,
    pub edge_thickness: EdgeThickness,
}

impl Default for PerformanceCap {
    fn default() -> Self {
        Self {
            node_labels: LabelMode::Hover,
            max_visible_nodes: 2000,
            edge_thickness: EdgeThickness::Normal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDefaults {
    pub link_strength: f32,
    pub collision_radius: f32,
    pub center_strength: f32,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            link_strength: 0.3,
            collision_radius: 2.0,
            center_strength: 0.05,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub motion_reduced: bool,
    #[serde(default)]
    pub performance_cap: PerformanceCap,
    #[serde(default)]
    pub layout_defaults: LayoutDefaults,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub current_root_id: String,
    #[serde(default = "default_camera_position")]
    pub camera_position: Position3,
    #[serde(default)]
    pub camera_target: Position3,
    #[serde(default)]
    pub last_accessed: u64,
}

fn default_camera_position() -> Position3 {
    Position3::new(5.0, 5.0, 5.0)
}

impl Session {
    pub const DEFAULT_ID: &'static str = "default";

    pub fn new(current_root_id: String, now: u64) -> Self {
        Self {
            id: Self::DEFAULT_ID.to_owned(),
            current_root_id,
            camera_position: default_camera_position(),
            camera_target: Position3::ZERO,
            last_accessed: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_with_camel_case_and_nested_color() {
        let node = Node::new(
            "n1".to_owned(),
            Some("root".to_owned()),
            "Ideas".to_owned(),
            OklchColor {
                l: 0.7,
                c: 0.15,
                h: 220.0,
            },
            10,
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["parentId"], "root");
        assert_eq!(value["createdAt"], 10);
        assert!((value["color"]["oklch"]["h"].as_f64().unwrap() - 220.0).abs() < 1e-6);
        assert!(value.get("body").is_none());
    }

    #[test]
    fn node_deserializes_without_optional_fields() {
        let raw = r#"{
            "id": "a",
            "parentId": null,
            "title": "Root",
            "color": { "oklch": { "l": 0.7, "c": 0.15, "h": 10 } },
            "createdAt": 1,
            "updatedAt": 2
        }"#;
        let node: Node = serde_json::from_str(raw).unwrap();
        assert!(node.is_structural_root());
        assert!(node.links.is_empty());
        assert!(node.tags.is_empty());
        assert_eq!(node.position, None);
    }

    #[test]
    fn settings_fill_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "theme": "light" }"#).unwrap();
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.layout_defaults, LayoutDefaults::default());
        assert_eq!(settings.performance_cap.max_visible_nodes, 2000);
    }
}
