pub mod color;
pub mod interchange;
pub mod node;
pub mod tree;

pub use color::{child_color, default_root_color, propagate_colors, random_root_color};
pub use interchange::{FormatError, MindMapExport, parse_document};
pub use node::{
    LayoutDefaults, Node, NodeColor, NodePatch, OklchColor, Position3, Session, Settings,
};
pub use tree::{ChildIndex, Tree, TreeEntry, build_tree};
