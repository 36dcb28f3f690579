//! Deterministic color propagation down the tree, plus OKLCH -> sRGB for rendering.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;

use super::node::{Node, OklchColor};
use super::tree::ChildIndex;

pub const GOLDEN_ANGLE: f32 = 137.508;
pub const MAX_CHROMA: f32 = 0.25;
pub const CHROMA_FALLOFF: f32 = 0.92;
pub const LIGHTNESS_STEP: f32 = 0.04;
pub const MIN_LIGHTNESS: f32 = 0.35;
pub const MAX_LIGHTNESS: f32 = 0.9;

const ROOT_LIGHTNESS: f32 = 0.7;
const ROOT_CHROMA: f32 = 0.15;
const DEFAULT_ROOT_HUE: f32 = 220.0;

/// Color for the child at `sibling_index` under a parent of `parent` color.
pub fn child_color(parent: OklchColor, sibling_index: usize) -> OklchColor {
    let hue = (parent.h + sibling_index as f32 * GOLDEN_ANGLE).rem_euclid(360.0);
    let chroma = (parent.c * CHROMA_FALLOFF).clamp(0.0, MAX_CHROMA);

    let delta = (0.5 - parent.l).clamp(-LIGHTNESS_STEP, LIGHTNESS_STEP);
    let lightness = (parent.l + delta).clamp(MIN_LIGHTNESS, MAX_LIGHTNESS);

    OklchColor {
        l: lightness,
        c: chroma,
        h: hue,
    }
}

pub fn default_root_color() -> OklchColor {
    OklchColor {
        l: ROOT_LIGHTNESS,
        c: ROOT_CHROMA,
        h: DEFAULT_ROOT_HUE,
    }
}

pub fn random_root_color<R: Rng + ?Sized>(rng: &mut R) -> OklchColor {
    OklchColor {
        l: ROOT_LIGHTNESS,
        c: ROOT_CHROMA,
        h: rng.gen_range(0.0..360.0),
    }
}

/// Breadth-first recoloring of the subtree under `root_id`, seeded with
/// `root_color`. Children are keyed by their 1-based position among siblings
/// in node-list order.
pub fn propagate_colors(
    nodes: &[Node],
    root_id: &str,
    root_color: OklchColor,
) -> HashMap<String, OklchColor> {
    let index = ChildIndex::new(nodes);
    let mut colors = HashMap::new();
    if !index.contains(root_id) {
        return colors;
    }

    colors.insert(root_id.to_owned(), root_color);
    let mut visited = HashSet::from([root_id]);
    let mut queue = VecDeque::from([(root_id, root_color)]);

    while let Some((parent_id, parent_color)) = queue.pop_front() {
        for (position, &child_id) in index.children_of(parent_id).iter().enumerate() {
            if !visited.insert(child_id) {
                continue;
            }
            let color = child_color(parent_color, position + 1);
            colors.insert(child_id.to_owned(), color);
            queue.push_back((child_id, color));
        }
    }

    colors
}

/// Gamma-encoded sRGB bytes, clamped into gamut.
pub fn oklch_to_srgb(color: OklchColor) -> [u8; 3] {
    let hue = color.h.to_radians();
    let a = color.c * hue.cos();
    let b = color.c * hue.sin();

    let l_ = color.l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = color.l - 0.105_561_35 * a - 0.063_854_17 * b;
    let s_ = color.l - 0.089_484_18 * a - 1.291_485_5 * b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    let r = 4.076_741_7 * l - 3.307_711_6 * m + 0.230_969_94 * s;
    let g = -1.268_438 * l + 2.609_757_4 * m - 0.341_319_38 * s;
    let b = -0.004_196_086_3 * l - 0.703_418_6 * m + 1.707_614_7 * s;

    [encode_channel(r), encode_channel(g), encode_channel(b)]
}

fn encode_channel(linear: f32) -> u8 {
    let linear = if linear.is_finite() {
        linear.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let encoded = if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Black text on light fills, white on dark ones.
pub fn contrast_text(color: OklchColor) -> [u8; 3] {
    if color.l > 0.5 { [0, 0, 0] } else { [255, 255, 255] }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn color(l: f32, c: f32, h: f32) -> OklchColor {
        OklchColor { l, c, h }
    }

    #[test]
    fn child_color_is_pure() {
        let parent = color(0.7, 0.15, 220.0);
        let first = child_color(parent, 3);
        let second = child_color(parent, 3);
        assert_eq!(first.l.to_bits(), second.l.to_bits());
        assert_eq!(first.c.to_bits(), second.c.to_bits());
        assert_eq!(first.h.to_bits(), second.h.to_bits());
    }

    #[test]
    fn hue_rotates_by_golden_angle() {
        let parent = color(0.7, 0.15, 300.0);
        let child = child_color(parent, 1);
        assert!((child.h - (300.0 + GOLDEN_ANGLE - 360.0)).abs() < 1e-3);
        assert!((0.0..360.0).contains(&child.h));
    }

    #[test]
    fn chroma_is_non_increasing_and_bounded() {
        let parent = color(0.7, 0.4, 0.0);
        let child = child_color(parent, 1);
        assert!(child.c <= MAX_CHROMA);
        let grandchild = child_color(child, 1);
        assert!(grandchild.c <= child.c);
    }

    #[test]
    fn lightness_moves_toward_middle_and_clamps() {
        assert!((child_color(color(0.7, 0.1, 0.0), 1).l - 0.66).abs() < 1e-6);
        assert!((child_color(color(0.3, 0.1, 0.0), 1).l - 0.35).abs() < 1e-6);
        assert!((child_color(color(0.95, 0.1, 0.0), 1).l - 0.9).abs() < 1e-6);
        assert!((child_color(color(0.5, 0.1, 0.0), 1).l - 0.5).abs() < 1e-6);
    }

    #[test]
    fn lightness_settles_on_middle_without_overshoot() {
        for start in [0.52, 0.48, 0.7, 0.35] {
            let mut current = color(start, 0.1, 0.0);
            for _ in 0..20 {
                let next = child_color(current, 1);
                assert!((next.l - 0.5).abs() <= (current.l - 0.5).abs() + 1e-6);
                current = next;
            }
            assert!((current.l - 0.5).abs() < 1e-6, "{start} ended at {}", current.l);
        }
    }

    #[test]
    fn propagation_follows_sibling_positions() {
        let root_color = color(0.7, 0.15, 10.0);
        let nodes = vec![
            Node::new("r".into(), None, "R".into(), root_color, 0),
            Node::new("a".into(), Some("r".into()), "A".into(), root_color, 0),
            Node::new("b".into(), Some("r".into()), "B".into(), root_color, 0),
            Node::new("a1".into(), Some("a".into()), "A1".into(), root_color, 0),
        ];
        let fresh = color(0.7, 0.15, 99.0);
        let colors = propagate_colors(&nodes, "r", fresh);
        assert_eq!(colors["r"], fresh);
        assert_eq!(colors["a"], child_color(fresh, 1));
        assert_eq!(colors["b"], child_color(fresh, 2));
        assert_eq!(colors["a1"], child_color(colors["a"], 1));

        let sub = propagate_colors(&nodes, "a", fresh);
        assert_eq!(sub.len(), 2);
        assert!(propagate_colors(&nodes, "missing", fresh).is_empty());
    }

    #[test]
    fn random_root_keeps_fixed_lightness_and_chroma() {
        let mut rng = StdRng::seed_from_u64(3);
        let root = random_root_color(&mut rng);
        assert_eq!(root.l, ROOT_LIGHTNESS);
        assert_eq!(root.c, ROOT_CHROMA);
        assert!((0.0..360.0).contains(&root.h));
    }

    #[test]
    fn srgb_conversion_handles_extremes() {
        assert_eq!(oklch_to_srgb(color(1.0, 0.0, 0.0)), [255, 255, 255]);
        assert_eq!(oklch_to_srgb(color(0.0, 0.0, 0.0)), [0, 0, 0]);
        let mid = oklch_to_srgb(color(0.6, 0.0, 0.0));
        assert_eq!(mid[0], mid[1]);
        assert_eq!(mid[1], mid[2]);
        assert_eq!(contrast_text(color(0.7, 0.1, 0.0)), [0, 0, 0]);
    }
}
