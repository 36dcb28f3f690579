use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use crate::camera::{ViewportPose, world_from_offset, world_offset};
use crate::model::OklchColor;
use crate::model::color::{contrast_text, oklch_to_srgb};

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn node_fill(color: OklchColor) -> Color32 {
    let [r, g, b] = oklch_to_srgb(color);
    Color32::from_rgb(r, g, b)
}

pub(super) fn node_text(color: OklchColor) -> Color32 {
    let [r, g, b] = contrast_text(color);
    Color32::from_rgb(r, g, b)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pose: ViewportPose, dark: bool) {
    let (fill, grid) = if dark {
        (
            Color32::from_rgb(19, 23, 29),
            Color32::from_rgba_unmultiplied(60, 70, 80, 70),
        )
    } else {
        (
            Color32::from_rgb(246, 246, 243),
            Color32::from_rgba_unmultiplied(180, 184, 190, 90),
        )
    };
    painter.rect_filled(rect, 0.0, fill);

    // one grid cell per world unit, thinned out when zoomed far away
    let mut step = pose.zoom;
    while step < 20.0 {
        step *= 4.0;
    }
    let origin = rect.center() + pose.pan;

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, grid),
        );
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            Stroke::new(1.0, grid),
        );
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

pub(super) fn world_to_screen(rect: Rect, pose: ViewportPose, world: Vec2) -> Pos2 {
    rect.center() + world_offset(pose, world)
}

pub(super) fn screen_to_world(rect: Rect, pose: ViewportPose, screen: Pos2) -> Vec2 {
    world_from_offset(pose, screen - rect.center())
}

/// Screen radius for a world radius, kept readable at both zoom extremes.
pub(super) fn screen_radius(world_radius: f32, zoom: f32) -> f32 {
    (world_radius * zoom).clamp(4.0, 64.0)
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    #[test]
    fn screen_and_world_round_trip() {
        let rect = Rect::from_min_size(pos2(10.0, 20.0), vec2(800.0, 600.0));
        let pose = ViewportPose {
            pan: vec2(35.0, -12.0),
            zoom: 48.0,
        };
        let world = vec2(-2.5, 4.0);
        let back = screen_to_world(rect, pose, world_to_screen(rect, pose, world));
        assert!((back - world).length() < 1e-4);
    }

    #[test]
    fn offscreen_circles_are_culled() {
        let rect = Rect::from_min_size(Pos2::ZERO, vec2(100.0, 100.0));
        assert!(circle_visible(rect, pos2(105.0, 50.0), 10.0));
        assert!(!circle_visible(rect, pos2(130.0, 50.0), 10.0));
        assert!(!edge_visible(rect, pos2(-50.0, -50.0), pos2(-10.0, -20.0), 2.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 2.0));
    }

    #[test]
    fn light_fills_get_dark_text() {
        let light = OklchColor {
            l: 0.8,
            c: 0.1,
            h: 90.0,
        };
        assert_eq!(node_text(light), Color32::from_rgb(0, 0, 0));
        assert_eq!(blend_color(Color32::BLACK, Color32::WHITE, 1.0), Color32::WHITE);
    }
}
