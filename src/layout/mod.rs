pub mod force;
pub mod god;
pub mod worker;

pub use force::{ForceConfig, ForceSimulation, simulation_links};
pub use god::{GodLayout, GodLayoutConfig, GodLayoutPosition, compute_god_layout};
pub use worker::{LayoutUpdate, LayoutWorker};

const BASE_RADIUS: f32 = 0.3;
const TITLE_RADIUS_STEP: f32 = 0.02;
const MAX_TITLE_RADIUS: f32 = 0.2;
const SELECTED_BONUS: f32 = 0.1;

/// Rendered node radius in world units; longer titles get slightly larger nodes.
pub fn node_radius(title: &str, selected: bool) -> f32 {
    let from_title = (title.chars().count() as f32 * TITLE_RADIUS_STEP).min(MAX_TITLE_RADIUS);
    let bonus = if selected { SELECTED_BONUS } else { 0.0 };
    BASE_RADIUS + from_title + bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_is_capped_for_long_titles() {
        assert!((node_radius("", false) - 0.3).abs() < 1e-6);
        assert!((node_radius("abcde", false) - 0.4).abs() < 1e-6);
        assert!((node_radius(&"x".repeat(200), false) - 0.5).abs() < 1e-6);
        assert!((node_radius("abcde", true) - 0.5).abs() < 1e-6);
    }
}
