use std::cmp::Ordering;

use crate::geometry::{cover_transform, CoverTransform, FlowParams, Viewport};

/// Positions the cover strip and computes per-item transforms.  The item
/// sequence itself lives in the track window; this engine only needs the
/// count and the scroll offset.
pub struct FlowLayout {
    pub params: FlowParams,
    pub viewport: Viewport,
}

impl FlowLayout {
    pub fn new(params: FlowParams, viewport: Viewport) -> Self {
        Self { params, viewport }
    }

    /// Geometric center of item `index` along the scroll axis.
    pub fn item_center(&self, index: usize) -> f64 {
        index as f64 * self.params.step() + self.params.item_width / 2.0
    }

    /// Scroll offset that centers item `index` in the viewport.
    pub fn offset_centering(&self, index: usize) -> f64 {
        self.item_center(index) - self.viewport.width / 2.0
    }

    /// Transforms for all items at the given scroll offset.  Recomputed on
    /// every call; the offset is continuous during a drag, so nothing is
    /// cached.
    pub fn layout_items(&self, item_count: usize, scroll_offset: f64) -> Vec<CoverTransform> {
        let center = self.viewport.center(scroll_offset);
        (0..item_count)
            .map(|index| cover_transform(self.item_center(index) - center, &self.params))
            .collect()
    }

    /// Offset the strip should come to rest at after a drag, centering the
    /// item closest to the viewport center under `proposed_offset`.  Ties go
    /// to the lower index.  The velocity argument mirrors the host's
    /// deceleration callback and does not influence the selection.
    pub fn snap_target(&self, proposed_offset: f64, item_count: usize, _velocity: f64) -> f64 {
        let center = self.viewport.center(proposed_offset);
        let closest = (0..item_count).min_by(|&a, &b| {
            let da = (self.item_center(a) - center).abs();
            let db = (self.item_center(b) - center).abs();
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
        match closest {
            Some(index) => self.offset_centering(index),
            None => proposed_offset,
        }
    }

    /// Index of the focused item, if any item is close enough to the center.
    pub fn focused_index(&self, item_count: usize, scroll_offset: f64) -> Option<usize> {
        let center = self.viewport.center(scroll_offset);
        (0..item_count)
            .find(|&index| cover_transform(self.item_center(index) - center, &self.params).focused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FlowLayout {
        FlowLayout::new(FlowParams::default(), Viewport { width: 300.0 })
    }

    #[test]
    fn snap_centers_the_closest_item() {
        let l = layout();
        // Item centers sit at 100, 220 and 340 with the default step of 120.
        let snapped = l.snap_target(80.0, 3, 0.0);
        assert_eq!(snapped, l.offset_centering(1));
        // Snapping the result again is a fixed point.
        assert_eq!(l.snap_target(snapped, 3, 0.0), snapped);
    }

    #[test]
    fn snap_breaks_ties_toward_the_lower_index() {
        let l = layout();
        // Offset 10 puts the viewport center exactly between items 0 and 1.
        assert_eq!(l.snap_target(10.0, 3, -42.0), l.offset_centering(0));
    }

    #[test]
    fn snap_without_items_returns_the_proposed_offset() {
        let l = layout();
        assert_eq!(l.snap_target(123.0, 0, 0.0), 123.0);
    }

    #[test]
    fn focused_index_follows_the_centered_item() {
        let l = layout();
        assert_eq!(l.focused_index(3, l.offset_centering(2)), Some(2));
        assert_eq!(l.focused_index(0, 0.0), None);
        // Half a step off center, nothing qualifies.
        assert_eq!(l.focused_index(3, l.offset_centering(1) + 60.0), None);
    }

    #[test]
    fn centered_item_is_focused_and_draws_on_top() {
        let l = layout();
        let transforms = l.layout_items(3, l.offset_centering(1));
        assert_eq!(transforms.len(), 3);
        assert!(transforms[1].focused);
        assert!(!transforms[0].focused);
        assert!(!transforms[2].focused);
        assert!(transforms[1].z_index > transforms[0].z_index);
        assert!(transforms[1].z_index > transforms[2].z_index);
        // Neighbors tilt toward the center from both sides.
        assert!(transforms[0].rotation > 0.0);
        assert!(transforms[2].rotation < 0.0);
    }

    #[test]
    fn empty_strip_produces_no_transforms() {
        let l = layout();
        assert!(l.layout_items(0, 0.0).is_empty());
    }
}
