use std::f64::consts::{FRAC_PI_4, FRAC_PI_6};

/// Tuning constants of the perspective effect.
#[derive(Clone, Debug)]
pub struct FlowParams {
    /// How far the effect reaches from the viewport center.
    pub active_distance: f64,
    /// Scale bonus of the centered item.
    pub zoom_factor: f64,
    /// Tilt of items in the outer half of the active range.
    pub max_rotation: f64,
    /// Gentler tilt limit inside the inner half, for a continuous curve
    /// through the center.
    pub inner_rotation: f64,
    pub item_width: f64,
    pub item_height: f64,
    /// Negative spacing overlaps adjacent items on purpose.
    pub item_spacing: f64,
    /// Foreshortening constant for the host's projection matrix, shared by
    /// all items so they read as one vanishing point.
    pub perspective_depth: f64,
    /// Items closer to the viewport center than this count as focused.
    pub focus_distance: f64,
}

impl FlowParams {
    /// Distance between the centers of two adjacent items.
    pub fn step(&self) -> f64 {
        self.item_width + self.item_spacing
    }
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            active_distance: 200.0,
            zoom_factor: 0.3,
            max_rotation: FRAC_PI_4,
            inner_rotation: FRAC_PI_6,
            item_width: 200.0,
            item_height: 300.0,
            item_spacing: -80.0,
            perspective_depth: 500.0,
            focus_distance: 60.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub width: f64,
}

impl Viewport {
    /// Absolute position of the viewport center at the given scroll offset.
    pub fn center(&self, scroll_offset: f64) -> f64 {
        scroll_offset + self.width / 2.0
    }
}

/// Per-item output of the perspective math.  Derived on every scroll tick,
/// never stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverTransform {
    pub scale: f64,
    /// Rotation about the vertical axis, in radians.  Negative tilts the
    /// right edge away from the viewer.
    pub rotation: f64,
    /// Draw order; higher values draw above lower ones.
    pub z_index: i32,
    pub focused: bool,
}

impl CoverTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        rotation: 0.0,
        z_index: 0,
        focused: false,
    };
}

/// Transform of an item whose center sits `distance` away from the viewport
/// center.  Total and deterministic; items outside the active range keep the
/// identity transform.
pub fn cover_transform(distance: f64, params: &FlowParams) -> CoverTransform {
    let abs = distance.abs();
    if abs >= params.active_distance {
        return CoverTransform::IDENTITY;
    }

    let normalized = distance / params.active_distance;
    let scale = 1.0 + params.zoom_factor * (1.0 - normalized.abs().powf(1.5));

    let rotation = if abs < params.active_distance / 2.0 {
        -normalized * params.inner_rotation
    } else if distance > 0.0 {
        -params.max_rotation
    } else {
        params.max_rotation
    };

    CoverTransform {
        scale,
        rotation,
        // Scale before rounding, so that closer items really do draw above
        // farther ones.
        z_index: (scale * 100.0).round() as i32,
        focused: abs < params.focus_distance,
    }
}
