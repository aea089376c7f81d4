// Playfield -> mat coordinate mapping
//
// Each axis is interpolated independently between two calibration anchors.
// The mat's Y axis runs opposite to the playfield's, which shows up as
// bottom_right.y < top_left.y and needs no special handling.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MAT_BOTTOM_RIGHT, MAT_TOP_LEFT};

/// Surface coords of playfield (0, 0) and of the playfield extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatAnchors {
    pub top_left: [f32; 2],
    pub bottom_right: [f32; 2],
}

impl Default for MatAnchors {
    fn default() -> Self {
        Self {
            top_left: MAT_TOP_LEFT,
            bottom_right: MAT_BOTTOM_RIGHT,
        }
    }
}

/// A point in the mat's native coordinate system.
///
/// Signed, since extrapolated targets can fall off the mat. The move-to-target
/// packet narrows it to u16 and rejects what does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacePoint {
    pub x: i32,
    pub y: i32,
}

impl SurfacePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        (self.x as f32 - x).hypot(self.y as f32 - y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    anchors: MatAnchors,
    playfield: [f32; 2],
}

impl CoordinateMapper {
    /// Validates the extent and anchors up front so the control loop never sees a bad mapping
    pub fn new(anchors: MatAnchors, playfield: [f32; 2]) -> Result<Self, ConfigError> {
        let [width, height] = playfield;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ConfigError::PlayfieldExtent { width, height });
        }

        let mut coords = anchors.top_left.iter().chain(anchors.bottom_right.iter());
        if coords.any(|v| !v.is_finite()) {
            return Err(ConfigError::Anchors(format!(
                "non-finite anchor {:?} / {:?}",
                anchors.top_left, anchors.bottom_right
            )));
        }
        for (axis, name) in [(0, "x"), (1, "y")] {
            if anchors.top_left[axis] == anchors.bottom_right[axis] {
                return Err(ConfigError::Anchors(format!(
                    "anchors collapse the {} axis at {}",
                    name, anchors.top_left[axis]
                )));
            }
        }

        Ok(Self { anchors, playfield })
    }

    /// Map a playfield coordinate onto the mat.
    ///
    /// Out-of-range inputs extrapolate linearly and nothing is clamped here,
    /// so the result can be negative. It is truncated toward zero.
    pub fn map(&self, playfield_x: f32, playfield_y: f32) -> SurfacePoint {
        let x = interpolate(
            playfield_x,
            self.playfield[0],
            self.anchors.top_left[0],
            self.anchors.bottom_right[0],
        );
        let y = interpolate(
            playfield_y,
            self.playfield[1],
            self.anchors.top_left[1],
            self.anchors.bottom_right[1],
        );
        // float -> int casts truncate toward zero
        SurfacePoint::new(x as i32, y as i32)
    }
}

fn interpolate(value: f32, span: f32, from: f32, to: f32) -> f32 {
    from + (to - from) * (value / span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_mapper() -> CoordinateMapper {
        CoordinateMapper::new(MatAnchors::default(), [300.0, 300.0]).unwrap()
    }

    #[test]
    fn test_origin_maps_to_top_left() {
        assert_eq!(default_mapper().map(0.0, 0.0), SurfacePoint::new(89, 238));
    }

    #[test]
    fn test_extent_maps_to_bottom_right_with_inverted_y() {
        // bottom_right.y < top_left.y on the real mat
        assert_eq!(default_mapper().map(300.0, 300.0), SurfacePoint::new(283, 45));
    }

    #[test]
    fn test_midpoint() {
        // x: 89 + 194 * 0.5 = 186, y: 238 - 193 * 0.5 = 141.5 -> 141
        assert_eq!(default_mapper().map(150.0, 150.0), SurfacePoint::new(186, 141));
    }

    #[test]
    fn test_out_of_range_extrapolates() {
        let mapper = default_mapper();
        let p = mapper.map(600.0, 0.0);
        // 89 + 194 * 2 = 477, beyond the bottom_right anchor
        assert_eq!(p.x, 477);
    }

    #[test]
    fn test_negative_result_is_kept() {
        let mapper = default_mapper();
        // y: 238 - 193 * 2 = -148
        assert_eq!(mapper.map(0.0, 600.0).y, -148);
        // x: 89 - 194 * 0.5 = -8
        assert_eq!(mapper.map(-150.0, 0.0), SurfacePoint::new(-8, 238));
    }

    #[test]
    fn test_rejects_zero_extent() {
        let err = CoordinateMapper::new(MatAnchors::default(), [300.0, 0.0]).unwrap_err();
        assert!(matches!(err, ConfigError::PlayfieldExtent { .. }));
    }

    #[test]
    fn test_rejects_nan_anchor() {
        let anchors = MatAnchors {
            top_left: [f32::NAN, 238.0],
            bottom_right: [283.0, 45.0],
        };
        assert!(matches!(
            CoordinateMapper::new(anchors, [300.0, 300.0]),
            Err(ConfigError::Anchors(_))
        ));
    }

    #[test]
    fn test_rejects_collapsed_axis() {
        let anchors = MatAnchors {
            top_left: [89.0, 100.0],
            bottom_right: [283.0, 100.0],
        };
        assert!(matches!(
            CoordinateMapper::new(anchors, [300.0, 300.0]),
            Err(ConfigError::Anchors(_))
        ));
    }
}
