//! Metafile space to canvas space coordinate mapping
//!
//! Metafile coordinates grow downwards and the picture box excludes its
//! right and bottom edges. The canvas is bottom-up, so y is always flipped
//! around `bottom - 1`. When scaling is active the picture box is stretched
//! onto the requested viewport.

use crate::record::Rect;

/// Target area on the canvas, inclusive on all four sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
}

impl Viewport {
    pub fn new(xmin: i32, xmax: i32, ymin: i32, ymax: i32) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    /// Viewport covering `width` x `height` canvas units from the origin
    pub fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, width - 1, 0, height - 1)
    }

    pub fn width(&self) -> i64 {
        self.xmax as i64 - self.xmin as i64 + 1
    }

    pub fn height(&self) -> i64 {
        self.ymax as i64 - self.ymin as i64 + 1
    }

    /// A viewport wider and taller than one unit requests scaling
    pub fn is_scalable(&self) -> bool {
        self.width() > 1 && self.height() > 1
    }
}

/// Coordinate mapper
///
/// Pure: every method depends only on the values fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    factor_x: f64,
    /// Negative, the source is top-down
    factor_y: f64,
    xmin: i32,
    ymin: i32,
    left: i32,
    bottom: i32,
    scale: bool,
}

impl Mapping {
    /// Unscaled mapping: x unchanged, y flipped inside `picture`
    pub fn unscaled(picture: Rect) -> Self {
        Self {
            factor_x: 1.0,
            factor_y: -1.0,
            xmin: 0,
            ymin: 0,
            left: picture.left,
            bottom: picture.bottom,
            scale: false,
        }
    }

    /// Map `picture` onto `viewport`
    ///
    /// Scaling stays off when the picture box is not wider and taller than
    /// one unit, or when no usable viewport is given.
    pub fn new(picture: Rect, viewport: Option<Viewport>) -> Self {
        let w = picture.right as i64 - picture.left as i64;
        let h = picture.bottom as i64 - picture.top as i64;

        match viewport {
            Some(vp) if w > 1 && h > 1 && vp.is_scalable() => Self {
                factor_x: vp.width() as f64 / w as f64,
                factor_y: vp.height() as f64 / -(h as f64),
                xmin: vp.xmin,
                ymin: vp.ymin,
                left: picture.left,
                bottom: picture.bottom,
                scale: true,
            },
            _ => Self::unscaled(picture),
        }
    }

    pub fn is_scaling(&self) -> bool {
        self.scale
    }

    pub fn factors(&self) -> (f64, f64) {
        (self.factor_x, self.factor_y)
    }

    pub fn x(&self, x: i32) -> i32 {
        if self.scale {
            round_i32((x as f64 - self.left as f64) * self.factor_x + self.xmin as f64)
        } else {
            x
        }
    }

    pub fn y(&self, y: i32) -> i32 {
        let flip = self.bottom as f64 - 1.0;
        if self.scale {
            round_i32((y as f64 - flip) * self.factor_y + self.ymin as f64)
        } else {
            round_i32(flip - y as f64)
        }
    }

    /// Horizontal extent, never below one unit
    pub fn w(&self, w: i32) -> i32 {
        let v = if self.scale {
            round_i32(w as f64 * self.factor_x)
        } else {
            w
        };
        v.max(1)
    }

    /// Vertical extent, never below one unit
    pub fn h(&self, h: i32) -> i32 {
        let v = if self.scale {
            round_i32(h as f64 * self.factor_y.abs())
        } else {
            h
        };
        v.max(1)
    }
}

/// Round half away from zero, saturating at the i32 range
fn round_i32(v: f64) -> i32 {
    v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture(left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect { left, top, right, bottom }
    }

    #[test]
    fn test_unscaled_flip() {
        let m = Mapping::unscaled(picture(0, 0, 100, 50));
        assert!(!m.is_scaling());
        assert_eq!(m.x(17), 17);
        assert_eq!(m.y(0), 49);
        assert_eq!(m.y(49), 0);
        assert_eq!(m.y(10), 39);
    }

    #[test]
    fn test_unscaled_flip_twice_is_identity() {
        let m = Mapping::unscaled(picture(-30, -20, 300, 200));
        for v in [-5000, -1, 0, 1, 7, 199, 200, 12345] {
            assert_eq!(m.y(m.y(v)), v);
            assert_eq!(m.x(m.x(v)), v);
        }
    }

    #[test]
    fn test_scaled_corners() {
        // 100 x 50 picture onto a 200 x 100 viewport at (10, 20)
        let m = Mapping::new(picture(0, 0, 100, 50), Some(Viewport::new(10, 209, 20, 119)));
        assert!(m.is_scaling());
        assert_eq!(m.factors(), (2.0, -2.0));
        assert_eq!(m.x(0), 10);
        assert_eq!(m.x(100), 210);
        // bottom-1 maps to ymin, top maps near ymax
        assert_eq!(m.y(49), 20);
        assert_eq!(m.y(0), 118);
        assert_eq!(m.w(10), 20);
        assert_eq!(m.h(10), 20);
    }

    #[test]
    fn test_extent_floor_is_one() {
        let m = Mapping::new(picture(0, 0, 1000, 1000), Some(Viewport::new(0, 9, 0, 9)));
        assert_eq!(m.w(20), 1);
        assert_eq!(m.h(0), 1);
        let u = Mapping::unscaled(picture(0, 0, 10, 10));
        assert_eq!(u.w(0), 1);
        assert_eq!(u.h(-4), 1);
    }

    #[test]
    fn test_degenerate_inputs_disable_scaling() {
        let vp = Some(Viewport::new(0, 99, 0, 99));
        assert!(!Mapping::new(picture(0, 0, 0, 0), vp).is_scaling());
        assert!(!Mapping::new(picture(0, 0, 1, 100), vp).is_scaling());
        assert!(!Mapping::new(picture(0, 0, 100, 100), Some(Viewport::new(0, 0, 0, 99))).is_scaling());
        assert!(!Mapping::new(picture(0, 0, 100, 100), None).is_scaling());
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let m = Mapping::new(picture(0, 0, 4, 4), Some(Viewport::new(0, 9, 0, 9)));
        // factor 2.5
        assert_eq!(m.x(1), 3);
        assert_eq!(m.x(-1), -3);
    }
}
