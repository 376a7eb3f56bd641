use crate::config::{OriginConvention, SliceConfig};
use crate::slice::{Slice, SliceKey};
use std::convert::TryFrom;

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    #[allow(missing_docs)]
    pub x: i32,
    #[allow(missing_docs)]
    pub y: i32,
    #[allow(missing_docs)]
    pub width: u32,
    #[allow(missing_docs)]
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    #[allow(missing_docs)]
    pub x: i32,
    #[allow(missing_docs)]
    pub y: i32,
}

/// A pivot relative to the size of a rectangle. `(0, 0)` and `(1, 1)` are
/// opposite corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pivot {
    #[allow(missing_docs)]
    pub x: f32,
    #[allow(missing_docs)]
    pub y: f32,
}

impl Pivot {
    /// The center of the rectangle.
    pub const CENTER: Pivot = Pivot { x: 0.5, y: 0.5 };

    /// Create a new pivot.
    pub fn new(x: f32, y: f32) -> Self {
        Pivot { x, y }
    }
}

/// Distances from each edge of a 9-patch slice to its center rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Border {
    #[allow(missing_docs)]
    pub left: u32,
    #[allow(missing_docs)]
    pub bottom: u32,
    #[allow(missing_docs)]
    pub right: u32,
    #[allow(missing_docs)]
    pub top: u32,
}

/// A slice resolved for one frame, in the consumer's coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlice {
    name: String,
    rect: Rect,
    pivot: Pivot,
    has_pivot_info: bool,
    center: Option<Rect>,
    border: Option<Border>,
}

impl ResolvedSlice {
    /// Name of the sprite region.
    ///
    /// Before decomposition this is the slice's own name. Afterwards it is
    /// prefixed with the source name, see [crate::decompose].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The region in output space.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Normalized pivot. This is the configured default pivot if the slice
    /// carries no pivot information.
    pub fn pivot(&self) -> Pivot {
        self.pivot
    }

    /// Returns `true` if [ResolvedSlice::pivot] came from the slice itself.
    pub fn has_pivot_info(&self) -> bool {
        self.has_pivot_info
    }

    /// Returns `true` if this is a 9-patch slice.
    pub fn has_center_info(&self) -> bool {
        self.center.is_some()
    }

    /// The 9-patch center rectangle in output space, relative to the origin
    /// of [ResolvedSlice::rect].
    pub fn center_rect(&self) -> Option<Rect> {
        self.center
    }

    /// Insets of the 9-patch center rectangle from the edges of the
    /// authored slice.
    pub fn border(&self) -> Option<Border> {
        self.border
    }

    pub(crate) fn with_name(self, name: String) -> Self {
        ResolvedSlice { name, ..self }
    }

    pub(crate) fn with_rect(self, rect: Rect) -> Self {
        ResolvedSlice { rect, ..self }
    }
}

pub(crate) fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

fn saturate_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Move `rect` from document space into the output coordinate system of a
/// raster `raster_height` pixels high. No clamping happens here.
pub fn to_output_space(rect: Rect, raster_height: u32, origin: OriginConvention) -> Rect {
    match origin {
        OriginConvention::TopLeft => rect,
        OriginConvention::BottomLeft => Rect {
            y: saturate_i32(raster_height as i64 - rect.y as i64 - rect.height as i64),
            ..rect
        },
    }
}

/// Normalize a pivot given in pixels relative to a `width` x `height`
/// rectangle.
///
/// Returns `None` for zero-sized rectangles. Pivots outside the rectangle
/// produce values outside `[0, 1]`.
pub fn normalize_pivot(
    pivot: Point,
    width: u32,
    height: u32,
    origin: OriginConvention,
) -> Option<Pivot> {
    if width == 0 || height == 0 {
        return None;
    }
    let x = pivot.x as f32 / width as f32;
    let y = pivot.y as f32 / height as f32;
    Some(match origin {
        OriginConvention::TopLeft => Pivot { x, y },
        OriginConvention::BottomLeft => Pivot { x, y: 1.0 - y },
    })
}

fn border_of(bounds: Rect, center: Rect) -> Border {
    let (cx, cy) = (center.x as i64, center.y as i64);
    Border {
        left: saturate_u32(cx),
        top: saturate_u32(cy),
        right: saturate_u32(bounds.width as i64 - cx - center.width as i64),
        bottom: saturate_u32(bounds.height as i64 - cy - center.height as i64),
    }
}

/// Resolve a single key of a slice named `name` against a raster of
/// `raster_size` pixels.
pub fn resolve_key_geometry(
    name: &str,
    key: &SliceKey,
    raster_size: (u32, u32),
    config: &SliceConfig,
) -> ResolvedSlice {
    let bounds = key.bounds();
    let rect = to_output_space(bounds, raster_size.1, config.origin);

    let pivot = key
        .pivot()
        .and_then(|p| normalize_pivot(p, bounds.width, bounds.height, config.origin));

    // Center rects are relative to the slice, so they flip inside it.
    let center = key
        .center()
        .map(|c| to_output_space(c, bounds.height, config.origin));

    ResolvedSlice {
        name: name.to_owned(),
        rect,
        pivot: pivot.unwrap_or(config.default_pivot),
        has_pivot_info: pivot.is_some(),
        center,
        border: key.center().map(|c| border_of(bounds, c)),
    }
}

/// Resolve `slice` at animation frame `frame`.
pub fn resolve_slice(
    slice: &Slice,
    frame: u32,
    raster_size: (u32, u32),
    config: &SliceConfig,
) -> ResolvedSlice {
    resolve_key_geometry(slice.name(), slice.key_at(frame), raster_size, config)
}

#[cfg(test)]
fn bottom_left() -> SliceConfig {
    SliceConfig::default()
}

#[test]
fn bottom_left_flips_y() {
    let rect = to_output_space(Rect::new(0, 0, 10, 10), 64, OriginConvention::BottomLeft);
    assert_eq!(rect, Rect::new(0, 54, 10, 10));
    let rect = to_output_space(Rect::new(3, 50, 4, 14), 64, OriginConvention::BottomLeft);
    assert_eq!(rect, Rect::new(3, 0, 4, 14));
    let rect = to_output_space(Rect::new(3, 50, 4, 14), 64, OriginConvention::TopLeft);
    assert_eq!(rect, Rect::new(3, 50, 4, 14));
}

#[test]
fn rects_partially_outside_are_not_clamped() {
    let rect = to_output_space(Rect::new(-4, 60, 10, 10), 64, OriginConvention::BottomLeft);
    assert_eq!(rect, Rect::new(-4, -6, 10, 10));
}

#[test]
fn pivot_is_normalized() {
    let p = normalize_pivot(Point { x: 5, y: 5 }, 10, 10, OriginConvention::BottomLeft);
    assert_eq!(p, Some(Pivot::new(0.5, 0.5)));
    let p = normalize_pivot(Point { x: 2, y: 1 }, 8, 4, OriginConvention::BottomLeft);
    assert_eq!(p, Some(Pivot::new(0.25, 0.75)));
    let p = normalize_pivot(Point { x: 2, y: 1 }, 8, 4, OriginConvention::TopLeft);
    assert_eq!(p, Some(Pivot::new(0.25, 0.25)));
    assert_eq!(
        normalize_pivot(Point { x: 1, y: 1 }, 0, 4, OriginConvention::TopLeft),
        None
    );
}

#[test]
fn missing_pivot_uses_default() {
    let config = SliceConfig {
        default_pivot: Pivot::new(0.0, 1.0),
        ..bottom_left()
    };
    let key = SliceKey::new(0, Rect::new(0, 0, 4, 4));
    let resolved = resolve_key_geometry("a", &key, (16, 16), &config);
    assert_eq!(resolved.pivot(), Pivot::new(0.0, 1.0));
    assert!(!resolved.has_pivot_info());

    let degenerate = SliceKey::new(0, Rect::new(0, 0, 0, 4)).with_pivot(Point { x: 1, y: 1 });
    let resolved = resolve_key_geometry("b", &degenerate, (16, 16), &config);
    assert_eq!(resolved.pivot(), Pivot::new(0.0, 1.0));
}

#[test]
fn center_rect_flips_within_slice() {
    let key = SliceKey::new(0, Rect::new(2, 2, 10, 8)).with_center(Rect::new(3, 1, 4, 5));
    let resolved = resolve_key_geometry("panel", &key, (32, 32), &bottom_left());
    assert_eq!(resolved.rect(), Rect::new(2, 22, 10, 8));
    assert!(resolved.has_center_info());
    assert_eq!(resolved.center_rect(), Some(Rect::new(3, 2, 4, 5)));
    assert_eq!(
        resolved.border(),
        Some(Border {
            left: 3,
            bottom: 2,
            right: 3,
            top: 1,
        })
    );
}
