use crate::config::{EmptyTilePolicy, OriginConvention, SliceConfig, TransparencyMode};
use crate::geometry::{saturate_i32, Rect, ResolvedSlice};
use image::RgbaImage;
use log::{debug, warn};

/// Read access to the pixels of the image that slices are cut from.
///
/// Coordinates are in image space: `(0, 0)` is the top-left pixel.
pub trait Raster {
    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);
    /// RGBA value of a pixel. Only called with coordinates inside
    /// [Raster::dimensions].
    fn pixel(&self, x: u32, y: u32) -> [u8; 4];
}

impl Raster for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

impl<T: Raster + ?Sized> Raster for &T {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        (**self).pixel(x, y)
    }
}

fn clamp_span(start: i32, len: u32, limit: u32) -> (i32, u32) {
    let limit = limit as i64;
    let lo = (start as i64).max(0).min(limit);
    let hi = (start as i64 + len as i64).max(lo).min(limit);
    (saturate_i32(lo), (hi - lo) as u32)
}

/// Shrink `rect` so that it lies within a raster of `size` pixels. Parts
/// outside the raster are cut off; a rect entirely outside ends up empty.
///
/// The clamping is symmetric, so it works the same for both origin
/// conventions.
pub fn clamp_to_raster(rect: Rect, size: (u32, u32)) -> Rect {
    let (x, width) = clamp_span(rect.x, rect.width, size.0);
    let (y, height) = clamp_span(rect.y, rect.height, size.1);
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Returns `true` if every pixel of `rect` is transparent.
///
/// `rect` is given in the output coordinate system described by `origin`.
/// Parts outside the raster are ignored. Empty rects count as empty.
pub fn is_region_empty<R: Raster + ?Sized>(
    raster: &R,
    rect: Rect,
    origin: OriginConvention,
    transparency: TransparencyMode,
) -> bool {
    let size = raster.dimensions();
    let rect = clamp_to_raster(rect, size);
    let raster_height = size.1;
    let x0 = rect.x as u32;
    let top = match origin {
        OriginConvention::TopLeft => rect.y as u32,
        OriginConvention::BottomLeft => raster_height - rect.y as u32 - rect.height,
    };
    (top..top + rect.height)
        .all(|y| (x0..x0 + rect.width).all(|x| transparency.is_transparent(raster.pixel(x, y))))
}

/// Compose the final name of a sprite region.
///
/// The result is `<source_name>_<slice_name>`. If a non-empty `suffix` is
/// given, all occurrences of it are removed and it is appended once at the
/// end, so that every region cut from a separated layer image ends in the
/// same suffix.
pub fn region_name(source_name: &str, slice_name: &str, suffix: Option<&str>) -> String {
    let name = format!("{}_{}", source_name, slice_name);
    match suffix {
        Some(suffix) if !suffix.is_empty() => {
            let mut name = name.replace(suffix, "");
            name.push_str(suffix);
            name
        }
        _ => name,
    }
}

/// Turn resolved slices into the final list of named sprite regions of
/// `raster`.
///
/// Every rect is clamped to the raster. With [EmptyTilePolicy::Remove],
/// regions without a single visible pixel are dropped. The order of the
/// remaining regions matches the order of `candidates`.
pub fn decompose<R, I>(
    source_name: &str,
    candidates: I,
    raster: &R,
    config: &SliceConfig,
) -> Vec<ResolvedSlice>
where
    R: Raster + ?Sized,
    I: IntoIterator<Item = ResolvedSlice>,
{
    let size = raster.dimensions();
    let suffix = config.layer_suffix.as_deref();
    let mut regions = Vec::new();

    for candidate in candidates {
        let original = candidate.rect();
        let rect = clamp_to_raster(original, size);
        if rect.is_empty() && !original.is_empty() {
            warn!(
                "Slice '{}' at {:?} lies outside the {}x{} image",
                candidate.name(),
                original,
                size.0,
                size.1
            );
        }
        if config.empty_tiles == EmptyTilePolicy::Remove
            && is_region_empty(raster, rect, config.origin, config.transparency)
        {
            debug!("Removing empty slice '{}'", candidate.name());
            continue;
        }
        let name = region_name(source_name, candidate.name(), suffix);
        regions.push(candidate.with_rect(rect).with_name(name));
    }

    regions
}

#[cfg(test)]
fn candidate(name: &str, bounds: Rect, raster: &RgbaImage, config: &SliceConfig) -> ResolvedSlice {
    let key = crate::slice::SliceKey::new(0, bounds);
    crate::geometry::resolve_key_geometry(name, &key, raster.dimensions(), config)
}

#[test]
fn clamps_width_at_right_edge() {
    assert_eq!(
        clamp_to_raster(Rect::new(60, 0, 20, 10), (64, 64)),
        Rect::new(60, 0, 4, 10)
    );
    assert_eq!(
        clamp_to_raster(Rect::new(0, 60, 8, 8), (64, 64)),
        Rect::new(0, 60, 8, 4)
    );
}

#[test]
fn clamps_negative_origin() {
    assert_eq!(
        clamp_to_raster(Rect::new(-3, -1, 10, 4), (64, 64)),
        Rect::new(0, 0, 7, 3)
    );
    assert!(clamp_to_raster(Rect::new(70, 0, 5, 5), (64, 64)).is_empty());
    assert!(clamp_to_raster(Rect::new(-20, 0, 5, 5), (64, 64)).is_empty());
}

#[test]
fn region_names() {
    assert_eq!(region_name("hero", "head", None), "hero_head");
    assert_eq!(
        region_name("hero_Shadow", "head", Some("_Shadow")),
        "hero_head_Shadow"
    );
    assert_eq!(region_name("hero", "head", Some("")), "hero_head");
}

#[test]
fn empty_regions_follow_policy() {
    let mut raster = RgbaImage::new(16, 16);
    // One opaque pixel near the top-left corner.
    raster.put_pixel(1, 1, image::Rgba([255, 0, 0, 255]));

    let mut config = SliceConfig {
        origin: OriginConvention::TopLeft,
        ..SliceConfig::default()
    };
    let candidates = vec![
        candidate("filled", Rect::new(0, 0, 4, 4), &raster, &config),
        candidate("blank", Rect::new(8, 8, 4, 4), &raster, &config),
    ];

    let kept = decompose("img", candidates.clone(), &raster, &config);
    let names: Vec<&str> = kept.iter().map(ResolvedSlice::name).collect();
    assert_eq!(names, vec!["img_filled", "img_blank"]);

    config.empty_tiles = EmptyTilePolicy::Remove;
    let kept = decompose("img", candidates, &raster, &config);
    let names: Vec<&str> = kept.iter().map(ResolvedSlice::name).collect();
    assert_eq!(names, vec!["img_filled"]);
}

#[test]
fn bottom_left_samples_matching_rows() {
    let mut raster = RgbaImage::new(8, 8);
    // Opaque pixel in the top row of the image.
    raster.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
    let config = SliceConfig {
        empty_tiles: EmptyTilePolicy::Remove,
        ..SliceConfig::default()
    };
    let top = candidate("top", Rect::new(0, 0, 2, 2), &raster, &config);
    let bottom = candidate("bottom", Rect::new(0, 6, 2, 2), &raster, &config);
    assert_eq!(top.rect(), Rect::new(0, 6, 2, 2));

    let kept = decompose("img", vec![top, bottom], &raster, &config);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].name(), "img_top");
    assert_eq!(kept[0].rect(), Rect::new(0, 6, 2, 2));
}

#[test]
fn masked_color_counts_as_empty() {
    let key_color = [255, 0, 255, 255];
    let raster = RgbaImage::from_pixel(4, 4, image::Rgba(key_color));
    let mut config = SliceConfig {
        empty_tiles: EmptyTilePolicy::Remove,
        ..SliceConfig::default()
    };
    let whole = candidate("all", Rect::new(0, 0, 4, 4), &raster, &config);
    assert_eq!(decompose("img", vec![whole.clone()], &raster, &config).len(), 1);

    config.transparency = TransparencyMode::Mask(key_color);
    assert!(decompose("img", vec![whole], &raster, &config).is_empty());
}

#[test]
fn out_of_bounds_region_is_truncated_not_rejected() {
    let raster = RgbaImage::from_pixel(64, 64, image::Rgba([1, 2, 3, 255]));
    let config = SliceConfig {
        origin: OriginConvention::TopLeft,
        empty_tiles: EmptyTilePolicy::Remove,
        ..SliceConfig::default()
    };
    let wide = candidate("wide", Rect::new(60, 0, 20, 10), &raster, &config);
    let kept = decompose("img", vec![wide], &raster, &config);
    assert_eq!(kept[0].rect(), Rect::new(60, 0, 4, 10));
}

#[test]
fn zero_area_regions() {
    let raster = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]));
    let mut config = SliceConfig::default();
    let dot = candidate("dot", Rect::new(2, 2, 0, 0), &raster, &config);
    assert_eq!(decompose("img", vec![dot.clone()], &raster, &config).len(), 1);
    config.empty_tiles = EmptyTilePolicy::Remove;
    assert!(decompose("img", vec![dot], &raster, &config).is_empty());
}

#[test]
fn emptiness_check_clamps_its_rect() {
    let raster = RgbaImage::new(64, 64);
    let alpha = TransparencyMode::Alpha;
    assert!(is_region_empty(
        &raster,
        Rect::new(60, 0, 20, 10),
        OriginConvention::TopLeft,
        alpha
    ));
    assert!(is_region_empty(
        &raster,
        Rect::new(0, 60, 4, 10),
        OriginConvention::BottomLeft,
        alpha
    ));
    assert!(is_region_empty(
        &raster,
        Rect::new(-5, 100, 4, 4),
        OriginConvention::BottomLeft,
        alpha
    ));

    // Only the clamped part is sampled: (63, 63) is the bottom-right pixel.
    let mut raster = raster;
    raster.put_pixel(63, 63, image::Rgba([0, 0, 0, 255]));
    assert!(!is_region_empty(
        &raster,
        Rect::new(60, 60, 20, 20),
        OriginConvention::TopLeft,
        alpha
    ));
    assert!(!is_region_empty(
        &raster,
        Rect::new(60, -10, 20, 11),
        OriginConvention::BottomLeft,
        alpha
    ));
}
