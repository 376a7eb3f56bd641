use crate::geometry::Pivot;

/// What to do with slices that contain only transparent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyTilePolicy {
    /// Keep every slice.
    Keep,
    /// Drop slices whose pixels are all transparent.
    Remove,
}

/// Where the consumer places the origin of its coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginConvention {
    /// Origin at the top-left corner, y pointing down. This is how Aseprite
    /// stores slices.
    TopLeft,
    /// Origin at the bottom-left corner, y pointing up. Most sprite cutting
    /// tools expect this.
    BottomLeft,
}

/// How to decide whether a pixel is transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparencyMode {
    /// A pixel is transparent if its alpha is zero.
    Alpha,
    /// Like `Alpha`, but pixels exactly matching the given RGBA color are
    /// treated as transparent as well.
    Mask([u8; 4]),
}

impl TransparencyMode {
    pub(crate) fn is_transparent(&self, pixel: [u8; 4]) -> bool {
        match self {
            TransparencyMode::Alpha => pixel[3] == 0,
            TransparencyMode::Mask(color) => pixel[3] == 0 || pixel == *color,
        }
    }
}

/// Settings for turning slices into sprite regions.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceConfig {
    /// Whether fully transparent slices are dropped.
    pub empty_tiles: EmptyTilePolicy,
    /// Coordinate system of the resulting rectangles.
    pub origin: OriginConvention,
    /// Pivot used for slices without pivot information.
    pub default_pivot: Pivot,
    /// Suffix kept at the end of every slice name. Used when cutting the
    /// image of a single separated layer.
    pub layer_suffix: Option<String>,
    /// How transparent pixels are detected.
    pub transparency: TransparencyMode,
}

impl Default for SliceConfig {
    fn default() -> Self {
        SliceConfig {
            empty_tiles: EmptyTilePolicy::Keep,
            origin: OriginConvention::BottomLeft,
            default_pivot: Pivot::CENTER,
            layer_suffix: None,
            transparency: TransparencyMode::Alpha,
        }
    }
}

impl SliceConfig {
    /// The configuration for cutting the separated image of layer
    /// `layer_name`. Slice names will end in `_<layer_name>`.
    pub fn for_layer(&self, layer_name: &str) -> SliceConfig {
        SliceConfig {
            layer_suffix: Some(format!("_{}", layer_name)),
            ..self.clone()
        }
    }
}

#[test]
fn mask_mode_treats_mask_color_as_transparent() {
    let magenta = [255, 0, 255, 255];
    let mode = TransparencyMode::Mask(magenta);
    assert!(mode.is_transparent(magenta));
    assert!(mode.is_transparent([10, 20, 30, 0]));
    assert!(!mode.is_transparent([255, 0, 254, 255]));
    assert!(!TransparencyMode::Alpha.is_transparent(magenta));
}

#[test]
fn layer_config_sets_suffix_only() {
    let base = SliceConfig {
        empty_tiles: EmptyTilePolicy::Remove,
        ..SliceConfig::default()
    };
    let layer = base.for_layer("Shadow");
    assert_eq!(layer.layer_suffix.as_deref(), Some("_Shadow"));
    assert_eq!(layer.empty_tiles, EmptyTilePolicy::Remove);
    assert_eq!(layer.origin, OriginConvention::BottomLeft);
}
