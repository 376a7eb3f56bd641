use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use crate::atlas::{self, Raster};
use crate::geometry::{self, ResolvedSlice};
use crate::{parse, Result, Slice, SliceConfig};

/// The slices of a parsed Aseprite file, together with the document
/// properties needed to place them.
#[derive(Debug, Clone)]
pub struct SliceFile {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) num_frames: u16,
    pub(crate) color_depth: u16,
    pub(crate) frame_times: Vec<u16>,
    pub(crate) slices: Vec<Slice>,
}

impl SliceFile {
    /// Load Aseprite file. Loads full file into memory.
    pub fn read_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        parse::read_slices(reader)
    }

    /// Load Aseprite file from any input that implements `std::io::Read`.
    ///
    /// You can use this to read from an in-memory file.
    pub fn read<R: Read>(input: R) -> Result<SliceFile> {
        parse::read_slices(input)
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height as usize
    }

    /// Width and height in pixels.
    pub fn size(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// Number of animation frames.
    pub fn num_frames(&self) -> u32 {
        self.num_frames as u32
    }

    /// Bits per pixel of the source image (8, 16 or 32).
    pub fn color_depth(&self) -> u16 {
        self.color_depth
    }

    /// Duration of a frame in milliseconds.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not less than `num_frames`.
    pub fn frame_duration(&self, frame: u32) -> u32 {
        self.frame_times[frame as usize] as u32
    }

    /// All [Slice]s in the file, in the order they appear.
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Lookup slice by name.
    ///
    /// If multiple slices with the same name exist, returns the first one.
    pub fn slice_by_name(&self, name: &str) -> Option<&Slice> {
        self.slices.iter().find(|s| s.name() == name)
    }

    /// Resolve every slice at animation frame `frame` against the document
    /// size. Rects are neither clamped nor filtered.
    pub fn resolve(&self, frame: u32, config: &SliceConfig) -> Vec<ResolvedSlice> {
        let size = (self.width as u32, self.height as u32);
        self.resolve_for(frame, size, config)
    }

    fn resolve_for(
        &self,
        frame: u32,
        raster_size: (u32, u32),
        config: &SliceConfig,
    ) -> Vec<ResolvedSlice> {
        self.slices
            .iter()
            .map(|slice| geometry::resolve_slice(slice, frame, raster_size, config))
            .collect()
    }

    /// Cut `raster` into named regions, one per slice, using the slice keys
    /// in effect at `frame`.
    ///
    /// Regions are named `<source_name>_<slice name>`. See
    /// [crate::decompose] for clamping and empty region handling.
    pub fn decompose<R: Raster + ?Sized>(
        &self,
        source_name: &str,
        frame: u32,
        raster: &R,
        config: &SliceConfig,
    ) -> Vec<ResolvedSlice> {
        let candidates = self.resolve_for(frame, raster.dimensions(), config);
        atlas::decompose(source_name, candidates, raster, config)
    }

    /// Like [SliceFile::decompose], for the separated image of a single
    /// layer. Region names become `<source_name>_<slice name>_<layer_name>`.
    pub fn decompose_layer<R: Raster + ?Sized>(
        &self,
        source_name: &str,
        layer_name: &str,
        frame: u32,
        raster: &R,
        config: &SliceConfig,
    ) -> Vec<ResolvedSlice> {
        let layer_source = format!("{}_{}", source_name, layer_name);
        self.decompose(&layer_source, frame, raster, &config.for_layer(layer_name))
    }
}
