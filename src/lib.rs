#![warn(clippy::all)]
#![warn(missing_docs)]
/*!

Utilities for cutting sprites out of [Aseprite](https://www.aseprite.org/)
files using their slices. This library directly reads the binary Aseprite
files ([file format specification][spec]), decodes the slice chunks and turns
them into named rectangles you can hand to your sprite sheet or atlas
pipeline.

[spec]: https://github.com/aseprite/aseprite/blob/master/docs/ase-file-specs.md

# Basic Usage

## Load file

```no_run
use aseslice::SliceFile;
# use std::path::Path;
# let path = Path::new("./tests/data/slices.aseprite");
let ase = SliceFile::read_file(&path).unwrap();

println!("Size: {}x{}", ase.width(), ase.height());
for slice in ase.slices() {
    println!("{}: {} key(s)", slice.name(), slice.keys().len());
}
```

## Keys

A slice can change its geometry over the course of the animation. Each
[SliceKey] applies from its start frame until the next key. Use
[Slice::key_at] to find the key for a given frame:

```no_run
# use aseslice::SliceFile;
# let ase = SliceFile::read_file(std::path::Path::new("x.aseprite")).unwrap();
let slice = ase.slice_by_name("door").unwrap();
let key = slice.key_at(3);
println!("Frame 3: {:?}", key.bounds());
```

## Cut an image

Slices are stored with the origin in the top-left corner. Most sprite tools
expect the origin in the bottom-left corner, which is the default of
[SliceConfig]. Pass the flattened image of the file to
[SliceFile::decompose]:

```no_run
use aseslice::{EmptyTilePolicy, SliceConfig, SliceFile};
# let ase = SliceFile::read_file(std::path::Path::new("x.aseprite")).unwrap();
# let image = image::RgbaImage::new(ase.width() as u32, ase.height() as u32);
let config = SliceConfig {
    empty_tiles: EmptyTilePolicy::Remove,
    ..SliceConfig::default()
};
for region in ase.decompose("hero", 0, &image, &config) {
    println!("{} {:?} pivot {:?}", region.name(), region.rect(), region.pivot());
}
```

Regions never extend past the image. Regions that only contain transparent
pixels are dropped when [EmptyTilePolicy::Remove] is set.

## Chunk streams

If you already have a stream of chunks without the file and frame headers,
[ChunkFramer] splits it up and [Chunk::decode] interprets each chunk.

*/

pub(crate) mod atlas;
pub(crate) mod chunk;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod file;
pub(crate) mod geometry;
pub(crate) mod parse;
pub(crate) mod reader;
pub(crate) mod slice;
#[cfg(test)]
mod tests;

/// A specialized `Result` type for Aseprite parsing functions.
pub type Result<T> = std::result::Result<T, AsepriteParseError>;

pub use atlas::{clamp_to_raster, decompose, is_region_empty, region_name, Raster};
pub use chunk::{Chunk, ChunkFramer, ChunkKind, RawChunk};
pub use config::{EmptyTilePolicy, OriginConvention, SliceConfig, TransparencyMode};
pub use error::{AsepriteParseError, ChunkLocation};
pub use file::SliceFile;
pub use geometry::{
    normalize_pivot, resolve_key_geometry, resolve_slice, to_output_space, Border, Pivot, Point,
    Rect, ResolvedSlice,
};
pub use slice::{resolve_key, Slice, SliceFlags, SliceKey};
