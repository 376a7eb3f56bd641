//
// Cuts the flattened image of an Aseprite file into its slices and repacks
// them into a new texture atlas.
//
// Usage: slices <file.aseprite> <flattened.png> [frame]
//
// The flattened image must be exported separately (e.g. with
// `aseprite -b file.aseprite --save-as flattened.png`). Empty slices are
// dropped. Set RUST_LOG=debug to see which ones.
//
use aseslice::{EmptyTilePolicy, OriginConvention, Rect as SliceRect, SliceConfig, SliceFile};
use image::{ImageFormat, RgbaImage};
use rect_packer::{Config, Packer, Rect};
use std::path::Path;

#[allow(unused)]
#[derive(Debug, Clone)]
pub struct SpriteInfo {
    name: String,
    source: SliceRect,
    location: Rect,
    pivot: (f32, f32),
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <file.aseprite> <flattened.png> [frame]", args[0]);
        std::process::exit(2);
    }
    let ase_path = Path::new(&args[1]);
    let frame: u32 = args.get(3).and_then(|f| f.parse().ok()).unwrap_or(0);

    let ase = SliceFile::read_file(ase_path).unwrap();
    let image = image::open(&args[2]).unwrap().to_rgba8();
    assert_eq!(
        (image.width() as usize, image.height() as usize),
        ase.size(),
        "Image size does not match the Aseprite file"
    );

    // Cut with the origin in the top-left corner, that is how `image`
    // addresses pixels.
    let config = SliceConfig {
        empty_tiles: EmptyTilePolicy::Remove,
        origin: OriginConvention::TopLeft,
        ..SliceConfig::default()
    };
    let source_name = ase_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sprite");
    let regions = ase.decompose(source_name, frame, &image, &config);

    let mut packer = Packer::new(Config {
        width: 256,
        height: 256,
        border_padding: 0,
        rectangle_padding: 1,
    });

    let mut sprites: Vec<SpriteInfo> = Vec::new();
    for region in &regions {
        let source = region.rect();
        if source.is_empty() {
            continue;
        }
        if let Some(location) = packer.pack(source.width as i32, source.height as i32, false) {
            let pivot = region.pivot();
            sprites.push(SpriteInfo {
                name: region.name().to_owned(),
                source,
                location,
                pivot: (pivot.x, pivot.y),
            });
        } else {
            panic!("Could not place {}", region.name());
        }
    }

    // Compute output size
    let (out_width, out_height) = sprites.iter().fold((1, 1), |(w, h), s| {
        (w.max(s.location.right()), h.max(s.location.bottom()))
    });

    // Build the final image
    let mut output = RgbaImage::new(out_width as u32, out_height as u32);
    for sprite in &sprites {
        let SliceRect {
            x,
            y,
            width,
            height,
        } = sprite.source;
        let cut = image::imageops::crop_imm(&image, x as u32, y as u32, width, height).to_image();
        image::imageops::replace(
            &mut output,
            &cut,
            sprite.location.x as u32,
            sprite.location.y as u32,
        );
    }
    let output_file = ase_path.with_extension("atlas.png");
    output
        .save_with_format(&output_file, ImageFormat::Png)
        .unwrap();

    // Write sprite info. In a real use case should be serialized as json or similar.
    println!("{:#?}", sprites);
}
