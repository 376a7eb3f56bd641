use crate::*;
use byteorder::{LittleEndian, WriteBytesExt};
use image::{Rgba, RgbaImage};
use rand::Rng;

/// `(from_frame, (x, y, w, h), center, pivot)`
pub(crate) type KeySpec = (
    u32,
    (i32, i32, u32, u32),
    Option<(i32, i32, u32, u32)>,
    Option<(i32, i32)>,
);

/// Builds little-endian chunk streams and files for tests.
pub(crate) struct ChunkWriter;

impl ChunkWriter {
    pub(crate) fn chunk(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(body.len() as u32 + 6).unwrap();
        out.write_u16::<LittleEndian>(kind).unwrap();
        out.extend_from_slice(body);
        out
    }

    fn rect(out: &mut Vec<u8>, (x, y, w, h): (i32, i32, u32, u32)) {
        out.write_i32::<LittleEndian>(x).unwrap();
        out.write_i32::<LittleEndian>(y).unwrap();
        out.write_u32::<LittleEndian>(w).unwrap();
        out.write_u32::<LittleEndian>(h).unwrap();
    }

    // Writes whichever optional fields are present, regardless of flags.
    pub(crate) fn key(out: &mut Vec<u8>, key: &KeySpec) {
        let (from_frame, bounds, center, pivot) = *key;
        out.write_u32::<LittleEndian>(from_frame).unwrap();
        Self::rect(out, bounds);
        if let Some(center) = center {
            Self::rect(out, center);
        }
        if let Some((x, y)) = pivot {
            out.write_i32::<LittleEndian>(x).unwrap();
            out.write_i32::<LittleEndian>(y).unwrap();
        }
    }

    pub(crate) fn slice_body(flags: u32, name: &str, keys: &[KeySpec]) -> Vec<u8> {
        Self::slice_body_with_count(keys.len() as u32, flags, name.as_bytes(), keys)
    }

    pub(crate) fn slice_body_with_count(
        count: u32,
        flags: u32,
        name: &[u8],
        keys: &[KeySpec],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(flags).unwrap();
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.extend_from_slice(name);
        for key in keys {
            Self::key(&mut out, key);
        }
        out
    }

    pub(crate) fn slice_chunk(flags: u32, name: &str, keys: &[KeySpec]) -> Vec<u8> {
        Self::chunk(0x2022, &Self::slice_body(flags, name, keys))
    }

    /// A complete file. Each frame is a list of encoded chunks.
    pub(crate) fn file(width: u16, height: u16, frames: &[Vec<Vec<u8>>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (idx, chunks) in frames.iter().enumerate() {
            let payload: Vec<u8> = chunks.concat();
            body.write_u32::<LittleEndian>(payload.len() as u32 + 16)
                .unwrap();
            body.write_u16::<LittleEndian>(0xF1FA).unwrap();
            body.write_u16::<LittleEndian>(chunks.len() as u16).unwrap();
            body.write_u16::<LittleEndian>(100 + idx as u16).unwrap();
            body.write_u16::<LittleEndian>(0).unwrap();
            body.write_u32::<LittleEndian>(chunks.len() as u32).unwrap();
            body.extend(payload);
        }

        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(body.len() as u32 + 128).unwrap();
        out.write_u16::<LittleEndian>(0xA5E0).unwrap();
        out.write_u16::<LittleEndian>(frames.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(width).unwrap();
        out.write_u16::<LittleEndian>(height).unwrap();
        out.write_u16::<LittleEndian>(32).unwrap();
        out.write_u32::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(100).unwrap();
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&[0; 4]); // transparent index + ignored
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(&[1, 1]); // pixel ratio
        out.extend_from_slice(&[0; 8]); // grid
        out.extend_from_slice(&[0; 84]);
        assert_eq!(out.len(), 128);
        out.extend(body);
        out
    }
}

fn decode_slice(chunk: &[u8]) -> Result<Slice> {
    let chunks = ChunkFramer::new(chunk).decode_all()?;
    match chunks.into_iter().next() {
        Some(Chunk::Slice(slice)) => Ok(slice),
        other => panic!("expected a slice chunk, got {:?}", other),
    }
}

fn random_key<R: Rng>(rng: &mut R, from_frame: u32, flags: u32) -> KeySpec {
    let mut rect = || -> (i32, i32, u32, u32) { (rng.gen(), rng.gen(), rng.gen(), rng.gen()) };
    let bounds = rect();
    let center = if flags & 1 != 0 { Some(rect()) } else { None };
    let pivot = if flags & 2 != 0 {
        Some((rng.gen(), rng.gen()))
    } else {
        None
    };
    (from_frame, bounds, center, pivot)
}

fn expected_key(fields: &KeySpec) -> SliceKey {
    let (from_frame, (x, y, w, h), center, pivot) = *fields;
    let mut key = SliceKey::new(from_frame, Rect::new(x, y, w, h));
    if let Some((x, y, w, h)) = center {
        key = key.with_center(Rect::new(x, y, w, h));
    }
    if let Some((x, y)) = pivot {
        key = key.with_pivot(Point { x, y });
    }
    key
}

#[test]
fn optional_fields_follow_flags() {
    let mut rng = rand::thread_rng();
    for flags in 0..4_u32 {
        let count = rng.gen_range(1..8);
        let specs: Vec<KeySpec> = (0..count)
            .map(|frame| random_key(&mut rng, frame * 2, flags))
            .collect();
        let slice = decode_slice(&ChunkWriter::slice_chunk(flags, "s", &specs)).unwrap();

        assert_eq!(slice.keys().len(), count as usize);
        for key in slice.keys() {
            assert_eq!(key.center().is_some(), flags & 1 != 0);
            assert_eq!(key.pivot().is_some(), flags & 2 != 0);
        }
        assert_eq!(slice.has_center_info(), flags & 1 != 0);
        assert_eq!(slice.has_pivot_info(), flags & 2 != 0);
    }
}

#[test]
fn three_keys_decode_exactly() {
    let mut rng = rand::thread_rng();
    let specs: Vec<KeySpec> = vec![
        random_key(&mut rng, 0, 3),
        random_key(&mut rng, 4, 3),
        random_key(&mut rng, 9, 3),
    ];
    let slice = decode_slice(&ChunkWriter::slice_chunk(3, "door", &specs)).unwrap();

    let expected: Vec<SliceKey> = specs.iter().map(expected_key).collect();
    assert_eq!(slice.name(), "door");
    assert_eq!(slice.keys(), expected.as_slice());
    assert_eq!(
        slice,
        Slice::new("door", SliceFlags::NINE_PATCH | SliceFlags::PIVOT, expected).unwrap()
    );
}

#[test]
fn reserved_flag_bits_are_ignored() {
    let specs: [KeySpec; 1] = [(0, (1, 2, 3, 4), None, Some((1, 1)))];
    let slice = decode_slice(&ChunkWriter::slice_chunk(0xF0 | 2, "p", &specs)).unwrap();
    assert_eq!(slice.flags(), SliceFlags::PIVOT);
    assert_eq!(slice.raw_flags(), 0xF2);
    assert_eq!(slice.keys()[0].pivot(), Some(Point { x: 1, y: 1 }));
}

#[test]
fn zero_keys_are_rejected() {
    let chunk = ChunkWriter::slice_chunk(0, "nothing", &[]);
    let err = decode_slice(&chunk).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::EmptyKeySequence
    ));
    assert_eq!(err.location().map(|l| l.index), Some(0));
}

#[test]
fn key_count_past_chunk_end_is_rejected() {
    let specs: [KeySpec; 2] = [(0, (0, 0, 1, 1), None, None), (1, (0, 0, 1, 1), None, None)];
    let body = ChunkWriter::slice_body_with_count(5, 0, b"s", &specs);
    let err = decode_slice(&ChunkWriter::chunk(0x2022, &body)).unwrap_err();
    match err.root_cause() {
        AsepriteParseError::InvalidKeyCount {
            key_count,
            key_size,
            available,
        } => assert_eq!((*key_count, *key_size, *available), (5, 20, 40)),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn non_utf8_names_are_rejected() {
    let specs: [KeySpec; 1] = [(0, (0, 0, 1, 1), None, None)];
    let body = ChunkWriter::slice_body_with_count(1, 0, &[0x54, 0xfc, 0x72], &specs);
    let err = decode_slice(&ChunkWriter::chunk(0x2022, &body)).unwrap_err();
    assert!(matches!(err.root_cause(), AsepriteParseError::InvalidInput(_)));
}

#[test]
fn truncated_slice_header_is_invalid_input() {
    let err = decode_slice(&ChunkWriter::chunk(0x2022, &[1, 0, 0, 0, 0])).unwrap_err();
    assert!(matches!(err.root_cause(), AsepriteParseError::InvalidInput(_)));
}

#[test]
fn name_longer_than_chunk_is_truncation() {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(1).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    body.write_u16::<LittleEndian>(500).unwrap();
    body.extend_from_slice(b"ab");
    let err = decode_slice(&ChunkWriter::chunk(0x2022, &body)).unwrap_err();
    match err.root_cause() {
        AsepriteParseError::TruncatedStream {
            declared,
            available,
        } => assert_eq!((*declared, *available), (500, 2)),
        other => panic!("unexpected error: {:?}", other),
    }
}

fn sample_file() -> Vec<u8> {
    let frame0 = vec![
        ChunkWriter::chunk(0x2004, &[0; 24]),
        ChunkWriter::slice_chunk(0, "head", &[(0, (2, 2, 4, 4), None, None)]),
        ChunkWriter::slice_chunk(
            2,
            "body",
            &[
                (0, (0, 8, 8, 8), None, Some((4, 8))),
                (2, (8, 8, 8, 8), None, Some((0, 0))),
            ],
        ),
    ];
    let frame1 = vec![
        ChunkWriter::chunk(0x2005, &[7; 12]),
        ChunkWriter::slice_chunk(1, "panel", &[(0, (0, 0, 6, 6), Some((2, 2, 2, 2)), None)]),
    ];
    let frame2 = vec![];
    ChunkWriter::file(16, 16, &[frame0, frame1, frame2])
}

#[test]
fn reads_slices_from_all_frames() {
    let file = SliceFile::read(sample_file().as_slice()).unwrap();
    assert_eq!(file.size(), (16, 16));
    assert_eq!(file.num_frames(), 3);
    assert_eq!(file.color_depth(), 32);
    assert_eq!(file.frame_duration(1), 101);

    let names: Vec<&str> = file.slices().iter().map(Slice::name).collect();
    assert_eq!(names, vec!["head", "body", "panel"]);
    assert_eq!(file.slice_by_name("body").unwrap().keys().len(), 2);
    assert!(file.slice_by_name("legs").is_none());
}

#[test]
fn bad_file_magic() {
    let mut data = sample_file();
    data[4] = 0;
    assert!(matches!(
        SliceFile::read(data.as_slice()),
        Err(AsepriteParseError::InvalidInput(_))
    ));
}

#[test]
fn file_errors_carry_chunk_location() {
    let frame0 = vec![ChunkWriter::slice_chunk(0, "ok", &[(0, (0, 0, 1, 1), None, None)])];
    let frame1 = vec![
        ChunkWriter::chunk(0x2005, &[0; 4]),
        ChunkWriter::slice_chunk(0, "broken", &[]),
    ];
    let first_frame_size = 16 + frame0[0].len() as u64;
    let data = ChunkWriter::file(8, 8, &[frame0, frame1]);

    let err = SliceFile::read(data.as_slice()).unwrap_err();
    let location = err.location().unwrap();
    assert_eq!(location.frame, Some(1));
    assert_eq!(location.index, 1);
    assert_eq!(location.offset, 128 + first_frame_size + 16 + 10);
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::EmptyKeySequence
    ));
}

#[test]
fn unknown_color_depth_is_invalid_input() {
    let mut data = sample_file();
    // Color depth lives at byte 12 of the file header.
    data[12] = 24;
    let err = SliceFile::read(data.as_slice()).unwrap_err();
    match err {
        AsepriteParseError::InvalidInput(msg) => assert!(msg.contains("24")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn truncated_file_is_an_error() {
    let mut data = sample_file();
    data.truncate(data.len() - 30);
    assert!(SliceFile::read(data.as_slice()).is_err());
}

#[test]
fn resolves_slices_per_frame() {
    let file = SliceFile::read(sample_file().as_slice()).unwrap();
    let config = SliceConfig::default();

    let at0 = file.resolve(0, &config);
    let body = &at0[1];
    assert_eq!(body.rect(), Rect::new(0, 0, 8, 8));
    assert_eq!(body.pivot(), Pivot::new(0.5, 0.0));
    assert!(body.has_pivot_info());

    let at2 = file.resolve(2, &config);
    assert_eq!(at2[1].rect(), Rect::new(8, 0, 8, 8));
    assert_eq!(at2[1].pivot(), Pivot::new(0.0, 1.0));

    // Slices without pivot get the default.
    assert_eq!(at2[0].pivot(), Pivot::CENTER);
    assert!(!at2[0].has_pivot_info());
    assert_eq!(at2[0].rect(), Rect::new(2, 10, 4, 4));
}

#[test]
fn decomposes_image_into_named_regions() {
    let file = SliceFile::read(sample_file().as_slice()).unwrap();
    let mut image = RgbaImage::new(16, 16);
    // Visible pixels cover "head", which "panel" overlaps. "body" is blank.
    for y in 2..6 {
        for x in 2..6 {
            image.put_pixel(x, y, Rgba([200, 100, 50, 255]));
        }
    }

    let config = SliceConfig::default();
    let regions = file.decompose("hero", 0, &image, &config);
    let names: Vec<&str> = regions.iter().map(ResolvedSlice::name).collect();
    assert_eq!(names, vec!["hero_head", "hero_body", "hero_panel"]);
    let panel = &regions[2];
    assert!(panel.has_center_info());
    assert_eq!(panel.center_rect(), Some(Rect::new(2, 2, 2, 2)));
    assert_eq!(panel.rect(), Rect::new(0, 10, 6, 6));

    let config = SliceConfig {
        empty_tiles: EmptyTilePolicy::Remove,
        ..SliceConfig::default()
    };
    let regions = file.decompose("hero", 0, &image, &config);
    let names: Vec<&str> = regions.iter().map(ResolvedSlice::name).collect();
    assert_eq!(names, vec!["hero_head", "hero_panel"]);
}

#[test]
fn layer_regions_end_with_layer_suffix() {
    let file = SliceFile::read(sample_file().as_slice()).unwrap();
    let image = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
    let regions = file.decompose_layer("hero", "Shadow", 0, &image, &SliceConfig::default());
    let names: Vec<&str> = regions.iter().map(ResolvedSlice::name).collect();
    assert_eq!(
        names,
        vec!["hero_head_Shadow", "hero_body_Shadow", "hero_panel_Shadow"]
    );
}

#[test]
fn regions_are_clamped_to_smaller_raster() {
    let file = SliceFile::read(sample_file().as_slice()).unwrap();
    let config = SliceConfig {
        origin: OriginConvention::TopLeft,
        ..SliceConfig::default()
    };
    let image = RgbaImage::new(12, 12);
    let regions = file.decompose("hero", 2, &image, &config);
    assert_eq!(regions[1].rect(), Rect::new(8, 8, 4, 4));
}
