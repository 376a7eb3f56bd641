use crate::geometry::{Point, Rect};
use crate::{reader::AseReader, AsepriteParseError, Result};
use bitflags::bitflags;
use log::trace;
use std::io::{self, Read};
use std::ops::Range;

bitflags! {
    /// Optional fields present in every key of a slice.
    pub struct SliceFlags: u32 {
        /// It's a 9-patches slice: keys carry a center rectangle.
        const NINE_PATCH = 0x0001;
        /// Keys carry pivot information.
        const PIVOT = 0x0002;
    }
}

/// A snapshot of a slice's geometry, valid from `from_frame` until the next
/// key (or the end of the animation).
///
/// All coordinates are in document space: origin at the top-left corner of
/// the sprite, y pointing down. The center rectangle and the pivot are
/// relative to the slice's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceKey {
    from_frame: u32,
    bounds: Rect,
    center: Option<Rect>,
    pivot: Option<Point>,
}

impl SliceKey {
    /// A key without center or pivot information.
    pub fn new(from_frame: u32, bounds: Rect) -> Self {
        SliceKey {
            from_frame,
            bounds,
            center: None,
            pivot: None,
        }
    }

    /// Attach a 9-patch center rectangle.
    pub fn with_center(self, center: Rect) -> Self {
        SliceKey {
            center: Some(center),
            ..self
        }
    }

    /// Attach a pivot.
    pub fn with_pivot(self, pivot: Point) -> Self {
        SliceKey {
            pivot: Some(pivot),
            ..self
        }
    }

    /// First frame (inclusive) this key applies to.
    pub fn from_frame(&self) -> u32 {
        self.from_frame
    }

    /// The slice's rectangle.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The 9-patch center rectangle, relative to [SliceKey::bounds].
    pub fn center(&self) -> Option<Rect> {
        self.center
    }

    /// The pivot, relative to [SliceKey::bounds].
    pub fn pivot(&self) -> Option<Point> {
        self.pivot
    }

    /// Number of bytes one key occupies in a chunk with the given flags.
    pub fn encoded_size(flags: SliceFlags) -> u64 {
        let mut size = 20;
        if flags.contains(SliceFlags::NINE_PATCH) {
            size += 16;
        }
        if flags.contains(SliceFlags::PIVOT) {
            size += 8;
        }
        size
    }

    pub(crate) fn parse<T: Read>(
        reader: &mut AseReader<T>,
        flags: SliceFlags,
        key_index: u32,
    ) -> Result<Self> {
        Self::parse_fields(reader, flags).map_err(|err| match err {
            AsepriteParseError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                AsepriteParseError::TruncatedKey { key_index }
            }
            err => err,
        })
    }

    fn parse_fields<T: Read>(reader: &mut AseReader<T>, flags: SliceFlags) -> Result<Self> {
        let from_frame = reader.dword()?;
        let bounds = read_rect(reader)?;
        let center = if flags.contains(SliceFlags::NINE_PATCH) {
            Some(read_rect(reader)?)
        } else {
            None
        };
        let pivot = if flags.contains(SliceFlags::PIVOT) {
            let x = reader.long()?;
            let y = reader.long()?;
            Some(Point { x, y })
        } else {
            None
        };
        Ok(SliceKey {
            from_frame,
            bounds,
            center,
            pivot,
        })
    }
}

fn read_rect<T: Read>(reader: &mut AseReader<T>) -> Result<Rect> {
    let x = reader.long()?;
    let y = reader.long()?;
    let width = reader.dword()?;
    let height = reader.dword()?;
    Ok(Rect {
        x,
        y,
        width,
        height,
    })
}

/// A named slice: a rectangular region of the sprite, optionally changing
/// over the course of the animation.
///
/// [Official docs for slices](https://www.aseprite.org/docs/slices/).
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    name: String,
    flags: u32,
    reserved: u32,
    keys: Vec<SliceKey>,
}

impl Slice {
    /// Create a slice from its parts.
    ///
    /// Fails if `keys` is empty, or if the presence of center or pivot
    /// information in any key disagrees with `flags`.
    pub fn new<S: Into<String>>(name: S, flags: SliceFlags, keys: Vec<SliceKey>) -> Result<Self> {
        let name = name.into();
        if keys.is_empty() {
            return Err(AsepriteParseError::EmptyKeySequence);
        }
        let wants_center = flags.contains(SliceFlags::NINE_PATCH);
        let wants_pivot = flags.contains(SliceFlags::PIVOT);
        for (idx, key) in keys.iter().enumerate() {
            if key.center.is_some() != wants_center {
                return Err(AsepriteParseError::InvalidSlice(format!(
                    "Key {} of slice '{}' disagrees with the 9-patch flag",
                    idx, name
                )));
            }
            if key.pivot.is_some() != wants_pivot {
                return Err(AsepriteParseError::InvalidSlice(format!(
                    "Key {} of slice '{}' disagrees with the pivot flag",
                    idx, name
                )));
            }
        }
        Ok(Slice {
            name,
            flags: flags.bits(),
            reserved: 0,
            keys,
        })
    }

    /// Name of the slice. Not guaranteed to be unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The known flags of this slice.
    pub fn flags(&self) -> SliceFlags {
        SliceFlags::from_bits_truncate(self.flags)
    }

    /// The flags as stored in the file, including reserved bits.
    pub fn raw_flags(&self) -> u32 {
        self.flags
    }

    /// The reserved header field as stored in the file.
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Returns `true` if this is a 9-patch slice.
    pub fn has_center_info(&self) -> bool {
        self.flags().contains(SliceFlags::NINE_PATCH)
    }

    /// Returns `true` if the keys carry a pivot.
    pub fn has_pivot_info(&self) -> bool {
        self.flags().contains(SliceFlags::PIVOT)
    }

    /// All keys in file order. Never empty.
    pub fn keys(&self) -> &[SliceKey] {
        &self.keys
    }

    /// Returns `true` if the keys are sorted by their start frame.
    ///
    /// The decoder does not check this. [Slice::key_at] and
    /// [Slice::key_ranges] give meaningless answers for unsorted keys.
    pub fn keys_ordered(&self) -> bool {
        self.keys
            .windows(2)
            .all(|pair| pair[0].from_frame <= pair[1].from_frame)
    }

    /// The key in effect at `frame`.
    ///
    /// Frames before the first key use the first key.
    pub fn key_at(&self, frame: u32) -> &SliceKey {
        // `keys` is never empty, see `Slice::new` and `parse_chunk`.
        resolve_key(&self.keys, frame).unwrap_or(&self.keys[0])
    }

    /// Each key together with the half-open range of frames it governs in
    /// an animation of `num_frames` frames.
    ///
    /// The first key also covers any frames before its start frame. Keys
    /// that start at or after `num_frames` get an empty range.
    pub fn key_ranges(&self, num_frames: u32) -> impl Iterator<Item = (Range<u32>, &SliceKey)> {
        let keys = &self.keys;
        keys.iter().enumerate().map(move |(idx, key)| {
            let start = if idx == 0 {
                0
            } else {
                key.from_frame.min(num_frames)
            };
            let end = keys
                .get(idx + 1)
                .map_or(num_frames, |next| next.from_frame.min(num_frames))
                .max(start);
            (start..end, key)
        })
    }
}

/// Find the key in effect at `frame` in a list of keys sorted by start
/// frame.
///
/// Returns the last key starting at or before `frame`, or the first key if
/// `frame` precedes all of them. Returns `None` only for an empty list.
pub fn resolve_key(keys: &[SliceKey], frame: u32) -> Option<&SliceKey> {
    match keys.partition_point(|key| key.from_frame <= frame) {
        0 => keys.first(),
        idx => keys.get(idx - 1),
    }
}

pub(crate) fn parse_chunk(data: &[u8]) -> Result<Slice> {
    let mut reader = AseReader::new(data);

    let (num_slice_keys, flags, reserved, name) = parse_header(&mut reader)?;
    if num_slice_keys == 0 {
        return Err(AsepriteParseError::EmptyKeySequence);
    }

    let slice_flags = SliceFlags::from_bits_truncate(flags);
    let key_size = SliceKey::encoded_size(slice_flags);
    let available = reader.remaining();
    if num_slice_keys as u64 * key_size > available {
        return Err(AsepriteParseError::InvalidKeyCount {
            key_count: num_slice_keys,
            key_size,
            available,
        });
    }

    let keys = (0..num_slice_keys)
        .map(|idx| SliceKey::parse(&mut reader, slice_flags, idx))
        .collect::<Result<Vec<_>>>()?;

    trace!(
        "Slice '{}': {} key(s), flags {:?}",
        name,
        keys.len(),
        slice_flags
    );

    Ok(Slice {
        name,
        flags,
        reserved,
        keys,
    })
}

// Fixed part of the header: key count, flags, reserved and name length.
const HEADER_SIZE: u64 = 14;

fn parse_header(reader: &mut AseReader<io::Cursor<&[u8]>>) -> Result<(u32, u32, u32, String)> {
    if reader.remaining() < HEADER_SIZE {
        return Err(AsepriteParseError::InvalidInput(format!(
            "Slice chunk of {} bytes is too short for its header",
            reader.remaining()
        )));
    }
    let num_slice_keys = reader.dword()?;
    let flags = reader.dword()?;
    let reserved = reader.dword()?;
    let name = reader.string()?;
    Ok((num_slice_keys, flags, reserved, name))
}

#[cfg(test)]
fn key(from_frame: u32) -> SliceKey {
    SliceKey::new(from_frame, Rect::new(0, 0, 1, 1))
}

#[test]
fn key_decoder_reads_flag_gated_fields() {
    use crate::tests::ChunkWriter;

    let mut data = Vec::new();
    ChunkWriter::key(
        &mut data,
        &(3, (-2, 5, 8, 9), Some((1, 2, 3, 4)), Some((-7, 6))),
    );
    let flags = SliceFlags::NINE_PATCH | SliceFlags::PIVOT;
    let key = SliceKey::parse(&mut AseReader::new(&data), flags, 0).unwrap();
    assert_eq!(key.from_frame(), 3);
    assert_eq!(key.bounds(), Rect::new(-2, 5, 8, 9));
    assert_eq!(key.center(), Some(Rect::new(1, 2, 3, 4)));
    assert_eq!(key.pivot(), Some(Point { x: -7, y: 6 }));
    assert_eq!(data.len() as u64, SliceKey::encoded_size(flags));

    // Same bytes read without the pivot flag leave the pivot unread.
    let mut reader = AseReader::new(&data);
    let key = SliceKey::parse(&mut reader, SliceFlags::NINE_PATCH, 0).unwrap();
    assert_eq!(key.pivot(), None);
    assert_eq!(reader.remaining(), 8);
}

#[test]
fn key_decoder_rejects_missing_optional_fields() {
    use crate::tests::ChunkWriter;

    let mut data = Vec::new();
    ChunkWriter::key(&mut data, &(0, (0, 0, 4, 4), None, Some((1, 1))));
    // Pivot present, but the reader expects a center rect first.
    let flags = SliceFlags::NINE_PATCH | SliceFlags::PIVOT;
    let err = SliceKey::parse(&mut AseReader::new(&data), flags, 7).unwrap_err();
    assert!(matches!(err, AsepriteParseError::TruncatedKey { key_index: 7 }));
}

#[test]
fn resolver_picks_latest_key_not_after_frame() {
    let keys = vec![key(0), key(5), key(10)];
    assert_eq!(resolve_key(&keys, 7).unwrap().from_frame(), 5);
    assert_eq!(resolve_key(&keys, 0).unwrap().from_frame(), 0);
    assert_eq!(resolve_key(&keys, 5).unwrap().from_frame(), 5);
    assert_eq!(resolve_key(&keys, 4).unwrap().from_frame(), 0);
    assert_eq!(resolve_key(&keys, 1000).unwrap().from_frame(), 10);
    assert!(resolve_key(&[], 3).is_none());
}

#[test]
fn resolver_clamps_to_first_key() {
    let keys = vec![key(2), key(6)];
    assert_eq!(resolve_key(&keys, 0).unwrap().from_frame(), 2);
    assert_eq!(resolve_key(&keys, 1).unwrap().from_frame(), 2);
}

#[test]
fn key_ranges_cover_animation() {
    let slice = Slice::new("s", SliceFlags::empty(), vec![key(1), key(5), key(10)]).unwrap();
    let ranges: Vec<Range<u32>> = slice.key_ranges(8).map(|(r, _)| r).collect();
    assert_eq!(ranges, vec![0..5, 5..8, 8..8]);
    for frame in 0..8 {
        let (_, expected) = slice
            .key_ranges(8)
            .find(|(range, _)| range.contains(&frame))
            .unwrap();
        assert_eq!(slice.key_at(frame), expected);
    }
}

#[test]
fn slice_factory_validates_keys() {
    assert!(matches!(
        Slice::new("empty", SliceFlags::empty(), vec![]),
        Err(AsepriteParseError::EmptyKeySequence)
    ));
    assert!(matches!(
        Slice::new("pivot", SliceFlags::PIVOT, vec![key(0)]),
        Err(AsepriteParseError::InvalidSlice(_))
    ));
    let center = key(0).with_center(Rect::new(1, 1, 2, 2));
    assert!(matches!(
        Slice::new("center", SliceFlags::empty(), vec![center]),
        Err(AsepriteParseError::InvalidSlice(_))
    ));
    let slice = Slice::new("ok", SliceFlags::NINE_PATCH, vec![center]).unwrap();
    assert!(slice.has_center_info());
    assert!(!slice.has_pivot_info());
    assert!(slice.keys_ordered());
}

#[test]
fn unordered_keys_are_detected() {
    let slice = Slice::new("s", SliceFlags::empty(), vec![key(4), key(2)]).unwrap();
    assert!(!slice.keys_ordered());
}
