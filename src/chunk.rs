use crate::error::ChunkLocation;
use crate::reader::AseReader;
use crate::slice::{self, Slice};
use crate::{AsepriteParseError, Result};
use log::debug;
use std::io::Read;

/// Size of the `length` and `kind` fields that precede every chunk payload.
pub(crate) const CHUNK_HEADER_SIZE: u32 = 6;

/// The type tag of a chunk.
///
/// Only [ChunkKind::Slice] is decoded by this crate. All other kinds are
/// framed and handed out as [RawChunk]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Palette chunk from Aseprite versions before 1.1 (deprecated).
    OldPalette04,
    /// Palette chunk from Aseprite versions before 1.1 (deprecated).
    OldPalette11,
    #[allow(missing_docs)]
    Layer,
    #[allow(missing_docs)]
    Cel,
    #[allow(missing_docs)]
    CelExtra,
    #[allow(missing_docs)]
    ColorProfile,
    #[allow(missing_docs)]
    ExternalFiles,
    /// Mask chunk (deprecated).
    Mask,
    #[allow(missing_docs)]
    Path,
    #[allow(missing_docs)]
    Tags,
    #[allow(missing_docs)]
    Palette,
    #[allow(missing_docs)]
    UserData,
    /// A named slice with one or more keys.
    Slice,
    #[allow(missing_docs)]
    Tileset,
    /// A tag this crate does not know about.
    Unknown(u16),
}

impl ChunkKind {
    /// Map a raw type tag to a chunk kind. Never fails.
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            0x0004 => ChunkKind::OldPalette04,
            0x0011 => ChunkKind::OldPalette11,
            0x2004 => ChunkKind::Layer,
            0x2005 => ChunkKind::Cel,
            0x2006 => ChunkKind::CelExtra,
            0x2007 => ChunkKind::ColorProfile,
            0x2008 => ChunkKind::ExternalFiles,
            0x2016 => ChunkKind::Mask,
            0x2017 => ChunkKind::Path,
            0x2018 => ChunkKind::Tags,
            0x2019 => ChunkKind::Palette,
            0x2020 => ChunkKind::UserData,
            0x2022 => ChunkKind::Slice,
            0x2023 => ChunkKind::Tileset,
            other => ChunkKind::Unknown(other),
        }
    }

    /// The raw type tag.
    pub fn tag(&self) -> u16 {
        match self {
            ChunkKind::OldPalette04 => 0x0004,
            ChunkKind::OldPalette11 => 0x0011,
            ChunkKind::Layer => 0x2004,
            ChunkKind::Cel => 0x2005,
            ChunkKind::CelExtra => 0x2006,
            ChunkKind::ColorProfile => 0x2007,
            ChunkKind::ExternalFiles => 0x2008,
            ChunkKind::Mask => 0x2016,
            ChunkKind::Path => 0x2017,
            ChunkKind::Tags => 0x2018,
            ChunkKind::Palette => 0x2019,
            ChunkKind::UserData => 0x2020,
            ChunkKind::Slice => 0x2022,
            ChunkKind::Tileset => 0x2023,
            ChunkKind::Unknown(tag) => *tag,
        }
    }
}

/// A framed chunk whose payload has not been interpreted.
#[derive(Debug, Clone)]
pub struct RawChunk {
    kind: ChunkKind,
    data: Vec<u8>,
    location: ChunkLocation,
}

impl RawChunk {
    /// The chunk's type tag.
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// The payload, excluding the 6-byte chunk header.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Where the chunk was found in the input.
    pub fn location(&self) -> ChunkLocation {
        self.location
    }
}

/// A decoded chunk.
#[derive(Debug, Clone)]
pub enum Chunk {
    /// A slice chunk.
    Slice(Slice),
    /// Any chunk kind this crate does not decode. Skipping these is not an
    /// error.
    Unparsed(RawChunk),
}

impl Chunk {
    /// Decode the payload of a framed chunk according to its kind.
    pub fn decode(raw: RawChunk) -> Result<Chunk> {
        match raw.kind {
            ChunkKind::Slice => slice::parse_chunk(&raw.data)
                .map(Chunk::Slice)
                .map_err(|e| e.in_chunk(raw.location)),
            kind => {
                debug!("Skipping unparsed chunk type: {:?} at {}", kind, raw.location);
                Ok(Chunk::Unparsed(raw))
            }
        }
    }

    /// The contained slice, if this is a slice chunk.
    pub fn as_slice(&self) -> Option<&Slice> {
        match self {
            Chunk::Slice(slice) => Some(slice),
            Chunk::Unparsed(_) => None,
        }
    }
}

/// Splits a byte stream into length-prefixed, type-tagged chunks.
///
/// Each chunk starts with a little-endian `u32` length (which includes the
/// 6 header bytes) followed by a `u16` type tag. The framer always consumes
/// the full declared length, so chunks that a decoder only partially
/// understands never desynchronize the following ones.
///
/// After the first error the framer yields no further chunks.
pub struct ChunkFramer<R: Read> {
    reader: AseReader<R>,
    frame: Option<u16>,
    index: u32,
    offset: u64,
    // `None` for a free-standing chunk stream that ends at end of input.
    bytes_available: Option<u64>,
    finished: bool,
}

impl<R: Read> ChunkFramer<R> {
    /// Frame a plain sequence of chunks that runs until the end of `input`.
    pub fn new(input: R) -> Self {
        Self {
            reader: AseReader::with(input),
            frame: None,
            index: 0,
            offset: 0,
            bytes_available: None,
            finished: false,
        }
    }

    // Chunks of a single frame, `bytes_available` being the frame size minus
    // the frame header.
    pub(crate) fn within_frame(
        reader: AseReader<R>,
        frame: u16,
        offset: u64,
        bytes_available: u64,
    ) -> Self {
        Self {
            reader,
            frame: Some(frame),
            index: 0,
            offset,
            bytes_available: Some(bytes_available),
            finished: false,
        }
    }

    /// Byte offset of the next chunk header.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next chunk. Returns `Ok(None)` at the end of the stream.
    pub fn next_chunk(&mut self) -> Result<Option<RawChunk>> {
        if self.finished || self.bytes_available == Some(0) {
            self.finished = true;
            return Ok(None);
        }
        let location = ChunkLocation {
            frame: self.frame,
            index: self.index,
            offset: self.offset,
        };
        match self.read_chunk(location) {
            Ok(chunk) => {
                if chunk.is_none() {
                    self.finished = true;
                }
                Ok(chunk)
            }
            Err(err) => {
                self.finished = true;
                Err(err.in_chunk(location))
            }
        }
    }

    fn read_chunk(&mut self, location: ChunkLocation) -> Result<Option<RawChunk>> {
        if let Some(available) = self.bytes_available {
            if available < CHUNK_HEADER_SIZE as u64 {
                let _ = self.reader.take_up_to(available as usize)?;
                return Err(AsepriteParseError::TruncatedStream {
                    declared: CHUNK_HEADER_SIZE as u64,
                    available,
                });
            }
        }
        let chunk_size = match self.reader.try_dword()? {
            Some(size) => size,
            None => {
                return match self.bytes_available {
                    None => Ok(None),
                    Some(available) => Err(AsepriteParseError::TruncatedStream {
                        declared: available,
                        available: 0,
                    }),
                };
            }
        };
        if chunk_size < CHUNK_HEADER_SIZE {
            return Err(AsepriteParseError::InvalidInput(format!(
                "Chunk size is too small {}, minimum_size: {}",
                chunk_size, CHUNK_HEADER_SIZE
            )));
        }
        if let Some(available) = self.bytes_available {
            if chunk_size as u64 > available {
                // Drop the rest of the frame so the outer cursor stays on the
                // frame boundary.
                let _ = self.reader.take_up_to(available.saturating_sub(4) as usize)?;
                return Err(AsepriteParseError::TruncatedStream {
                    declared: chunk_size as u64,
                    available,
                });
            }
        }

        let payload_size = (chunk_size - 4) as usize;
        let payload = self.reader.take_up_to(payload_size)?;
        if payload.len() != payload_size {
            return Err(AsepriteParseError::TruncatedStream {
                declared: chunk_size as u64,
                available: 4 + payload.len() as u64,
            });
        }
        let kind = ChunkKind::from_tag(u16::from_le_bytes([payload[0], payload[1]]));
        let data = payload[2..].to_vec();

        self.index += 1;
        self.offset += chunk_size as u64;
        if let Some(available) = self.bytes_available.as_mut() {
            *available -= chunk_size as u64;
        }
        Ok(Some(RawChunk {
            kind,
            data,
            location,
        }))
    }

    /// Frame and decode every remaining chunk. Stops at the first error.
    pub fn decode_all(self) -> Result<Vec<Chunk>> {
        self.map(|raw| raw.and_then(Chunk::decode)).collect()
    }
}

impl<R: Read> Iterator for ChunkFramer<R> {
    type Item = Result<RawChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

#[cfg(test)]
use crate::tests::ChunkWriter;

#[test]
fn kind_tags_round_trip() {
    for tag in &[0x0004, 0x0011, 0x2004, 0x2019, 0x2022, 0x2023, 0x7777] {
        assert_eq!(ChunkKind::from_tag(*tag).tag(), *tag);
    }
    assert_eq!(ChunkKind::from_tag(0x2022), ChunkKind::Slice);
    assert_eq!(ChunkKind::from_tag(0x7777), ChunkKind::Unknown(0x7777));
}

#[test]
fn frames_chunks_in_order() {
    let mut stream = Vec::new();
    stream.extend(ChunkWriter::chunk(0x2018, &[1, 2, 3]));
    stream.extend(ChunkWriter::chunk(0x9999, &[]));
    stream.extend(ChunkWriter::chunk(0x2004, &[4; 10]));

    let chunks: Vec<RawChunk> = ChunkFramer::new(stream.as_slice())
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].kind(), ChunkKind::Tags);
    assert_eq!(chunks[0].data(), &[1, 2, 3]);
    assert_eq!(chunks[1].kind(), ChunkKind::Unknown(0x9999));
    assert!(chunks[1].data().is_empty());
    assert_eq!(chunks[2].location().index, 2);
    assert_eq!(chunks[2].location().offset, 9 + 6);
}

#[test]
fn unknown_chunks_are_skipped_not_rejected() {
    let stream = ChunkWriter::chunk(0x1234, &[0xff; 5]);
    let chunks = ChunkFramer::new(stream.as_slice()).decode_all().unwrap();
    match &chunks[..] {
        [Chunk::Unparsed(raw)] => assert_eq!(raw.kind(), ChunkKind::Unknown(0x1234)),
        other => panic!("unexpected chunks: {:?}", other),
    }
}

#[test]
fn trailing_payload_is_skipped() {
    let mut body = ChunkWriter::slice_body(0, "a", &[(0, (0, 0, 4, 4), None, None)]);
    body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    let mut stream = ChunkWriter::chunk(0x2022, &body);
    stream.extend(ChunkWriter::chunk(0x2022, &ChunkWriter::slice_body(
        0,
        "b",
        &[(0, (1, 1, 2, 2), None, None)],
    )));

    let chunks = ChunkFramer::new(stream.as_slice()).decode_all().unwrap();
    let names: Vec<&str> = chunks
        .iter()
        .filter_map(Chunk::as_slice)
        .map(Slice::name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn truncated_chunk_reports_declared_length() {
    let mut stream = ChunkWriter::chunk(0x2018, &[0; 8]);
    stream.extend_from_slice(&40_u32.to_le_bytes());
    stream.extend_from_slice(&0x2022_u16.to_le_bytes());
    stream.extend_from_slice(&[0; 10]);

    let mut framer = ChunkFramer::new(stream.as_slice());
    assert!(framer.next_chunk().unwrap().is_some());
    let err = framer.next_chunk().unwrap_err();
    let location = err.location().unwrap();
    assert_eq!((location.index, location.offset), (1, 14));
    match err.root_cause() {
        AsepriteParseError::TruncatedStream {
            declared,
            available,
        } => assert_eq!((*declared, *available), (40, 16)),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(framer.next().is_none());
}

#[test]
fn chunk_larger_than_frame_is_truncation() {
    let stream = ChunkWriter::chunk(0x2018, &[0; 20]);
    let reader = AseReader::with(stream.as_slice());
    let mut framer = ChunkFramer::within_frame(reader, 0, 0, 10);
    let err = framer.next_chunk().unwrap_err();
    assert_eq!(err.location().unwrap().frame, Some(0));
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::TruncatedStream {
            declared: 26,
            available: 10
        }
    ));
}

#[test]
fn leftover_frame_bytes_are_not_read_past() {
    let mut stream = ChunkWriter::chunk(0x2018, &[0; 2]);
    stream.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd]);
    let mut input = stream.as_slice();
    let mut framer = ChunkFramer::within_frame(AseReader::with(&mut input), 2, 0, 10);
    assert!(framer.next_chunk().unwrap().is_some());
    let err = framer.next_chunk().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::TruncatedStream {
            declared: 6,
            available: 2
        }
    ));
    drop(framer);
    assert_eq!(input, &[0xcc, 0xdd]);
}

#[test]
fn undersized_chunk_is_invalid() {
    let stream = 3_u32.to_le_bytes();
    let err = ChunkFramer::new(&stream[..]).decode_all().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::InvalidInput(_)
    ));
}
