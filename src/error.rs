use std::{error::Error, fmt, io, string::FromUtf8Error};

/// Where in the input a chunk was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Index of the frame containing the chunk, if the chunk was read as part
    /// of a full Aseprite file.
    pub frame: Option<u16>,
    /// Index of the chunk, counted from the start of its frame (or stream).
    pub index: u32,
    /// Absolute byte offset of the chunk header in the input.
    pub offset: u64,
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame {
            Some(frame) => write!(
                f,
                "frame {}, chunk {} (offset 0x{:x})",
                frame, self.index, self.offset
            ),
            None => write!(f, "chunk {} (offset 0x{:x})", self.index, self.offset),
        }
    }
}

/// An error occured while reading the Aseprite file.
#[derive(Debug)]
pub enum AsepriteParseError {
    /// The input data was malformed. String contains detailed message.
    InvalidInput(String),
    /// A length field promised more bytes than the input holds.
    TruncatedStream {
        /// Number of bytes the length field declared.
        declared: u64,
        /// Number of bytes that were actually available.
        available: u64,
    },
    /// The input ended in the middle of a slice key.
    TruncatedKey {
        /// Index of the key within its slice chunk.
        key_index: u32,
    },
    /// A slice chunk declares more keys than its payload can hold.
    InvalidKeyCount {
        /// Number of keys declared by the chunk.
        key_count: u32,
        /// Size in bytes of a single key under the chunk's flags.
        key_size: u64,
        /// Payload bytes left for the keys.
        available: u64,
    },
    /// A slice chunk declares zero keys.
    EmptyKeySequence,
    /// A slice was constructed from inconsistent parts. String contains
    /// detailed message.
    InvalidSlice(String),
    /// Decoding a specific chunk failed.
    Chunk {
        /// Position of the failing chunk.
        location: ChunkLocation,
        /// The underlying error.
        source: Box<AsepriteParseError>,
    },
    /// An IO error occured.
    IoError(io::Error),
}

impl AsepriteParseError {
    pub(crate) fn in_chunk(self, location: ChunkLocation) -> Self {
        match self {
            // Keep the innermost location.
            AsepriteParseError::Chunk { .. } => self,
            err => AsepriteParseError::Chunk {
                location,
                source: Box::new(err),
            },
        }
    }

    /// The location of the chunk that failed to decode, if known.
    pub fn location(&self) -> Option<ChunkLocation> {
        match self {
            AsepriteParseError::Chunk { location, .. } => Some(*location),
            _ => None,
        }
    }

    /// The error with any chunk context removed.
    pub fn root_cause(&self) -> &AsepriteParseError {
        match self {
            AsepriteParseError::Chunk { source, .. } => source.root_cause(),
            err => err,
        }
    }
}

impl From<io::Error> for AsepriteParseError {
    fn from(err: io::Error) -> Self {
        AsepriteParseError::IoError(err)
    }
}

impl From<FromUtf8Error> for AsepriteParseError {
    fn from(err: FromUtf8Error) -> Self {
        AsepriteParseError::InvalidInput(format!(
            "Could not decode utf8 (legacy locale encodings are not supported): {}",
            err
        ))
    }
}

impl fmt::Display for AsepriteParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsepriteParseError::InvalidInput(msg) => write!(f, "Invalid Aseprite input: {}", msg),
            AsepriteParseError::TruncatedStream {
                declared,
                available,
            } => write!(
                f,
                "Truncated stream: expected {} bytes, but only {} are available",
                declared, available
            ),
            AsepriteParseError::TruncatedKey { key_index } => {
                write!(f, "Truncated slice key: input ended inside key {}", key_index)
            }
            AsepriteParseError::InvalidKeyCount {
                key_count,
                key_size,
                available,
            } => write!(
                f,
                "Invalid slice key count: {} keys of {} bytes do not fit into {} bytes",
                key_count, key_size, available
            ),
            AsepriteParseError::EmptyKeySequence => write!(f, "Slice chunk contains no keys"),
            AsepriteParseError::InvalidSlice(msg) => write!(f, "Invalid slice: {}", msg),
            AsepriteParseError::Chunk { location, source } => write!(f, "{}: {}", location, source),
            AsepriteParseError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for AsepriteParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AsepriteParseError::IoError(err) => Some(err),
            AsepriteParseError::Chunk { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[test]
fn chunk_context_keeps_innermost_location() {
    let inner = ChunkLocation {
        frame: Some(1),
        index: 3,
        offset: 0x90,
    };
    let outer = ChunkLocation {
        frame: None,
        index: 0,
        offset: 0,
    };
    let err = AsepriteParseError::EmptyKeySequence
        .in_chunk(inner)
        .in_chunk(outer);
    assert_eq!(err.location(), Some(inner));
    assert!(matches!(
        err.root_cause(),
        AsepriteParseError::EmptyKeySequence
    ));
    assert_eq!(
        err.to_string(),
        "frame 1, chunk 3 (offset 0x90): Slice chunk contains no keys"
    );
}
