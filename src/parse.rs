use crate::chunk::{Chunk, ChunkFramer};
use crate::reader::AseReader;
use crate::slice::Slice;
use crate::{AsepriteParseError, Result, SliceFile};
use log::debug;
use std::io::Read;

const FILE_HEADER_SIZE: u64 = 128;
const FRAME_HEADER_SIZE: u64 = 16;

struct Header {
    num_frames: u16,
    width: u16,
    height: u16,
    color_depth: u16,
    default_frame_time: u16,
}

// file format docs: https://github.com/aseprite/aseprite/blob/master/docs/ase-file-specs.md
pub fn read_slices<R: Read>(input: R) -> Result<SliceFile> {
    let mut input = input;
    let header = parse_header(&mut AseReader::with(&mut input))?;

    let mut frame_times = vec![header.default_frame_time; header.num_frames as usize];
    let mut slices: Vec<Slice> = Vec::new();
    let mut offset = FILE_HEADER_SIZE;

    for frame_id in 0..header.num_frames {
        let frame_size = parse_frame(&mut input, frame_id, offset, &mut frame_times, &mut slices)?;
        offset += frame_size;
    }

    Ok(SliceFile {
        width: header.width,
        height: header.height,
        num_frames: header.num_frames,
        color_depth: header.color_depth,
        frame_times,
        slices,
    })
}

fn parse_header<R: Read>(reader: &mut AseReader<R>) -> Result<Header> {
    let _size = reader.dword()?;
    let magic_number = reader.word()?;
    if magic_number != 0xA5E0 {
        return Err(AsepriteParseError::InvalidInput(format!(
            "Invalid magic number for header: {:x} != {:x}",
            magic_number, 0xA5E0
        )));
    }

    let num_frames = reader.word()?;
    let width = reader.word()?;
    let height = reader.word()?;
    let color_depth = reader.word()?;
    let _flags = reader.dword()?;
    let default_frame_time = reader.word()?;
    let _placeholder1 = reader.dword()?;
    let _placeholder2 = reader.dword()?;
    let _transparent_color_index = reader.byte()?;
    let _ignore1 = reader.byte()?;
    let _ignore2 = reader.word()?;
    let _num_colors = reader.word()?;
    let pixel_width = reader.byte()?;
    let pixel_height = reader.byte()?;
    let _grid_x = reader.short()?;
    let _grid_y = reader.short()?;
    let _grid_width = reader.word()?;
    let _grid_height = reader.word()?;
    reader.skip_reserved(84)?;

    if !matches!(color_depth, 8 | 16 | 32) {
        return Err(AsepriteParseError::InvalidInput(format!(
            "Unknown pixel format. Color depth: {}",
            color_depth
        )));
    }
    if !(pixel_width == pixel_height || pixel_width == 0 || pixel_height == 0) {
        // Slices are stored in pixels, so the aspect ratio only matters
        // for display.
        debug!(
            "Non-square pixel ratio {}:{} ignored",
            pixel_width, pixel_height
        );
    }

    Ok(Header {
        num_frames,
        width,
        height,
        color_depth,
        default_frame_time,
    })
}

// Returns the number of bytes the frame occupies.
fn parse_frame<R: Read>(
    input: &mut R,
    frame_id: u16,
    offset: u64,
    frame_times: &mut [u16],
    slices: &mut Vec<Slice>,
) -> Result<u64> {
    let mut reader = AseReader::with(&mut *input);
    let num_bytes = reader.dword()?;
    let magic_number = reader.word()?;
    if magic_number != 0xF1FA {
        return Err(AsepriteParseError::InvalidInput(format!(
            "Invalid magic number for frame: {:x} != {:x}",
            magic_number, 0xF1FA
        )));
    }
    let old_num_chunks = reader.word()?;
    let frame_duration_ms = reader.word()?;
    let _placeholder = reader.word()?;
    let new_num_chunks = reader.dword()?;

    if (num_bytes as u64) < FRAME_HEADER_SIZE {
        return Err(AsepriteParseError::InvalidInput(format!(
            "Frame size is too small {}, minimum_size: {}",
            num_bytes, FRAME_HEADER_SIZE
        )));
    }

    frame_times[frame_id as usize] = frame_duration_ms;

    let num_chunks = if new_num_chunks == 0 {
        old_num_chunks as u32
    } else {
        new_num_chunks
    };

    let framer = ChunkFramer::within_frame(
        reader,
        frame_id,
        offset + FRAME_HEADER_SIZE,
        num_bytes as u64 - FRAME_HEADER_SIZE,
    );
    let mut chunk_count = 0;
    for raw in framer {
        chunk_count += 1;
        match Chunk::decode(raw?)? {
            Chunk::Slice(slice) => slices.push(slice),
            Chunk::Unparsed(_) => {}
        }
    }

    if chunk_count != num_chunks {
        debug!(
            "Frame {} declares {} chunks but contains {}",
            frame_id, num_chunks, chunk_count
        );
    }

    Ok(num_bytes as u64)
}
