use crate::{AsepriteParseError, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

fn to_ase(e: io::Error) -> AsepriteParseError {
    e.into()
}

pub(crate) struct AseReader<T: Read> {
    input: T,
}

impl<'a> AseReader<Cursor<&'a [u8]>> {
    pub(crate) fn new(data: &'a [u8]) -> AseReader<Cursor<&'a [u8]>> {
        let input = Cursor::new(data);
        AseReader { input }
    }

    pub(crate) fn position(&self) -> u64 {
        self.input.position()
    }

    pub(crate) fn remaining(&self) -> u64 {
        let len = self.input.get_ref().len() as u64;
        len.saturating_sub(self.input.position())
    }
}

impl<T> AseReader<T>
where
    T: Read,
{
    pub(crate) fn with(input: T) -> Self {
        Self { input }
    }

    pub(crate) fn byte(&mut self) -> Result<u8> {
        self.input.read_u8().map_err(to_ase)
    }

    pub(crate) fn word(&mut self) -> Result<u16> {
        self.input.read_u16::<LittleEndian>().map_err(to_ase)
    }

    pub(crate) fn short(&mut self) -> Result<i16> {
        self.input.read_i16::<LittleEndian>().map_err(to_ase)
    }

    pub(crate) fn dword(&mut self) -> Result<u32> {
        self.input.read_u32::<LittleEndian>().map_err(to_ase)
    }

    pub(crate) fn long(&mut self) -> Result<i32> {
        self.input.read_i32::<LittleEndian>().map_err(to_ase)
    }

    /// Like `dword`, but returns `None` if the input is already exhausted.
    /// Running out of input after the first byte is a truncation.
    pub(crate) fn try_dword(&mut self) -> Result<Option<u32>> {
        let bytes = self.take_up_to(4)?;
        match bytes.len() {
            0 => Ok(None),
            4 => Ok(Some(LittleEndian::read_u32(&bytes))),
            n => Err(AsepriteParseError::TruncatedStream {
                declared: 4,
                available: n as u64,
            }),
        }
    }

    /// A string prefixed by its length. A length running past the end of the
    /// input is a truncation.
    pub(crate) fn string(&mut self) -> Result<String> {
        let str_len = self.word()?;
        let str_bytes = self.take_bytes(str_len as usize)?;
        let s = String::from_utf8(str_bytes)?;
        Ok(s)
    }

    pub(crate) fn skip_reserved(&mut self, count: usize) -> Result<()> {
        let mut ignored = vec![0_u8; count];
        self.input.read_exact(&mut ignored).map_err(to_ase)
    }

    /// Reads up to `limit` bytes. Returns fewer only if the input ends.
    pub(crate) fn take_up_to(&mut self, limit: usize) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(limit.min(1 << 16));
        (&mut self.input)
            .take(limit as u64)
            .read_to_end(&mut output)?;
        Ok(output)
    }

    pub(crate) fn take_bytes(&mut self, limit: usize) -> Result<Vec<u8>> {
        let output = self.take_up_to(limit)?;
        if output.len() != limit {
            Err(AsepriteParseError::TruncatedStream {
                declared: limit as u64,
                available: output.len() as u64,
            })
        } else {
            Ok(output)
        }
    }
}

#[test]
fn try_dword_distinguishes_end_from_truncation() {
    let mut reader = AseReader::new(&[1, 0, 0, 0, 7]);
    assert_eq!(reader.try_dword().unwrap(), Some(1));
    assert!(matches!(
        reader.try_dword(),
        Err(AsepriteParseError::TruncatedStream {
            declared: 4,
            available: 1
        })
    ));
    assert_eq!(reader.try_dword().unwrap(), None);
}

#[test]
fn take_bytes_reports_shortfall() {
    let mut reader = AseReader::new(&[1, 2, 3]);
    assert_eq!(reader.remaining(), 3);
    match reader.take_bytes(8) {
        Err(AsepriteParseError::TruncatedStream {
            declared,
            available,
        }) => assert_eq!((declared, available), (8, 3)),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(reader.position(), 3);
}
