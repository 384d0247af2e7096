/*!
 The byte source capability the decoder consumes, plus an in-memory
 implementation over a byte slice.
*/

use crate::error::source::SourceError;

/// A positional byte source supplying the primitive reads the decoder
/// needs. All multi-byte integers and floats are big-endian, as the wire
/// format requires.
///
/// Implementations may wrap in-memory buffers, file maps, or network
/// streams. Every read or skip past the end of the stream fails with
/// [`SourceError::UnexpectedEof`].
pub trait ByteSource {
    /// Whether at least one more byte can be read
    fn has_data_left(&self) -> bool;

    /// The current cursor position, for diagnostics
    fn pos(&self) -> u64;

    /// Read the current byte without advancing the cursor
    fn peek(&self) -> Result<u8, SourceError>;

    /// Advance the cursor by `n` bytes
    fn skip(&mut self, n: usize) -> Result<(), SourceError>;

    /// Read exactly `n` bytes
    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SourceError>;

    /// Read an unsigned 8-bit integer
    fn read_u8(&mut self) -> Result<u8, SourceError> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    /// Read a signed 8-bit integer
    fn read_i8(&mut self) -> Result<i8, SourceError> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a boolean; any non-zero byte is `true`
    fn read_bool(&mut self) -> Result<bool, SourceError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read an unsigned 16-bit integer
    fn read_u16(&mut self) -> Result<u16, SourceError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a signed 16-bit integer
    fn read_i16(&mut self) -> Result<i16, SourceError> {
        let bytes = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a signed 32-bit integer
    fn read_i32(&mut self) -> Result<i32, SourceError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a signed 64-bit integer
    fn read_i64(&mut self) -> Result<i64, SourceError> {
        let bytes = self.read_bytes(8)?;
        Ok(i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a 32-bit floating point number
    fn read_f32(&mut self) -> Result<f32, SourceError> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 64-bit floating point number
    fn read_f64(&mut self) -> Result<f64, SourceError> {
        let bytes = self.read_bytes(8)?;
        Ok(f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }
}

/// A [`ByteSource`] over an in-memory byte slice.
///
/// # Example:
///
/// ```
/// use jserial::objectstream::source::{ByteSource, SliceSource};
///
/// let mut source = SliceSource::new(&[0x00, 0x2A]);
/// assert_eq!(source.read_u16().unwrap(), 42);
/// assert!(!source.has_data_left());
/// ```
#[derive(Debug)]
pub struct SliceSource<'a> {
    /// The bytes we want to decode
    data: &'a [u8],
    /// The current index we are at in the data
    idx: usize,
}

impl<'a> SliceSource<'a> {
    /// Given a byte slice, construct a source over it.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, idx: 0 }
    }

    fn out_of_bounds(&self, wanted: usize) -> SourceError {
        SourceError::UnexpectedEof {
            position: self.idx as u64,
            wanted,
        }
    }
}

impl ByteSource for SliceSource<'_> {
    fn has_data_left(&self) -> bool {
        self.idx < self.data.len()
    }

    fn pos(&self) -> u64 {
        self.idx as u64
    }

    fn peek(&self) -> Result<u8, SourceError> {
        self.data
            .get(self.idx)
            .copied()
            .ok_or_else(|| self.out_of_bounds(1))
    }

    fn skip(&mut self, n: usize) -> Result<(), SourceError> {
        if n > self.data.len() - self.idx {
            return Err(self.out_of_bounds(n));
        }
        self.idx += n;
        Ok(())
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, SourceError> {
        if n > self.data.len() - self.idx {
            return Err(self.out_of_bounds(n));
        }
        let bytes = self.data[self.idx..self.idx + n].to_vec();
        self.idx += n;
        Ok(bytes)
    }
}
