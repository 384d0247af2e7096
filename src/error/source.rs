/*!
 Errors that can happen when reading from a byte source.
*/

use thiserror::Error;

/// Errors that can happen when reading from a [`ByteSource`](crate::objectstream::source::ByteSource)
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SourceError {
    #[error("Unexpected end of stream: wanted {wanted} byte(s) at position {position:#x}!")]
    UnexpectedEof {
        /// Cursor position at the time of the failed read
        position: u64,
        /// Number of bytes the failed read asked for
        wanted: usize,
    },
}
