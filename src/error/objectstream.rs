/*!
 Errors that can happen when decoding an object serialization stream.
*/

use thiserror::Error;

use crate::error::source::SourceError;

/// Errors that can happen when decoding an object serialization stream
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ObjectStreamError {
    /// The byte source ran out mid-production
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The stream does not start with `AC ED 00 05`
    #[error("Invalid stream header: magic {magic:#06x}, version {version}!")]
    BadHeader { magic: u16, version: u16 },
    /// A tag byte outside the set the current grammar production allows
    #[error("Unexpected type code {code:#04x} while reading {context}!")]
    BadTypeCode { context: &'static str, code: u8 },
    /// A back reference to a handle that was never allocated
    #[error("Handle {0:#x} is outside the allocated range!")]
    BadHandle(u32),
    /// A class descriptor flag byte outside the permitted combinations
    #[error("Class descriptor flags {0:#04x} are not a valid combination!")]
    BadFlags(u8),
    /// An Externalizable class written without block data framing
    /// (protocol version 1 external contents)
    #[error("Externalizable contents without block data framing are not supported!")]
    UnsupportedExternalV1,
    /// A `TC_PROXYCLASSDESC` marker
    #[error("Proxy class descriptors are not supported!")]
    UnsupportedProxyClassDesc,
    /// A negative length prefix on a block, long string, or array
    #[error("Invalid {context} length {length}!")]
    BadLength { context: &'static str, length: i64 },
    /// A field type code outside `B C D F I J S Z [ L`
    #[error("Unknown field type code {0:#04x}!")]
    BadFieldType(u8),
    /// A back reference that resolved to the wrong kind of entity for its
    /// position, or to a slot still being constructed
    #[error("Handle {handle:#x} does not refer to {expected}!")]
    BadEntityKind { handle: u32, expected: &'static str },
}
