/*!
 Errors that can happen when decoding serialized Java data.
*/

pub mod objectstream;
pub mod source;
