//! Supporting infrastructure: bit-level reading and error types.

pub mod bitstream_io;
pub mod errors;
