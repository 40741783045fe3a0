//! Data structures describing open tracks.

pub mod source;
