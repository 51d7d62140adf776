//! Stateful element stream decoding.
//!
//! The decoder here reads element headers and values
//! one at a time from a byte source,
//! while recording how many bytes were consumed.
pub mod decode;
