//! Zlib framing for loose objects: bounded inflate into memory, and a
//! deflate-to-tempfile writer used by the safe-stream object publisher.

pub mod stream;

pub use stream::{deflate_to_vec, inflate_bounded};
