//! Audio segment handling: writing, concatenation, probing and cleanup.

pub mod assembler;
pub mod cleanup;
pub mod probe;
pub mod segment;

pub use assembler::{ConcatTool, Ffmpeg, concatenate};
pub use cleanup::cleanup;
pub use segment::write_segment;
