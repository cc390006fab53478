pub mod chunk;

pub use chunk::{total_bytes, AudioChunk};
