pub mod chunk_source;

pub use chunk_source::{Chunk, ChunkSource};
