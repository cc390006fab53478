/// One piece of uploaded audio.
///
/// `sequence` is the number the client claimed for the chunk. Chunks are stored
/// in arrival order and never reordered or validated here; stitching them
/// into a continuous stream is left to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub sequence: u64,
    pub bytes: Vec<u8>,
}

impl AudioChunk {
    pub fn new(sequence: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence,
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Total payload size of a set of chunks
pub fn total_bytes(chunks: &[AudioChunk]) -> usize {
    chunks.iter().map(AudioChunk::len).sum()
}
