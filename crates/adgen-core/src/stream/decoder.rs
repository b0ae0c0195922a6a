//! Chunk buffer and incremental line decoder

const LINE_TERMINATOR: u8 = b'\n';

/// Reassembles text lines from arbitrarily split byte chunks.
///
/// Splitting happens on raw bytes before UTF-8 decoding. `\n` never appears
/// inside a multi-byte sequence, so a character cut in half by a chunk
/// boundary simply stays in the carry-over buffer until its tail arrives.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // Carried-over bytes were already searched; only the new chunk can
        // hold the next terminator.
        let mut search = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[search..]
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
        {
            let end = search + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
            search = start;
        }
        self.pending.drain(..start);

        lines
    }

    /// Bytes held back waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// End of stream. An unterminated trailing line is never a record, so it
    /// is dropped; the number of discarded bytes is returned for logging.
    pub fn finish(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}
