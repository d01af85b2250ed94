use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::ProtocolError;

/// The outbound (server-to-client) MCCP2 zlib stream.
///
/// Every logical message ends with a sync flush so the client can decode
/// message boundaries without the stream closing. The stream carries its
/// dictionary across the whole session, so one compressor belongs to exactly
/// one session and is never reused after [`finish`](Self::finish).
pub struct OutboundCompressor {
    ctx: Compress,
}

impl std::fmt::Debug for OutboundCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundCompressor").field("total_out", &self.ctx.total_out()).finish()
    }
}

impl Default for OutboundCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundCompressor {
    pub fn new() -> Self {
        Self { ctx: Compress::new(Compression::best(), true) }
    }

    /// Compresses one logical message and appends a sync-flush boundary.
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.run(data, FlushCompress::Sync)
    }

    /// Emits the final flush that terminates the stream. The compressor must
    /// be dropped afterwards; re-enabling compression builds a fresh stream.
    pub fn finish(&mut self) -> Result<Vec<u8>, ProtocolError> {
        self.run(&[], FlushCompress::Finish)
    }

    fn run(&mut self, mut input: &[u8], flush: FlushCompress) -> Result<Vec<u8>, ProtocolError> {
        let mut output = Vec::with_capacity(input.len() / 2 + 64);

        loop {
            if output.len() == output.capacity() {
                output.reserve(4096);
            }

            let before = self.ctx.total_in();
            let status = self
                .ctx
                .compress_vec(input, &mut output, flush)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?;
            let consumed = (self.ctx.total_in() - before) as usize;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => return Ok(output),
                Status::Ok | Status::BufError => {
                    // Done once all input is taken and the flush output fit.
                    if input.is_empty() && output.len() < output.capacity() {
                        return Ok(output);
                    }
                }
            }
        }
    }
}

/// The inbound (client-to-server) MCCP3 zlib stream. State persists across
/// network reads within one session.
pub struct InboundDecompressor {
    ctx: Decompress,
}

impl std::fmt::Debug for InboundDecompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundDecompressor").field("total_in", &self.ctx.total_in()).finish()
    }
}

impl Default for InboundDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundDecompressor {
    pub fn new() -> Self {
        Self { ctx: Decompress::new(true) }
    }

    /// Inflates one raw network block. A corrupt block is fatal to the
    /// session: the remaining stream cannot be trusted.
    pub fn decompress(&mut self, mut input: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let mut output = Vec::with_capacity(input.len().saturating_mul(3).max(256));

        loop {
            if output.len() == output.capacity() {
                output.reserve(4096);
            }

            let before = self.ctx.total_in();
            let status = self
                .ctx
                .decompress_vec(input, &mut output, FlushDecompress::None)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?;
            let consumed = (self.ctx.total_in() - before) as usize;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => return Ok(output),
                Status::Ok | Status::BufError => {
                    if input.is_empty() && output.len() < output.capacity() {
                        return Ok(output);
                    }
                }
            }
        }
    }
}
