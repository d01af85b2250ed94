use thiserror::Error;

/// Errors surfaced by the protocol engine.
///
/// Only `Compression` and `Io` are fatal to a session. Decode errors inside
/// subnegotiation payloads are logged and swallowed by the negotiation engine
/// before they ever reach a caller; the variants exist so the individual codecs
/// can report *why* a payload was discarded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Malformed data at the Telnet framing layer.
    #[error("codec error: {0}")]
    Codec(String),

    /// A malformed extension-protocol payload (MSDP, GMCP, NAWS, TTYPE). The
    /// offending unit is discarded and the session continues.
    #[error("out-of-band decode error: {0}")]
    OutOfBand(String),

    /// A corrupt compressed block. The remaining stream cannot be trusted, so
    /// this closes the session.
    #[error("compression stream error: {0}")]
    Compression(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error must tear down the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Compression(_) | ProtocolError::Io(_))
    }
}
