use bytes::Bytes;

use crate::option::TelnetOption;

/// Represents the typed subnegotiation frames mudwire can emit.
#[derive(Debug, PartialEq, Eq)]
pub enum SubnegotiationType {
    /// `IAC SB TTYPE SEND IAC SE` - asks the client for its next terminal-type
    /// value. Sent once at negotiation time and re-sent after handshake steps
    /// 1 and 2.
    TerminalTypeSend,
    /// `IAC SB MCCP2 IAC SE` - announces that everything after this frame is
    /// part of the outbound zlib stream.
    BeginCompression,
    /// An MSSP variable table: `IAC SB MSSP (VAR key VAL value)* IAC SE`.
    ServerStatus(Vec<(Bytes, Bytes)>),
    /// A pre-encoded MSDP payload, framed as `IAC SB MSDP ... IAC SE`.
    ServerData(Bytes),
    /// A pre-encoded GMCP payload, framed as `IAC SB GMCP ... IAC SE`.
    Generic(Bytes),
    /// A subnegotiation for any other option.
    Unknown(TelnetOption, Bytes),
}

impl SubnegotiationType {
    /// Returns the length (in bytes) of the subnegotiation data.
    /// This _does not_ include the IAC SB and IAC SE bytes, _nor_ the single
    /// byte that represents the option.
    pub fn len(&self) -> usize {
        match self {
            SubnegotiationType::TerminalTypeSend => 1,
            SubnegotiationType::BeginCompression => 0,
            SubnegotiationType::ServerStatus(pairs) => {
                // 1 marker byte before each key and each value
                pairs.iter().map(|(key, value)| key.len() + value.len() + 2).sum()
            }
            SubnegotiationType::ServerData(bytes) => bytes.len(),
            SubnegotiationType::Generic(bytes) => bytes.len(),
            SubnegotiationType::Unknown(_, bytes) => bytes.len(),
        }
    }

    /// Returns true if the subnegotiation data has a length (in bytes) of 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
