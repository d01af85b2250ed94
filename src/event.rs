use bytes::Bytes;

use crate::{option::TelnetOption, subnegotiation::SubnegotiationType};

/// Represents all Telnet events produced and consumed by the codec.
/// See `<https://tools.ietf.org/html/rfc854>` for more information.
#[derive(Debug, PartialEq, Eq)]
pub enum TelnetEvent {
    /// A complete CRLF-delimited line of application data, with the delimiter
    /// stripped and escaped IAC bytes collapsed.
    Message(String),
    Do(TelnetOption),
    Will(TelnetOption),
    Dont(TelnetOption),
    Wont(TelnetOption),
    /// An inbound subnegotiation payload, raw. Interpreting the payload is the
    /// negotiation engine's job, via the option registry.
    Subnegotiation(TelnetOption, Bytes),
    /// An outbound typed subnegotiation frame.
    Subnegotiate(SubnegotiationType),
    GoAhead,
    Nop,
}
