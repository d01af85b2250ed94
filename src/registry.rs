use crate::option::TelnetOption;

/// The options the server offers at connection start, heaviest protocols last:
/// compression negotiates before the payload protocols begin flowing.
pub const NEGOTIATE_ORDER: &[TelnetOption] = &[
    TelnetOption::SuppressGoAhead,
    TelnetOption::Naws,
    TelnetOption::TerminalType,
    TelnetOption::MCCP2,
    TelnetOption::MCCP3,
    TelnetOption::MSSP,
    TelnetOption::MSDP,
    TelnetOption::GMCP,
    TelnetOption::MXP,
];

/// Immutable per-session feature configuration, handed to the negotiation
/// engine at construction. Requests for anything not enabled here are answered
/// WONT/DONT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedOptions {
    pub suppress_go_ahead: bool,
    pub naws: bool,
    pub ttype: bool,
    pub mccp1: bool,
    pub mccp2: bool,
    pub mccp3: bool,
    pub mssp: bool,
    pub msdp: bool,
    pub gmcp: bool,
    pub mxp: bool,
}

impl Default for SupportedOptions {
    fn default() -> Self {
        // MCCP1 is obsolete and stays off.
        Self {
            suppress_go_ahead: true,
            naws: true,
            ttype: true,
            mccp1: false,
            mccp2: true,
            mccp3: true,
            mssp: true,
            msdp: true,
            gmcp: true,
            mxp: true,
        }
    }
}

impl SupportedOptions {
    pub fn supports(&self, option: TelnetOption) -> bool {
        match option {
            TelnetOption::SuppressGoAhead => self.suppress_go_ahead,
            TelnetOption::Naws => self.naws,
            TelnetOption::TerminalType => self.ttype,
            TelnetOption::MCCP1 => self.mccp1,
            TelnetOption::MCCP2 => self.mccp2,
            TelnetOption::MCCP3 => self.mccp3,
            TelnetOption::MSSP => self.mssp,
            TelnetOption::MSDP => self.msdp,
            TelnetOption::GMCP => self.gmcp,
            TelnetOption::MXP => self.mxp,
            TelnetOption::Linemode | TelnetOption::Unknown(_) => false,
        }
    }
}

/// Which payload decoder a subnegotiation for an option is routed to. Adding a
/// new extension protocol means adding a variant here and an arm in the
/// engine's dispatch; the byte-stream parser never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionDecoder {
    WindowSize,
    TerminalType,
    ServerData,
    Generic,
    InboundCompression,
}

/// Static decoder lookup for inbound subnegotiation payloads.
pub fn decoder(option: TelnetOption) -> Option<OptionDecoder> {
    match option {
        TelnetOption::Naws => Some(OptionDecoder::WindowSize),
        TelnetOption::TerminalType => Some(OptionDecoder::TerminalType),
        TelnetOption::MSDP => Some(OptionDecoder::ServerData),
        TelnetOption::GMCP => Some(OptionDecoder::Generic),
        TelnetOption::MCCP3 => Some(OptionDecoder::InboundCompression),
        _ => None,
    }
}

/// Sanity check run at engine construction: every option in the negotiation
/// order must resolve to a known option byte and back. Runs once per session,
/// in release builds too.
pub fn validate_registry() {
    for option in NEGOTIATE_ORDER {
        assert!(
            !matches!(option, TelnetOption::Unknown(_)),
            "negotiation order contains an unregistered option"
        );
        assert_eq!(*option, TelnetOption::from(u8::from(*option)));
    }
}
