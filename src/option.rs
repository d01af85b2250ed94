use crate::constants::{GMCP, LINEMODE, MCCP1, MCCP2, MCCP3, MSDP, MSSP, MXP, NAWS, SGA, TTYPE};

/// Represents all Telnet options known to mudwire.
/// See `<https://tools.ietf.org/html/rfc854>` for more information.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    SuppressGoAhead,
    Naws,
    Linemode,
    TerminalType,
    MCCP1,
    MCCP2,
    MCCP3,
    MSSP,
    MSDP,
    GMCP,
    MXP,
    Unknown(u8),
}

impl From<u8> for TelnetOption {
    fn from(byte: u8) -> Self {
        match byte {
            SGA => TelnetOption::SuppressGoAhead,
            NAWS => TelnetOption::Naws,
            LINEMODE => TelnetOption::Linemode,
            TTYPE => TelnetOption::TerminalType,
            MCCP1 => TelnetOption::MCCP1,
            MCCP2 => TelnetOption::MCCP2,
            MCCP3 => TelnetOption::MCCP3,
            MSSP => TelnetOption::MSSP,
            MSDP => TelnetOption::MSDP,
            GMCP => TelnetOption::GMCP,
            MXP => TelnetOption::MXP,
            _ => TelnetOption::Unknown(byte),
        }
    }
}

impl From<TelnetOption> for u8 {
    fn from(option: TelnetOption) -> Self {
        match option {
            TelnetOption::SuppressGoAhead => SGA,
            TelnetOption::Naws => NAWS,
            TelnetOption::Linemode => LINEMODE,
            TelnetOption::TerminalType => TTYPE,
            TelnetOption::MCCP1 => MCCP1,
            TelnetOption::MCCP2 => MCCP2,
            TelnetOption::MCCP3 => MCCP3,
            TelnetOption::MSSP => MSSP,
            TelnetOption::MSDP => MSDP,
            TelnetOption::GMCP => GMCP,
            TelnetOption::MXP => MXP,
            TelnetOption::Unknown(byte) => byte,
        }
    }
}
