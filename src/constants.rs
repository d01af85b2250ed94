// Interpret As Command
pub const IAC: u8 = 255;

// Indicates the desire to begin performing, or confirmation that you are now
// performing, the indicated option.
pub const WILL: u8 = 251;

// Indicates the refusal to perform, or continue performing, the indicated
// option.
pub const WONT: u8 = 252;

// Indicates the request that the other party perform, or confirmation that you
// are expecting the other party to perform, the indicated option.
pub const DO: u8 = 253;

// Indicates the demand that the other party stop performing, or confirmation
// that you are no longer expecting the other party to perform, the indicated
// option.
pub const DONT: u8 = 254;

// Subnegotiation Begin
pub const SB: u8 = 250;

// Subnegotiation End
pub const SE: u8 = 240;

// No Operation - also doubles as the keepalive byte
pub const NOP: u8 = 241;

// Go Ahead - appended after prompts so clients can detect them
pub const GA: u8 = 249;

// Suppress Go Ahead
pub const SGA: u8 = 3;

// Negotiate About Window Size - <https://datatracker.ietf.org/doc/rfc1073/>
pub const NAWS: u8 = 31;

// Linemode - <https://datatracker.ietf.org/doc/html/rfc1116#section-2.1>
// Always declined; the server does all line processing.
pub const LINEMODE: u8 = 34;

// Terminal Type - <https://datatracker.ietf.org/doc/rfc1091/>
// Extended by the MTTS convention: <https://tintin.mudhalla.net/protocols/mtts/>
pub const TTYPE: u8 = 24;

// TTYPE subnegotiation commands
pub const TTYPE_IS: u8 = 0;
pub const TTYPE_SEND: u8 = 1;

// Mud Client Compression Protocol (v1, obsolete) -
// <https://www.gammon.com.au/mccp/protocol.html>
pub const MCCP1: u8 = 85;

// Mud Client Compression Protocol (v2, server-to-client stream)
pub const MCCP2: u8 = 86;

// Mud Client Compression Protocol (v3, client-to-server stream) -
// <https://tintin.mudhalla.net/protocols/mccp/>
pub const MCCP3: u8 = 87;

// Mud Server Status Protocol - <https://mudhalla.net/tintin/protocols/mssp/>
pub const MSSP: u8 = 70;

// MSSP subnegotiation markers
pub const MSSP_VAR: u8 = 1;
pub const MSSP_VAL: u8 = 2;

// Mud Server Data Protocol - <https://tintin.mudhalla.net/protocols/msdp/>
pub const MSDP: u8 = 69;

// MSDP structural markers
pub const MSDP_VAR: u8 = 1;
pub const MSDP_VAL: u8 = 2;
pub const MSDP_TABLE_OPEN: u8 = 3;
pub const MSDP_TABLE_CLOSE: u8 = 4;
pub const MSDP_ARRAY_OPEN: u8 = 5;
pub const MSDP_ARRAY_CLOSE: u8 = 6;

// Generic Mud Communication Protocol - <https://www.gammon.com.au/gmcp>
pub const GMCP: u8 = 201;

// Mud eXtension Protocol - <https://www.zuggsoft.com/zmud/mxp.htm>
pub const MXP: u8 = 91;

// Carriage Return
pub const CR: u8 = 13;

// Line Feed
pub const LF: u8 = 10;

// Carriage Return + Line Feed
pub const CRLF: &[u8] = b"\r\n";
