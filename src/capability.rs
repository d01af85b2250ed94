/// Per-connection capability flags, initialized to engine defaults at session
/// creation and mutated exclusively by negotiation handlers as handshakes
/// complete. The session composer reads these to decide rendering and
/// compression; a snapshot is shipped to the dispatcher when the TTYPE
/// handshake finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCapabilities {
    pub screen_width: u16,
    pub screen_height: u16,
    /// Append an explicit CRLF to every outgoing line, even ones that already
    /// end with one. Some clients (TinTin++) need this to render correctly.
    pub forced_endline: bool,
    pub ansi: bool,
    pub xterm256: bool,
    pub vt100: bool,
    pub utf8: bool,
    pub mouse_tracking: bool,
    pub osc_color_palette: bool,
    pub proxy: bool,
    pub screen_reader: bool,
    pub client_name: String,
    /// The raw terminal descriptor reported in TTYPE step 2, verbatim.
    pub terminal: Option<String>,
    pub encoding: String,
    /// Set once the three-round TTYPE handshake has completed.
    pub ttype_done: bool,
    /// Nonstandard capability tokens a client reported in place of an MTTS
    /// bitmask, uppercased.
    pub extra: Vec<String>,
    pub suppress_go_ahead: bool,
    pub naws: bool,
    pub mccp2: bool,
    pub mccp3: bool,
    pub mssp: bool,
    pub msdp: bool,
    pub gmcp: bool,
    pub mxp: bool,
    /// Send a NOP every keepalive interval. Toggleable for clients that choke
    /// on NOP.
    pub nop_keepalive: bool,
}

impl Default for ProtocolCapabilities {
    fn default() -> Self {
        Self {
            screen_width: 78,
            screen_height: 0,
            forced_endline: true,
            ansi: true,
            xterm256: false,
            vt100: false,
            utf8: false,
            mouse_tracking: false,
            osc_color_palette: false,
            proxy: false,
            screen_reader: false,
            client_name: "UNKNOWN".to_string(),
            terminal: None,
            encoding: "utf-8".to_string(),
            ttype_done: false,
            extra: Vec::new(),
            suppress_go_ahead: false,
            naws: false,
            mccp2: false,
            mccp3: false,
            mssp: false,
            msdp: false,
            gmcp: false,
            mxp: false,
            nop_keepalive: true,
        }
    }
}
