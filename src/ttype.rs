use crate::{capability::ProtocolCapabilities, constants::TTYPE_IS};

/// Client names that are known to render xterm 256-color output. All current
/// versions have supported it for years, so no version gate beyond Mudlet's.
const XTERM256_CLIENTS: &[&str] = &[
    "ATLANTIS",
    "CMUD",
    "KILDCLIENT",
    "MUDLET",
    "MUSHCLIENT",
    "PUTTY",
    "BEIP",
    "POTATO",
    "TINYFUGUE",
];

/// The MTTS capability bitmask, high bit to low.
/// See `<https://tintin.mudhalla.net/protocols/mtts/>`.
const MTTS: [(u16, MttsCapability); 8] = [
    (128, MttsCapability::Proxy),
    (64, MttsCapability::ScreenReader),
    (32, MttsCapability::OscColorPalette),
    (16, MttsCapability::MouseTracking),
    (8, MttsCapability::Xterm256),
    (4, MttsCapability::Utf8),
    (2, MttsCapability::Vt100),
    (1, MttsCapability::Ansi),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MttsCapability {
    Proxy,
    ScreenReader,
    OscColorPalette,
    MouseTracking,
    Xterm256,
    Utf8,
    Vt100,
    Ansi,
}

impl MttsCapability {
    fn apply(self, caps: &mut ProtocolCapabilities) {
        match self {
            MttsCapability::Proxy => caps.proxy = true,
            MttsCapability::ScreenReader => caps.screen_reader = true,
            MttsCapability::OscColorPalette => caps.osc_color_palette = true,
            MttsCapability::MouseTracking => caps.mouse_tracking = true,
            MttsCapability::Xterm256 => caps.xterm256 = true,
            MttsCapability::Utf8 => caps.utf8 = true,
            MttsCapability::Vt100 => caps.vt100 = true,
            MttsCapability::Ansi => caps.ansi = true,
        }
    }
}

/// What the engine should do after a TTYPE payload has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtypeOutcome {
    /// Re-issue `IAC SB TTYPE SEND IAC SE` for the client's next value.
    RequestNext,
    /// The third round finished; fire the one-time handshake-complete
    /// notification.
    Complete,
    /// The handshake was already done; the payload was dropped.
    Ignored,
}

/// The three-step terminal-type handshake.
///
/// Round 1 is the client name, round 2 a terminal descriptor, round 3 the MTTS
/// bitmask. Clients that do not support the extended exchange simply repeat
/// their last value; the step counter short-circuits after three rounds either
/// way, so a non-conforming client cannot keep the handshake open.
#[derive(Debug)]
pub struct TtypeHandshake {
    step: u8,
}

impl Default for TtypeHandshake {
    fn default() -> Self {
        Self { step: 1 }
    }
}

impl TtypeHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.step > 3
    }

    /// Processes one subnegotiation payload and advances the step counter.
    /// Never fails: a malformed payload yields the client name "UNKNOWN"
    /// rather than aborting the handshake.
    pub fn receive(&mut self, payload: &[u8], caps: &mut ProtocolCapabilities) -> TtypeOutcome {
        if caps.ttype_done || self.step > 3 {
            return TtypeOutcome::Ignored;
        }

        // Payloads arrive as `IS <value>`; strip the leading marker bytes.
        let start = payload.iter().position(|b| *b != TTYPE_IS).unwrap_or(payload.len());
        let value = String::from_utf8_lossy(&payload[start..]).to_string();

        let outcome = match self.step {
            1 => {
                self.receive_client_name(&value, caps);
                TtypeOutcome::RequestNext
            }
            2 => {
                self.receive_terminal(&value, caps);
                TtypeOutcome::RequestNext
            }
            _ => {
                self.receive_mtts(&value, caps);
                caps.ttype_done = true;
                TtypeOutcome::Complete
            }
        };

        self.step += 1;
        outcome
    }

    fn receive_client_name(&self, value: &str, caps: &mut ProtocolCapabilities) {
        let name = value.trim().to_uppercase();
        let name = if name.is_empty() { "UNKNOWN".to_string() } else { name };

        let mut xterm256 = false;
        if let Some(version) = name.strip_prefix("MUDLET") {
            // Mudlet renders 256 colors stably since 1.1; it also handles its
            // own line endings.
            xterm256 = version.trim() >= "1.1";
            caps.forced_endline = false;
        }

        if name.starts_with("TINTIN++") {
            caps.forced_endline = true;
        }

        if name.starts_with("XTERM")
            || name.ends_with("-256COLOR")
            || XTERM256_CLIENTS.contains(&name.as_str())
        {
            xterm256 = true;
        }

        // Every client that answers TTYPE at all can render ANSI.
        caps.ansi = true;
        caps.xterm256 = xterm256;
        caps.client_name = name;
    }

    fn receive_terminal(&self, value: &str, caps: &mut ProtocolCapabilities) {
        let upper = value.to_uppercase();
        let xterm256 = upper.ends_with("-256COLOR")
            || (upper.ends_with("XTERM") && !upper.ends_with("-COLOR"));

        if xterm256 {
            caps.ansi = true;
            caps.xterm256 = true;
        }

        caps.terminal = Some(value.to_string());
    }

    fn receive_mtts(&self, value: &str, caps: &mut ProtocolCapabilities) {
        if let Some(rest) = value.strip_prefix("MTTS") {
            let rest = rest.trim();
            if let Ok(mask) = rest.parse::<u16>() {
                for (bit, capability) in MTTS {
                    if mask & bit > 0 {
                        capability.apply(caps);
                    }
                }
            } else if !rest.is_empty() {
                // Some clients send an erroneous MTTS token instead of a
                // number; record it as-is.
                caps.extra.push(rest.to_uppercase());
            }
        } else if !value.is_empty() {
            caps.extra.push(value.to_uppercase());
        }
    }
}
