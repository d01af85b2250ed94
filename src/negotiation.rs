use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::{
    capability::ProtocolCapabilities,
    event::TelnetEvent,
    gmcp, msdp,
    msdp::MsdpValue,
    naws,
    option::TelnetOption,
    registry::{self, OptionDecoder, SupportedOptions, NEGOTIATE_ORDER},
    subnegotiation::SubnegotiationType,
    ttype::{TtypeHandshake, TtypeOutcome},
};

/// Events delivered to the game's command dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// One delimited line of application data.
    Line(String),
    /// A decoded out-of-band command.
    Command { kind: String, args: Vec<JsonValue>, kwargs: Map<String, JsonValue> },
    /// Fires exactly once, when the TTYPE handshake completes, with the
    /// capability snapshot at that moment.
    HandshakeComplete(ProtocolCapabilities),
}

/// What the engine wants done in response to an inbound event. Replies go to
/// the peer (plaintext, outside the compressed stream), events to the
/// dispatcher, signals to the session's compression streams.
#[derive(Debug, PartialEq)]
pub enum EngineOutput {
    Reply(TelnetEvent),
    Event(SessionEvent),
    Signal(CompressionSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionSignal {
    /// Write the MCCP2 start frame, then compress everything after it.
    BeginOutbound,
    /// Emit the final flush and release the compressor.
    EndOutbound,
    /// Inflate every raw read from here on.
    BeginInbound,
    /// Release the decompressor.
    EndInbound,
}

/// Negotiation state for one (session, option) pair.
///
/// A pending flag is set only between issuing a request and receiving the
/// peer's reply; an option is active only after a completed WILL/DO exchange.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptionState {
    /// We are performing the option.
    pub local: bool,
    /// The peer is performing the option.
    pub remote: bool,
    pub pending_local: bool,
    pub pending_remote: bool,
}

/// The IAC-stream dispatcher: tracks WILL/WONT/DO/DONT state per option,
/// routes subnegotiation payloads to their registered decoders, and runs the
/// extension handshakes. One engine per session; never shared.
#[derive(Debug)]
pub struct NegotiationEngine {
    supported: SupportedOptions,
    states: HashMap<TelnetOption, OptionState>,
    ttype: TtypeHandshake,
    ttype_requested: bool,
    handshake_notified: bool,
    pub caps: ProtocolCapabilities,
}

impl NegotiationEngine {
    pub fn new(supported: SupportedOptions) -> Self {
        registry::validate_registry();

        Self {
            supported,
            states: HashMap::new(),
            ttype: TtypeHandshake::new(),
            ttype_requested: false,
            handshake_notified: false,
            caps: ProtocolCapabilities::default(),
        }
    }

    pub fn option_state(&self, option: TelnetOption) -> OptionState {
        self.states.get(&option).copied().unwrap_or_default()
    }

    /// Opens negotiation: LINEMODE is declined outright, then WILL is issued
    /// for every supported extension in priority order so that compression
    /// negotiates before the heavier payload protocols start flowing.
    pub fn start(&mut self) -> Vec<EngineOutput> {
        let mut out = vec![EngineOutput::Reply(TelnetEvent::Dont(TelnetOption::Linemode))];

        for &option in NEGOTIATE_ORDER {
            if !self.supported.supports(option) {
                continue;
            }

            let mut state = self.option_state(option);
            state.pending_local = true;
            self.states.insert(option, state);

            out.push(EngineOutput::Reply(TelnetEvent::Will(option)));
        }

        out
    }

    pub fn handle(&mut self, event: TelnetEvent) -> Vec<EngineOutput> {
        match event {
            TelnetEvent::Message(line) => vec![EngineOutput::Event(SessionEvent::Line(line))],
            TelnetEvent::Do(option) => self.handle_do(option),
            TelnetEvent::Dont(option) => self.handle_dont(option),
            TelnetEvent::Will(option) => self.handle_will(option),
            TelnetEvent::Wont(option) => self.handle_wont(option),
            TelnetEvent::Subnegotiation(option, payload) => {
                self.handle_subnegotiation(option, &payload)
            }
            // Keepalives and prompts from the peer carry no state.
            TelnetEvent::Nop | TelnetEvent::GoAhead | TelnetEvent::Subnegotiate(_) => Vec::new(),
        }
    }

    fn handle_do(&mut self, option: TelnetOption) -> Vec<EngineOutput> {
        let mut state = self.option_state(option);

        if state.pending_local {
            state.pending_local = false;
            if state.local {
                self.states.insert(option, state);
                return Vec::new();
            }
            state.local = true;
            self.states.insert(option, state);
            debug!(?option, "option enabled (locally requested)");
            return self.on_enabled(option, true);
        }

        if state.local {
            // Already active; a repeated DO needs no acknowledgement.
            return Vec::new();
        }

        if self.supported.supports(option) {
            state.local = true;
            self.states.insert(option, state);
            debug!(?option, "option enabled (peer requested)");

            let mut out = vec![EngineOutput::Reply(TelnetEvent::Will(option))];
            out.extend(self.on_enabled(option, true));
            out
        } else {
            vec![EngineOutput::Reply(TelnetEvent::Wont(option))]
        }
    }

    fn handle_dont(&mut self, option: TelnetOption) -> Vec<EngineOutput> {
        let mut state = self.option_state(option);
        let was_active = state.local;

        // A refusal of a pending request is terminal: clear the flag and
        // never re-request automatically.
        state.local = false;
        state.pending_local = false;
        self.states.insert(option, state);

        if was_active {
            debug!(?option, "option disabled by peer");
            let mut out = vec![EngineOutput::Reply(TelnetEvent::Wont(option))];
            out.extend(self.on_disabled(option, true));
            out
        } else {
            debug!(?option, "option declined by peer");
            Vec::new()
        }
    }

    fn handle_will(&mut self, option: TelnetOption) -> Vec<EngineOutput> {
        let mut state = self.option_state(option);

        if state.pending_remote {
            state.pending_remote = false;
            if state.remote {
                self.states.insert(option, state);
                return Vec::new();
            }
            state.remote = true;
            self.states.insert(option, state);
            debug!(?option, "peer option enabled (locally requested)");
            return self.on_enabled(option, false);
        }

        if state.remote {
            return Vec::new();
        }

        if self.supported.supports(option) {
            state.remote = true;
            self.states.insert(option, state);
            debug!(?option, "peer option enabled");

            let mut out = vec![EngineOutput::Reply(TelnetEvent::Do(option))];
            out.extend(self.on_enabled(option, false));
            out
        } else {
            vec![EngineOutput::Reply(TelnetEvent::Dont(option))]
        }
    }

    fn handle_wont(&mut self, option: TelnetOption) -> Vec<EngineOutput> {
        let mut state = self.option_state(option);
        let was_active = state.remote;

        state.remote = false;
        state.pending_remote = false;
        self.states.insert(option, state);

        if was_active {
            debug!(?option, "peer option disabled");
            let mut out = vec![EngineOutput::Reply(TelnetEvent::Dont(option))];
            out.extend(self.on_disabled(option, false));
            out
        } else {
            Vec::new()
        }
    }

    /// Hook run when an option becomes active. `local` is true when our side
    /// of the option activated (a completed WILL/DO exchange we perform),
    /// false when the peer's side did.
    fn on_enabled(&mut self, option: TelnetOption, local: bool) -> Vec<EngineOutput> {
        match option {
            TelnetOption::SuppressGoAhead => {
                self.caps.suppress_go_ahead = true;
                Vec::new()
            }
            TelnetOption::Naws => {
                self.caps.naws = true;
                Vec::new()
            }
            TelnetOption::TerminalType => {
                if self.ttype_requested {
                    return Vec::new();
                }
                self.ttype_requested = true;
                vec![EngineOutput::Reply(TelnetEvent::Subnegotiate(
                    SubnegotiationType::TerminalTypeSend,
                ))]
            }
            TelnetOption::MCCP2 => {
                // Strictly the server-to-client stream: only the client's DO
                // commits it to decompressing our output. A peer WILL gets its
                // DO reply and nothing more.
                if !local || self.caps.mccp2 {
                    return Vec::new();
                }
                self.caps.mccp2 = true;
                vec![EngineOutput::Signal(CompressionSignal::BeginOutbound)]
            }
            // MCCP3 only starts once the client sends its start frame.
            TelnetOption::MCCP3 => Vec::new(),
            TelnetOption::MSSP => {
                self.caps.mssp = true;
                Vec::new()
            }
            TelnetOption::MSDP => {
                self.caps.msdp = true;
                Vec::new()
            }
            TelnetOption::GMCP => {
                self.caps.gmcp = true;
                Vec::new()
            }
            TelnetOption::MXP => {
                self.caps.mxp = true;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Hook run when an active option is switched off. `local` mirrors
    /// [`on_enabled`](Self::on_enabled).
    fn on_disabled(&mut self, option: TelnetOption, local: bool) -> Vec<EngineOutput> {
        match option {
            TelnetOption::SuppressGoAhead => {
                self.caps.suppress_go_ahead = false;
                Vec::new()
            }
            TelnetOption::Naws => {
                self.caps.naws = false;
                Vec::new()
            }
            TelnetOption::MCCP2 => {
                if !local || !self.caps.mccp2 {
                    return Vec::new();
                }
                self.caps.mccp2 = false;
                vec![EngineOutput::Signal(CompressionSignal::EndOutbound)]
            }
            TelnetOption::MCCP3 => {
                // The inbound stream belongs to the peer; only its WONT ends
                // it.
                if local || !self.caps.mccp3 {
                    return Vec::new();
                }
                self.caps.mccp3 = false;
                vec![EngineOutput::Signal(CompressionSignal::EndInbound)]
            }
            TelnetOption::MSSP => {
                self.caps.mssp = false;
                Vec::new()
            }
            TelnetOption::MSDP => {
                self.caps.msdp = false;
                Vec::new()
            }
            TelnetOption::GMCP => {
                self.caps.gmcp = false;
                Vec::new()
            }
            TelnetOption::MXP => {
                self.caps.mxp = false;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Routes a buffered subnegotiation payload to its registered decoder. A
    /// malformed payload is logged and dropped; the session continues.
    fn handle_subnegotiation(&mut self, option: TelnetOption, payload: &Bytes) -> Vec<EngineOutput> {
        let Some(decoder) = registry::decoder(option) else {
            debug!(?option, "no decoder registered for subnegotiation");
            return Vec::new();
        };

        match decoder {
            OptionDecoder::WindowSize => match naws::decode(payload) {
                Ok((width, height)) => {
                    self.caps.screen_width = width;
                    self.caps.screen_height = height;
                    debug!(width, height, "window size updated");
                    Vec::new()
                }
                Err(error) => {
                    warn!(%error, "discarding NAWS payload");
                    Vec::new()
                }
            },
            OptionDecoder::TerminalType => match self.ttype.receive(payload, &mut self.caps) {
                TtypeOutcome::RequestNext => vec![EngineOutput::Reply(TelnetEvent::Subnegotiate(
                    SubnegotiationType::TerminalTypeSend,
                ))],
                TtypeOutcome::Complete => {
                    if self.handshake_notified {
                        return Vec::new();
                    }
                    self.handshake_notified = true;
                    vec![EngineOutput::Event(SessionEvent::HandshakeComplete(self.caps.clone()))]
                }
                TtypeOutcome::Ignored => Vec::new(),
            },
            OptionDecoder::ServerData => match msdp::decode(payload) {
                Ok(pairs) => pairs
                    .into_iter()
                    .map(|(kind, value)| {
                        let (args, kwargs) = split_arguments(value);
                        EngineOutput::Event(SessionEvent::Command { kind, args, kwargs })
                    })
                    .collect(),
                Err(error) => {
                    warn!(%error, "discarding MSDP payload");
                    Vec::new()
                }
            },
            OptionDecoder::Generic => match gmcp::decode(payload) {
                Ok((kind, args, kwargs)) => {
                    vec![EngineOutput::Event(SessionEvent::Command { kind, args, kwargs })]
                }
                Err(error) => {
                    warn!(%error, "discarding GMCP payload");
                    Vec::new()
                }
            },
            OptionDecoder::InboundCompression => {
                if self.caps.mccp3 {
                    return Vec::new();
                }
                self.caps.mccp3 = true;
                debug!("inbound compression started");
                vec![EngineOutput::Signal(CompressionSignal::BeginInbound)]
            }
        }
    }
}

/// Maps a decoded MSDP value onto the dispatcher's positional/keyword split:
/// tables become keyword arguments, arrays positional, a scalar a single
/// positional argument.
fn split_arguments(value: MsdpValue) -> (Vec<JsonValue>, Map<String, JsonValue>) {
    match value {
        MsdpValue::Table(pairs) => {
            (Vec::new(), pairs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
        }
        MsdpValue::Array(values) => {
            (values.iter().map(MsdpValue::to_json).collect(), Map::new())
        }
        MsdpValue::Scalar(s) => (vec![JsonValue::String(s)], Map::new()),
    }
}
