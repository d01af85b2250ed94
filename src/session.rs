use bytes::{Bytes, BytesMut};
use serde_json::{Map, Value as JsonValue};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::{
    compression::{InboundDecompressor, OutboundCompressor},
    constants::{CRLF, GA, IAC, NOP},
    error::ProtocolError,
    event::TelnetEvent,
    gmcp, msdp,
    negotiation::{CompressionSignal, EngineOutput, NegotiationEngine, SessionEvent},
    registry::SupportedOptions,
    subnegotiation::SubnegotiationType,
    TelnetCodec,
};

/// Inbound lines longer than this are truncated rather than split.
const MAX_LINE_LENGTH: usize = 4096;

/// One field of a combined [`Session::send`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SendField {
    Text(String),
    Prompt(String),
    Oob { command: String, args: Vec<JsonValue>, kwargs: Map<String, JsonValue> },
}

/// One Telnet session: the codec, the negotiation engine, both compression
/// streams, and the outbound byte queue, glued into a single synchronous
/// state machine.
///
/// Raw network reads go in through [`receive`](Self::receive); everything the
/// peer should see accumulates in the outbound queue and is taken with
/// [`drain_outbound`](Self::drain_outbound). The [`driver`](crate::driver)
/// module wires both ends to a Tokio transport.
#[derive(Debug)]
pub struct Session {
    codec: TelnetCodec,
    engine: NegotiationEngine,
    inbound: BytesMut,
    outbound: BytesMut,
    compressor: Option<OutboundCompressor>,
    decompressor: Option<InboundDecompressor>,
    closed: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_supported(SupportedOptions::default())
    }

    pub fn with_supported(supported: SupportedOptions) -> Self {
        Self {
            codec: TelnetCodec::new(MAX_LINE_LENGTH),
            engine: NegotiationEngine::new(supported),
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            compressor: None,
            decompressor: None,
            closed: false,
        }
    }

    pub fn capabilities(&self) -> &crate::capability::ProtocolCapabilities {
        &self.engine.caps
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Takes everything queued for the peer since the last drain.
    pub fn drain_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    /// Opens negotiation with the peer. Call once, before any reads.
    pub fn start(&mut self) -> Result<Vec<SessionEvent>, ProtocolError> {
        let outputs = self.engine.start();
        self.process(outputs)
    }

    /// Feeds one raw network read through decompression, the codec, and the
    /// negotiation engine, queueing any replies and returning the decoded
    /// application events in order.
    ///
    /// A compression error is fatal; the caller must close the session.
    pub fn receive(&mut self, raw: &[u8]) -> Result<Vec<SessionEvent>, ProtocolError> {
        if self.closed {
            return Ok(Vec::new());
        }

        match &mut self.decompressor {
            Some(decompressor) => {
                let inflated = decompressor.decompress(raw)?;
                self.inbound.extend_from_slice(&inflated);
            }
            None => self.inbound.extend_from_slice(raw),
        }

        let mut events = Vec::new();

        while let Some(event) = self.codec.decode(&mut self.inbound)? {
            let outputs = self.engine.handle(event);
            events.extend(self.process(outputs)?);
        }

        Ok(events)
    }

    /// Queues one line of game text. The line is IAC-escaped and CRLF
    /// delimited; under forced endline a delimiter is appended even when the
    /// text already carries one.
    pub fn send_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }

        let mut frame = BytesMut::new();
        crate::put_escaped(&mut frame, text.as_bytes());

        if self.engine.caps.forced_endline || !frame.ends_with(CRLF) {
            frame.extend(CRLF);
        }

        self.write_payload(&frame)
    }

    /// Queues a prompt: no line delimiter, followed by IAC GA so clients can
    /// tell it apart from ordinary text. The GA rides outside the compressed
    /// stream, like all protocol signaling.
    pub fn send_prompt(&mut self, prompt: &str) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }

        let mut frame = BytesMut::new();
        crate::put_escaped(&mut frame, prompt.as_bytes());
        self.write_payload(&frame)?;

        self.outbound.extend([IAC, GA]);
        Ok(())
    }

    /// Queues an out-of-band command over every structured-data protocol the
    /// client negotiated. A client with neither GMCP nor MSDP gets nothing.
    pub fn send_oob(
        &mut self,
        command: &str,
        args: &[JsonValue],
        kwargs: &Map<String, JsonValue>,
    ) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }

        if self.engine.caps.gmcp {
            let body = gmcp::encode(command, args, kwargs);
            self.write_frame(TelnetEvent::Subnegotiate(SubnegotiationType::Generic(body)))?;
        }

        if self.engine.caps.msdp {
            let body = msdp::encode_command(command, args, kwargs);
            self.write_frame(TelnetEvent::Subnegotiate(SubnegotiationType::ServerData(body)))?;
        }

        Ok(())
    }

    /// Queues a batch of fields in order through the same pipeline the
    /// individual send methods use.
    pub fn send(&mut self, fields: &[SendField]) -> Result<(), ProtocolError> {
        for field in fields {
            match field {
                SendField::Text(text) => self.send_text(text)?,
                SendField::Prompt(prompt) => self.send_prompt(prompt)?,
                SendField::Oob { command, args, kwargs } => {
                    self.send_oob(command, args, kwargs)?;
                }
            }
        }

        Ok(())
    }

    /// Queues an MSSP status table, if the client asked for one.
    pub fn send_server_status(&mut self, pairs: Vec<(Bytes, Bytes)>) -> Result<(), ProtocolError> {
        if self.closed || !self.engine.caps.mssp {
            return Ok(());
        }

        self.write_frame(TelnetEvent::Subnegotiate(SubnegotiationType::ServerStatus(pairs)))
    }

    /// Queues a NOP keepalive, unless the client opted out. Always plaintext;
    /// a keepalive must survive even a wedged compression stream.
    pub fn keepalive(&mut self) {
        if self.closed || !self.engine.caps.nop_keepalive {
            return;
        }

        self.outbound.extend([IAC, NOP]);
    }

    pub fn toggle_nop_keepalive(&mut self) {
        self.engine.caps.nop_keepalive = !self.engine.caps.nop_keepalive;
    }

    /// Shuts the session down: terminates the outbound compression stream so
    /// the client's decompressor sees a clean end, releases both streams, and
    /// discards any partially accumulated input. Idempotent; all later sends
    /// and reads are ignored.
    pub fn close(&mut self) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut compressor) = self.compressor.take() {
            let tail = compressor.finish()?;
            self.outbound.extend_from_slice(&tail);
        }

        self.decompressor = None;
        self.inbound.clear();
        Ok(())
    }

    fn process(&mut self, outputs: Vec<EngineOutput>) -> Result<Vec<SessionEvent>, ProtocolError> {
        let mut events = Vec::new();

        for output in outputs {
            match output {
                // Negotiation replies are wire signaling and bypass the
                // compressed stream.
                EngineOutput::Reply(event) => self.codec.encode(event, &mut self.outbound)?,
                EngineOutput::Event(event) => events.push(event),
                EngineOutput::Signal(signal) => self.handle_signal(signal)?,
            }
        }

        Ok(events)
    }

    fn handle_signal(&mut self, signal: CompressionSignal) -> Result<(), ProtocolError> {
        match signal {
            CompressionSignal::BeginOutbound => {
                // The start frame itself is plaintext; the compressed stream
                // begins with the very next payload byte.
                self.codec.encode(
                    TelnetEvent::Subnegotiate(SubnegotiationType::BeginCompression),
                    &mut self.outbound,
                )?;
                self.compressor = Some(OutboundCompressor::new());
                debug!("outbound compression started");
            }
            CompressionSignal::EndOutbound => {
                if let Some(mut compressor) = self.compressor.take() {
                    let tail = compressor.finish()?;
                    self.outbound.extend_from_slice(&tail);
                    debug!("outbound compression stopped");
                }
            }
            CompressionSignal::BeginInbound => {
                let mut decompressor = InboundDecompressor::new();

                // Bytes already buffered past the start frame arrived
                // compressed; inflate them in place before decoding resumes.
                let pending = self.inbound.split();
                if !pending.is_empty() {
                    let inflated = decompressor.decompress(&pending)?;
                    self.inbound.extend_from_slice(&inflated);
                }

                self.decompressor = Some(decompressor);
            }
            CompressionSignal::EndInbound => {
                self.decompressor = None;
            }
        }

        Ok(())
    }

    /// Encodes a typed frame and routes it through the payload pipeline.
    fn write_frame(&mut self, event: TelnetEvent) -> Result<(), ProtocolError> {
        let mut frame = BytesMut::new();
        self.codec.encode(event, &mut frame)?;
        self.write_payload(&frame)
    }

    /// Appends payload bytes to the outbound queue, through the compressor
    /// when one is active. Each call ends on a sync-flush boundary, so the
    /// client can decode it without waiting for more output.
    fn write_payload(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        match &mut self.compressor {
            Some(compressor) => {
                let block = compressor.compress(frame)?;
                self.outbound.extend_from_slice(&block);
            }
            None => self.outbound.extend_from_slice(frame),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DO, DONT, GMCP, LINEMODE, MCCP2, MCCP3, SB, SE, TTYPE, WILL};
    use serde_json::json;

    fn started_session() -> Session {
        let mut session = Session::new();
        session.start().unwrap();
        session.drain_outbound();
        session
    }

    #[test]
    fn test_start_queues_negotiation() {
        let mut session = Session::new();
        session.start().unwrap();
        let wire = session.drain_outbound();

        assert_eq!(&wire[..3], &[IAC, DONT, LINEMODE]);
        assert!(wire.windows(3).any(|w| w == [IAC, WILL, MCCP2]));
        assert!(wire.windows(3).any(|w| w == [IAC, WILL, GMCP]));
    }

    #[test]
    fn test_send_text_forced_endline() {
        let mut session = started_session();

        session.send_text("hello").unwrap();
        assert_eq!(&session.drain_outbound()[..], b"hello\r\n");

        // Forced endline appends a delimiter even to a terminated line.
        session.send_text("hello\r\n").unwrap();
        assert_eq!(&session.drain_outbound()[..], b"hello\r\n\r\n");
    }

    #[test]
    fn test_send_text_without_forced_endline() {
        let mut session = started_session();
        session.engine.caps.forced_endline = false;

        session.send_text("hello\r\n").unwrap();
        assert_eq!(&session.drain_outbound()[..], b"hello\r\n");

        session.send_text("hello").unwrap();
        assert_eq!(&session.drain_outbound()[..], b"hello\r\n");
    }

    #[test]
    fn test_send_prompt_ends_with_go_ahead() {
        let mut session = started_session();
        session.send_prompt("HP 10> ").unwrap();

        let wire = session.drain_outbound();
        assert!(wire.starts_with(b"HP 10> "));
        assert!(wire.ends_with(&[IAC, GA]));
        assert!(!wire.windows(2).any(|w| w == CRLF));
    }

    #[test]
    fn test_mccp2_marker_then_compressed_payload() {
        let mut session = started_session();
        session.receive(&[IAC, DO, MCCP2]).unwrap();

        let wire = session.drain_outbound();
        assert_eq!(&wire[..], &[IAC, SB, MCCP2, IAC, SE]);

        session.send_text("hello").unwrap();
        let block = session.drain_outbound();
        assert_ne!(&block[..], b"hello\r\n");

        let mut decompressor = InboundDecompressor::new();
        assert_eq!(decompressor.decompress(&block).unwrap(), b"hello\r\n");
    }

    #[test]
    fn test_peer_will_mccp2_leaves_output_plaintext() {
        let mut session = started_session();
        session.receive(&[IAC, WILL, MCCP2]).unwrap();

        // A DO reply, no start frame.
        assert_eq!(&session.drain_outbound()[..], &[IAC, DO, MCCP2]);

        session.send_text("hello").unwrap();
        assert_eq!(&session.drain_outbound()[..], b"hello\r\n");
    }

    #[test]
    fn test_keepalive_stays_plaintext_under_compression() {
        let mut session = started_session();
        session.receive(&[IAC, DO, MCCP2]).unwrap();
        session.drain_outbound();

        session.keepalive();
        assert_eq!(&session.drain_outbound()[..], &[IAC, NOP]);
    }

    #[test]
    fn test_keepalive_toggle() {
        let mut session = started_session();
        session.keepalive();
        assert_eq!(&session.drain_outbound()[..], &[IAC, NOP]);

        session.toggle_nop_keepalive();
        session.keepalive();
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_close_flushes_compression_and_drops_sends() {
        let mut session = started_session();
        session.receive(&[IAC, DO, MCCP2]).unwrap();
        session.send_text("goodbye").unwrap();
        session.close().unwrap();

        let wire = session.drain_outbound();
        // Marker, compressed payload, final flush.
        assert_eq!(&wire[..5], &[IAC, SB, MCCP2, IAC, SE]);
        let mut decompressor = InboundDecompressor::new();
        assert_eq!(decompressor.decompress(&wire[5..]).unwrap(), b"goodbye\r\n");

        assert!(session.is_closed());
        session.send_text("after close").unwrap();
        assert!(session.drain_outbound().is_empty());
        assert!(session.receive(b"ignored\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_mccp3_inflates_same_read_remainder() {
        let mut session = started_session();
        session.receive(&[IAC, WILL, MCCP3]).unwrap();

        // The client's start frame and its first compressed bytes arrive in
        // one read.
        let mut client = OutboundCompressor::new();
        let compressed = client.compress(b"north\r\n").unwrap();

        let mut raw = vec![IAC, SB, MCCP3, IAC, SE];
        raw.extend_from_slice(&compressed);

        let events = session.receive(&raw).unwrap();
        assert_eq!(events, vec![SessionEvent::Line("north".to_string())]);
        assert!(session.capabilities().mccp3);
    }

    #[test]
    fn test_send_oob_over_gmcp() {
        let mut session = started_session();
        session.receive(&[IAC, DO, GMCP]).unwrap();
        session.drain_outbound();

        let mut kwargs = Map::new();
        kwargs.insert("hp".to_string(), json!(10));
        session.send_oob("monitor", &[], &kwargs).unwrap();

        let wire = session.drain_outbound();
        let mut expected = vec![IAC, SB, GMCP];
        expected.extend(br#"Char.Monitor.Update {"hp":10}"#);
        expected.extend([IAC, SE]);
        assert_eq!(&wire[..], &expected[..]);
    }

    #[test]
    fn test_send_combines_fields_in_order() {
        let mut session = started_session();
        session
            .send(&[
                SendField::Text("You are standing in a field.".to_string()),
                SendField::Prompt("> ".to_string()),
            ])
            .unwrap();

        let wire = session.drain_outbound();
        assert!(wire.starts_with(b"You are standing in a field.\r\n> "));
        assert!(wire.ends_with(&[IAC, GA]));
    }

    #[test]
    fn test_send_oob_without_protocol_is_silent() {
        let mut session = started_session();
        session.send_oob("monitor", &[], &Map::new()).unwrap();
        assert!(session.drain_outbound().is_empty());
    }

    #[test]
    fn test_ttype_handshake_end_to_end() {
        let mut session = started_session();
        session.receive(&[IAC, DO, TTYPE]).unwrap();

        // The engine asks for the first terminal type.
        assert_eq!(&session.drain_outbound()[..], &[IAC, SB, TTYPE, 1, IAC, SE]);

        let step = |session: &mut Session, name: &[u8]| {
            let mut raw = vec![IAC, SB, TTYPE, 0];
            raw.extend_from_slice(name);
            raw.extend([IAC, SE]);
            session.receive(&raw).unwrap()
        };

        step(&mut session, b"MUDLET 4.10");
        step(&mut session, b"xterm-256color");
        let events = step(&mut session, b"MTTS 13");

        assert_eq!(events.len(), 1);
        let SessionEvent::HandshakeComplete(caps) = &events[0] else {
            panic!("expected handshake completion");
        };
        assert!(caps.ttype_done);
        assert!(caps.xterm256);
        assert_eq!(caps.client_name, "MUDLET 4.10");
    }

    #[test]
    fn test_over_length_line_does_not_wedge_input() {
        let mut session = started_session();

        let mut raw = vec![b'x'; 5000];
        raw.extend(b"\r\n");
        assert!(session.receive(&raw).unwrap().is_empty());

        let events = session.receive(b"look\r\n").unwrap();
        assert_eq!(events, vec![SessionEvent::Line("look".to_string())]);
    }

    #[test]
    fn test_line_and_negotiation_interleaved() {
        let mut session = started_session();

        let mut raw = Vec::new();
        raw.extend([IAC, DO, crate::constants::SGA]);
        raw.extend(b"look\r\n");

        let events = session.receive(&raw).unwrap();
        assert_eq!(events, vec![SessionEvent::Line("look".to_string())]);
        assert!(session.capabilities().suppress_go_ahead);
    }
}
