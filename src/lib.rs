#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

// RFC 854 https://tools.ietf.org/html/rfc854

/// Per-connection capability flags negotiated over the lifetime of a session.
pub mod capability;
/// Per-session MCCP compression and decompression streams.
pub mod compression;
/// Various byte or byte sequences used in the Telnet protocol.
pub mod constants;
/// Tokio task gluing a session to a transport and the keepalive timer.
pub mod driver;
/// Codec and Io errors that may occur while processing Telnet events.
pub mod error;
/// Top-level Telnet events, such as Message, Do, Will, and Subnegotiation.
pub mod event;
/// GMCP out-of-band command codec.
pub mod gmcp;
/// MSDP structured variable/value/table/array codec.
pub mod msdp;
/// NAWS window-size decoding.
pub mod naws;
/// The option negotiation engine: per-option state and handshake dispatch.
pub mod negotiation;
/// Telnet options such as TerminalType, MCCP2, and GMCP.
pub mod option;
/// Static option support table, negotiation order, and decoder routing.
pub mod registry;
/// The session composer: outbound pipeline, keepalive, and close semantics.
pub mod session;
/// Telnet subnegotiation frames.
pub mod subnegotiation;
/// The TTYPE/MTTS terminal identification handshake.
pub mod ttype;

use std::mem;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::{
    constants::{
        CR, DO, DONT, GA, GMCP, IAC, LF, MCCP2, MSDP, MSSP, MSSP_VAL, MSSP_VAR, NOP, SB, SE,
        TTYPE, TTYPE_SEND, WILL, WONT,
    },
    error::ProtocolError,
    event::TelnetEvent,
    option::TelnetOption,
    subnegotiation::SubnegotiationType,
};

type Result<T> = std::result::Result<T, ProtocolError>;

/// Implements a Tokio codec for the Telnet protocol: IAC escape handling,
/// option negotiation verbs, subnegotiation framing, and CRLF line
/// accumulation. The codec is deliberately dumb about extension payloads;
/// interpreting them is the negotiation engine's job.
#[derive(Debug)]
pub struct TelnetCodec {
    max_buffer_length: usize,
    buffer: Vec<u8>,
    overflowed: bool,
}

impl TelnetCodec {
    #[must_use]
    pub fn new(max_buffer_length: usize) -> Self {
        TelnetCodec { max_buffer_length, buffer: Vec::new(), overflowed: false }
    }

    fn push_byte(&mut self, byte: u8) {
        // Input past the line cap is dropped, never split into a bogus line;
        // the whole oversized unit is discarded at its delimiter.
        if self.buffer.len() < self.max_buffer_length {
            self.buffer.push(byte);
        } else {
            self.overflowed = true;
        }
    }

    /// Scans for a complete `IAC SB option ... IAC SE` frame starting at the
    /// front of `src`. Returns `Ok(None)` when the frame is still partial.
    fn decode_subnegotiation(&mut self, src: &mut BytesMut) -> Result<Option<TelnetEvent>> {
        if src.len() < 3 {
            return Ok(None);
        }

        let option = TelnetOption::from(src[2]);
        let mut payload = Vec::new();
        let mut stray_command = false;
        let mut index = 3;

        loop {
            if index >= src.len() {
                if src.len() > self.max_buffer_length {
                    // Runaway frame with no terminator in sight; drop it
                    // rather than buffering forever.
                    warn!(?option, "discarding oversized subnegotiation");
                    src.advance(src.len());
                }
                return Ok(None);
            }

            if src[index] == IAC {
                if index + 1 >= src.len() {
                    return Ok(None);
                }

                match src[index + 1] {
                    SE => {
                        src.advance(index + 2);

                        if stray_command {
                            warn!(?option, "discarding subnegotiation with stray command byte");
                            return self.decode(src);
                        }

                        return Ok(Some(TelnetEvent::Subnegotiation(
                            option,
                            Bytes::from(payload),
                        )));
                    }
                    IAC => {
                        payload.push(IAC);
                        index += 2;
                    }
                    _ => {
                        stray_command = true;
                        index += 2;
                    }
                }
            } else {
                payload.push(src[index]);
                index += 1;
            }
        }
    }
}

impl Decoder for TelnetCodec {
    type Item = TelnetEvent;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        while !src.is_empty() {
            match src[0] {
                IAC => {
                    if src.len() < 2 {
                        return Ok(None);
                    }

                    match src[1] {
                        // An escaped literal 0xff in application data.
                        IAC => {
                            src.advance(2);
                            self.push_byte(IAC);
                        }
                        verb @ (WILL | WONT | DO | DONT) => {
                            if src.len() < 3 {
                                return Ok(None);
                            }

                            let option = TelnetOption::from(src[2]);
                            src.advance(3);

                            return Ok(Some(match verb {
                                WILL => TelnetEvent::Will(option),
                                WONT => TelnetEvent::Wont(option),
                                DO => TelnetEvent::Do(option),
                                _ => TelnetEvent::Dont(option),
                            }));
                        }
                        SB => return self.decode_subnegotiation(src),
                        NOP => {
                            src.advance(2);
                            return Ok(Some(TelnetEvent::Nop));
                        }
                        GA => {
                            src.advance(2);
                            return Ok(Some(TelnetEvent::GoAhead));
                        }
                        // Any other two-byte command is ignored.
                        _ => src.advance(2),
                    }
                }
                LF => {
                    src.advance(1);

                    if self.overflowed {
                        // The capped line already lost its CR, so this LF is
                        // its terminator. Drop the line, keep the stream.
                        warn!("discarding over-length input line");
                        self.buffer.clear();
                        self.overflowed = false;
                    } else if self.buffer.ends_with(&[CR]) {
                        let mut line = mem::take(&mut self.buffer);
                        line.pop();

                        let result = String::from_utf8_lossy(&line);
                        return Ok(Some(TelnetEvent::Message(result.to_string())));
                    } else {
                        self.push_byte(LF);
                    }
                }
                byte => {
                    src.advance(1);
                    self.push_byte(byte);
                }
            }
        }

        Ok(None)
    }
}

impl Encoder<TelnetEvent> for TelnetCodec {
    type Error = ProtocolError;

    fn encode(&mut self, event: TelnetEvent, buffer: &mut BytesMut) -> Result<()> {
        match event {
            TelnetEvent::Do(option) => encode_negotiate(DO, option, buffer),
            TelnetEvent::Dont(option) => encode_negotiate(DONT, option, buffer),
            TelnetEvent::Will(option) => encode_negotiate(WILL, option, buffer),
            TelnetEvent::Wont(option) => encode_negotiate(WONT, option, buffer),
            TelnetEvent::Subnegotiate(frame) => encode_subnegotiation(frame, buffer),
            TelnetEvent::Subnegotiation(option, bytes) => {
                encode_subnegotiation(SubnegotiationType::Unknown(option, bytes), buffer);
            }
            TelnetEvent::Message(msg) => encode_message(&msg, buffer),
            TelnetEvent::GoAhead => buffer.extend([IAC, GA]),
            TelnetEvent::Nop => buffer.extend([IAC, NOP]),
        }

        Ok(())
    }
}

fn encode_negotiate(verb: u8, option: TelnetOption, buffer: &mut BytesMut) {
    buffer.reserve(3);
    buffer.extend([IAC, verb, option.into()]);
}

fn encode_subnegotiation(frame: SubnegotiationType, buffer: &mut BytesMut) {
    match frame {
        SubnegotiationType::TerminalTypeSend => {
            buffer.extend([IAC, SB, TTYPE, TTYPE_SEND, IAC, SE]);
        }
        SubnegotiationType::BeginCompression => {
            buffer.extend([IAC, SB, MCCP2, IAC, SE]);
        }
        SubnegotiationType::ServerStatus(pairs) => {
            buffer.extend([IAC, SB, MSSP]);
            for (key, value) in &pairs {
                buffer.put_u8(MSSP_VAR);
                put_escaped(buffer, key);
                buffer.put_u8(MSSP_VAL);
                put_escaped(buffer, value);
            }
            buffer.extend([IAC, SE]);
        }
        SubnegotiationType::ServerData(bytes) => {
            buffer.extend([IAC, SB, MSDP]);
            put_escaped(buffer, &bytes);
            buffer.extend([IAC, SE]);
        }
        SubnegotiationType::Generic(bytes) => {
            buffer.extend([IAC, SB, GMCP]);
            put_escaped(buffer, &bytes);
            buffer.extend([IAC, SE]);
        }
        SubnegotiationType::Unknown(option, bytes) => {
            buffer.extend([IAC, SB, option.into()]);
            put_escaped(buffer, &bytes);
            buffer.extend([IAC, SE]);
        }
    }
}

fn encode_message(message: &str, buffer: &mut BytesMut) {
    put_escaped(buffer, message.as_bytes());

    if !buffer.ends_with(constants::CRLF) {
        buffer.extend(constants::CRLF);
    }
}

/// Writes `bytes` with every literal IAC doubled.
pub(crate) fn put_escaped(buffer: &mut BytesMut, bytes: &[u8]) {
    buffer.reserve(bytes.len());

    for byte in bytes {
        if *byte == IAC {
            buffer.extend([IAC, IAC]);
        } else {
            buffer.put_u8(*byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut TelnetCodec, bytes: &[u8]) -> Vec<TelnetEvent> {
        let mut src = BytesMut::from(bytes);
        let mut events = Vec::new();
        while let Ok(Some(event)) = codec.decode(&mut src) {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_decode_line() {
        let mut codec = TelnetCodec::new(1024);
        let events = decode_all(&mut codec, b"look north\r\n");
        assert_eq!(events, vec![TelnetEvent::Message("look north".to_string())]);
    }

    #[test]
    fn test_decode_partial_line_is_retained() {
        let mut codec = TelnetCodec::new(1024);
        assert!(decode_all(&mut codec, b"loo").is_empty());
        let events = decode_all(&mut codec, b"k\r\n");
        assert_eq!(events, vec![TelnetEvent::Message("look".to_string())]);
    }

    #[test]
    fn test_bare_lf_does_not_end_a_line() {
        let mut codec = TelnetCodec::new(1024);
        assert!(decode_all(&mut codec, b"look\n").is_empty());
        let events = decode_all(&mut codec, b"\r\n");
        assert_eq!(events, vec![TelnetEvent::Message("look\n".to_string())]);
    }

    #[test]
    fn test_decode_negotiation_verbs() {
        let mut codec = TelnetCodec::new(1024);
        let events = decode_all(
            &mut codec,
            &[IAC, WILL, constants::MCCP2, IAC, DONT, constants::LINEMODE, IAC, DO, 99],
        );
        assert_eq!(
            events,
            vec![
                TelnetEvent::Will(TelnetOption::MCCP2),
                TelnetEvent::Dont(TelnetOption::Linemode),
                TelnetEvent::Do(TelnetOption::Unknown(99)),
            ]
        );
    }

    #[test]
    fn test_decode_split_negotiation() {
        let mut codec = TelnetCodec::new(1024);
        let mut src = BytesMut::from(&[IAC, WILL][..]);
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend([constants::NAWS]);
        assert_eq!(codec.decode(&mut src).unwrap(), Some(TelnetEvent::Will(TelnetOption::Naws)));
    }

    #[test]
    fn test_decode_subnegotiation_payload() {
        let mut codec = TelnetCodec::new(1024);
        let events =
            decode_all(&mut codec, &[IAC, SB, constants::TTYPE, 0, b'M', b'C', IAC, SE]);
        assert_eq!(
            events,
            vec![TelnetEvent::Subnegotiation(
                TelnetOption::TerminalType,
                Bytes::from_static(&[0, b'M', b'C'])
            )]
        );
    }

    #[test]
    fn test_escaped_iac_round_trip() {
        // An escaped 0xff inside a subnegotiation payload survives
        // decode-then-encode unchanged.
        let payload = Bytes::from_static(&[1, IAC, 2]);
        let mut codec = TelnetCodec::new(1024);

        let mut wire = BytesMut::new();
        codec
            .encode(
                TelnetEvent::Subnegotiate(SubnegotiationType::Unknown(
                    TelnetOption::MSDP,
                    payload.clone(),
                )),
                &mut wire,
            )
            .unwrap();
        assert_eq!(&wire[..], &[IAC, SB, constants::MSDP, 1, IAC, IAC, 2, IAC, SE]);

        let events = decode_all(&mut codec, &wire);
        assert_eq!(events, vec![TelnetEvent::Subnegotiation(TelnetOption::MSDP, payload)]);
    }

    #[test]
    fn test_escaped_iac_in_line_data() {
        let mut codec = TelnetCodec::new(1024);
        let events = decode_all(&mut codec, &[b'a', IAC, IAC, b'b', CR, LF]);
        // 0xff is not valid UTF-8 on its own; it is preserved positionally as
        // the replacement character.
        assert_eq!(events, vec![TelnetEvent::Message("a\u{fffd}b".to_string())]);
    }

    #[test]
    fn test_partial_subnegotiation_is_retained() {
        let mut codec = TelnetCodec::new(1024);
        let mut src = BytesMut::from(&[IAC, SB, constants::GMCP, b'C', b'o'][..]);
        assert_eq!(codec.decode(&mut src).unwrap(), None);

        src.extend(b"re 1");
        src.extend([IAC, SE]);
        let event = codec.decode(&mut src).unwrap();
        assert!(matches!(event, Some(TelnetEvent::Subnegotiation(TelnetOption::GMCP, _))));
    }

    #[test]
    fn test_nop_and_ga_events() {
        let mut codec = TelnetCodec::new(1024);
        let events = decode_all(&mut codec, &[IAC, NOP, IAC, GA]);
        assert_eq!(events, vec![TelnetEvent::Nop, TelnetEvent::GoAhead]);
    }

    #[test]
    fn test_encode_message_appends_crlf() {
        let mut codec = TelnetCodec::new(1024);
        let mut buffer = BytesMut::new();
        codec.encode(TelnetEvent::Message("hello".to_string()), &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"hello\r\n");
    }

    #[test]
    fn test_encode_negotiate() {
        let mut codec = TelnetCodec::new(1024);
        let mut buffer = BytesMut::new();
        codec.encode(TelnetEvent::Will(TelnetOption::MCCP2), &mut buffer).unwrap();
        codec.encode(TelnetEvent::Dont(TelnetOption::Linemode), &mut buffer).unwrap();
        assert_eq!(&buffer[..], &[IAC, WILL, constants::MCCP2, IAC, DONT, constants::LINEMODE]);
    }

    #[test]
    fn test_encode_ttype_send() {
        let mut codec = TelnetCodec::new(1024);
        let mut buffer = BytesMut::new();
        codec
            .encode(TelnetEvent::Subnegotiate(SubnegotiationType::TerminalTypeSend), &mut buffer)
            .unwrap();
        assert_eq!(&buffer[..], &[IAC, SB, TTYPE, TTYPE_SEND, IAC, SE]);
    }

    #[test]
    fn test_encode_server_status() {
        let mut codec = TelnetCodec::new(1024);
        let mut buffer = BytesMut::new();
        codec
            .encode(
                TelnetEvent::Subnegotiate(SubnegotiationType::ServerStatus(vec![(
                    Bytes::from_static(b"PLAYERS"),
                    Bytes::from_static(b"52"),
                )])),
                &mut buffer,
            )
            .unwrap();

        let mut expected = vec![IAC, SB, MSSP, MSSP_VAR];
        expected.extend(b"PLAYERS");
        expected.push(MSSP_VAL);
        expected.extend(b"52");
        expected.extend([IAC, SE]);
        assert_eq!(&buffer[..], &expected[..]);
    }

    #[test]
    fn test_line_buffer_cap_drops_excess() {
        let mut codec = TelnetCodec::new(4);
        let events = decode_all(&mut codec, b"abcdefgh\r\n");
        // The over-length line is discarded whole, not truncated into a
        // bogus short line.
        assert!(events.is_empty());
    }

    #[test]
    fn test_line_decoding_survives_an_over_length_line() {
        let mut codec = TelnetCodec::new(4);

        let mut input = vec![b'x'; 9];
        input.extend(b"\r\n");
        input.extend(b"ok\r\n");

        let events = decode_all(&mut codec, &input);
        assert_eq!(events, vec![TelnetEvent::Message("ok".to_string())]);
    }
}
