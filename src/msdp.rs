use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::{
    constants::{
        MSDP_ARRAY_CLOSE, MSDP_ARRAY_OPEN, MSDP_TABLE_CLOSE, MSDP_TABLE_OPEN, MSDP_VAL, MSDP_VAR,
    },
    error::ProtocolError,
};

/// One MSDP value: a byte-string scalar, a nested key-value table, or an
/// ordered array. Tables and arrays nest arbitrarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsdpValue {
    Scalar(String),
    Table(Vec<(String, MsdpValue)>),
    Array(Vec<MsdpValue>),
}

impl MsdpValue {
    pub fn to_json(&self) -> JsonValue {
        match self {
            MsdpValue::Scalar(s) => JsonValue::String(s.clone()),
            MsdpValue::Table(pairs) => {
                let map: Map<String, JsonValue> =
                    pairs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                JsonValue::Object(map)
            }
            MsdpValue::Array(values) => {
                JsonValue::Array(values.iter().map(MsdpValue::to_json).collect())
            }
        }
    }

    pub fn from_json(value: &JsonValue) -> MsdpValue {
        match value {
            JsonValue::Object(map) => MsdpValue::Table(
                map.iter().map(|(k, v)| (k.clone(), MsdpValue::from_json(v))).collect(),
            ),
            JsonValue::Array(values) => {
                MsdpValue::Array(values.iter().map(MsdpValue::from_json).collect())
            }
            JsonValue::String(s) => MsdpValue::Scalar(s.clone()),
            JsonValue::Bool(b) => MsdpValue::Scalar(if *b { "1" } else { "0" }.to_string()),
            JsonValue::Null => MsdpValue::Scalar(String::new()),
            other => MsdpValue::Scalar(other.to_string()),
        }
    }
}

/// Decodes an MSDP subnegotiation payload into its top-level name/value pairs.
///
/// A pair with a malformed name (anything outside `\w`) or a structural error
/// is discarded with a warning and scanning resumes at the next variable
/// marker; an error is returned only when the payload produced nothing usable.
pub fn decode(payload: &[u8]) -> Result<Vec<(String, MsdpValue)>, ProtocolError> {
    let mut parser = Parser { bytes: payload, pos: 0 };
    let mut failed = false;

    let pairs = parser.pairs(None, &mut failed);

    if pairs.is_empty() && failed {
        return Err(ProtocolError::OutOfBand("unusable MSDP payload".into()));
    }

    Ok(pairs)
}

/// Encodes name/value pairs as MSDP marker bytes, the exact inverse of
/// [`decode`].
pub fn encode(pairs: &[(String, MsdpValue)]) -> Bytes {
    let mut buf = BytesMut::new();
    for (name, value) in pairs {
        buf.put_u8(MSDP_VAR);
        buf.extend_from_slice(name.as_bytes());
        buf.put_u8(MSDP_VAL);
        encode_value(&mut buf, value);
    }
    buf.freeze()
}

/// Encodes one outbound OOB command as a single MSDP pair named after the
/// command. Keyword arguments become a table, positional arguments an array
/// (a lone scalar stays bare); when both are present the keyword table is the
/// final array element.
pub fn encode_command(
    command: &str,
    args: &[JsonValue],
    kwargs: &Map<String, JsonValue>,
) -> Bytes {
    let value = match (args.len(), kwargs.is_empty()) {
        (0, true) => MsdpValue::Scalar(String::new()),
        (0, false) => MsdpValue::from_json(&JsonValue::Object(kwargs.clone())),
        (1, true) if !matches!(args[0], JsonValue::Array(_) | JsonValue::Object(_)) => {
            MsdpValue::from_json(&args[0])
        }
        _ => {
            let mut values: Vec<MsdpValue> = args.iter().map(MsdpValue::from_json).collect();
            if !kwargs.is_empty() {
                values.push(MsdpValue::from_json(&JsonValue::Object(kwargs.clone())));
            }
            MsdpValue::Array(values)
        }
    };

    encode(&[(command.to_string(), value)])
}

fn encode_value(buf: &mut BytesMut, value: &MsdpValue) {
    match value {
        MsdpValue::Scalar(s) => buf.extend_from_slice(s.as_bytes()),
        MsdpValue::Table(pairs) => {
            buf.put_u8(MSDP_TABLE_OPEN);
            for (name, value) in pairs {
                buf.put_u8(MSDP_VAR);
                buf.extend_from_slice(name.as_bytes());
                buf.put_u8(MSDP_VAL);
                encode_value(buf, value);
            }
            buf.put_u8(MSDP_TABLE_CLOSE);
        }
        MsdpValue::Array(values) => {
            buf.put_u8(MSDP_ARRAY_OPEN);
            for value in values {
                buf.put_u8(MSDP_VAL);
                encode_value(buf, value);
            }
            buf.put_u8(MSDP_ARRAY_CLOSE);
        }
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Parses name/value pairs until `close` (or end of input for the top
    /// level). Failed pairs are skipped in place.
    fn pairs(&mut self, close: Option<u8>, failed: &mut bool) -> Vec<(String, MsdpValue)> {
        let mut out = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    if close.is_some() {
                        // Unbalanced table; the caller discards this value.
                        *failed = true;
                    }
                    return out;
                }
                Some(b) if Some(b) == close => {
                    self.pos += 1;
                    return out;
                }
                Some(MSDP_VAR) => {
                    self.pos += 1;
                    match self.pair() {
                        Ok(pair) => out.push(pair),
                        Err(reason) => {
                            warn!(%reason, "discarding malformed MSDP pair");
                            *failed = true;
                            if self.resync(close) {
                                return out;
                            }
                        }
                    }
                }
                Some(other) => {
                    warn!(byte = other, "unexpected byte in MSDP stream");
                    *failed = true;
                    if self.resync(close) {
                        return out;
                    }
                }
            }
        }
    }

    /// Parses one `name VAL value` unit; the VAR marker is already consumed.
    fn pair(&mut self) -> Result<(String, MsdpValue), String> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b != MSDP_VAL) {
            self.pos += 1;
        }

        if self.peek() != Some(MSDP_VAL) {
            return Err("variable name without a value marker".into());
        }

        let raw = &self.bytes[start..self.pos];
        self.pos += 1;

        let name = String::from_utf8_lossy(raw).trim().to_string();
        if name.is_empty() || !name.bytes().all(is_word_byte) {
            return Err(format!("invalid variable name {name:?}"));
        }

        Ok((name, self.value()?))
    }

    fn value(&mut self) -> Result<MsdpValue, String> {
        self.skip_whitespace();
        match self.peek() {
            Some(MSDP_TABLE_OPEN) => {
                self.pos += 1;
                let mut failed = false;
                let pairs = self.pairs(Some(MSDP_TABLE_CLOSE), &mut failed);
                if failed {
                    return Err("malformed nested table".into());
                }
                Ok(MsdpValue::Table(pairs))
            }
            Some(MSDP_ARRAY_OPEN) => {
                self.pos += 1;
                self.array_values()
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if !is_structural(b)) {
                    self.pos += 1;
                }
                Ok(MsdpValue::Scalar(
                    String::from_utf8_lossy(&self.bytes[start..self.pos]).to_string(),
                ))
            }
        }
    }

    fn array_values(&mut self) -> Result<MsdpValue, String> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err("unterminated array".into()),
                Some(MSDP_ARRAY_CLOSE) => {
                    self.pos += 1;
                    return Ok(MsdpValue::Array(out));
                }
                Some(MSDP_VAL) => {
                    self.pos += 1;
                    out.push(self.value()?);
                }
                Some(_) => return Err("expected a value marker inside array".into()),
            }
        }
    }

    /// Skips forward to the next variable marker at the current nesting depth,
    /// or past the closing marker. Returns true when the close was consumed.
    fn resync(&mut self, close: Option<u8>) -> bool {
        let mut depth: usize = 0;
        while let Some(b) = self.peek() {
            match b {
                MSDP_TABLE_OPEN | MSDP_ARRAY_OPEN => depth += 1,
                MSDP_TABLE_CLOSE | MSDP_ARRAY_CLOSE if depth == 0 => {
                    self.pos += 1;
                    if Some(b) == close {
                        return true;
                    }
                    continue;
                }
                MSDP_TABLE_CLOSE | MSDP_ARRAY_CLOSE => depth -= 1,
                MSDP_VAR if depth == 0 => return false,
                _ => {}
            }
            self.pos += 1;
        }
        false
    }
}

fn is_structural(byte: u8) -> bool {
    matches!(
        byte,
        MSDP_VAR | MSDP_VAL | MSDP_TABLE_OPEN | MSDP_TABLE_CLOSE | MSDP_ARRAY_OPEN
            | MSDP_ARRAY_CLOSE
    )
}
