use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};

use crate::error::ProtocolError;

/// Canonical dispatcher command names and their GMCP package equivalents, for
/// the fixed set of session-management commands the engine understands.
const COMMAND_MAP: &[(&str, &str)] = &[
    ("client_options", "Core.Supports.Get"),
    ("get_inputfuncs", "Core.Commands.Get"),
    ("get_value", "Char.Value.Get"),
    ("repeat", "Char.Repeat.Update"),
    ("monitor", "Char.Monitor.Update"),
];

/// Maps a dispatcher command name to its GMCP package name. Unmapped commands
/// pass through unchanged.
pub fn package_for(command: &str) -> &str {
    COMMAND_MAP
        .iter()
        .find(|(cmd, _)| *cmd == command)
        .map(|(_, package)| *package)
        .unwrap_or(command)
}

/// Maps a GMCP package name back to its canonical dispatcher command name.
pub fn command_for(package: &str) -> &str {
    COMMAND_MAP
        .iter()
        .find(|(_, pkg)| pkg.eq_ignore_ascii_case(package))
        .map(|(cmd, _)| *cmd)
        .unwrap_or(package)
}

/// Encodes a GMCP message body: the package name, a space, and one JSON
/// payload. An array of positional arguments, an object of keyword arguments,
/// a bare scalar for a single argument, or no payload at all.
pub fn encode(command: &str, args: &[JsonValue], kwargs: &Map<String, JsonValue>) -> Bytes {
    let package = package_for(command);

    let payload = match (args.len(), kwargs.is_empty()) {
        (0, true) => None,
        (0, false) => Some(JsonValue::Object(kwargs.clone())),
        (1, true) if !matches!(args[0], JsonValue::Array(_) | JsonValue::Object(_)) => {
            Some(args[0].clone())
        }
        _ => {
            let mut values = args.to_vec();
            if !kwargs.is_empty() {
                values.push(JsonValue::Object(kwargs.clone()));
            }
            Some(JsonValue::Array(values))
        }
    };

    match payload {
        Some(value) => Bytes::from(format!("{package} {value}")),
        None => Bytes::from(package.as_bytes().to_vec()),
    }
}

/// Decodes a GMCP message body into `(command, args, kwargs)`.
///
/// The package name runs up to the first space; the remainder, if any, must be
/// valid JSON. Objects become keyword arguments, arrays positional arguments,
/// anything else a single positional argument.
pub fn decode(payload: &[u8]) -> Result<(String, Vec<JsonValue>, Map<String, JsonValue>), ProtocolError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| ProtocolError::OutOfBand("GMCP payload is not valid UTF-8".into()))?
        .trim();

    if text.is_empty() {
        return Err(ProtocolError::OutOfBand("empty GMCP payload".into()));
    }

    let (package, rest) = match text.split_once(' ') {
        Some((package, rest)) => (package, rest.trim()),
        None => (text, ""),
    };

    let command = command_for(package).to_string();

    if rest.is_empty() {
        return Ok((command, Vec::new(), Map::new()));
    }

    let value: JsonValue = serde_json::from_str(rest)
        .map_err(|e| ProtocolError::OutOfBand(format!("bad GMCP JSON for {package}: {e}")))?;

    Ok(match value {
        JsonValue::Object(map) => (command, Vec::new(), map),
        JsonValue::Array(values) => (command, values, Map::new()),
        other => (command, vec![other], Map::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_core_supports() {
        let (command, args, kwargs) =
            decode(br#"Core.Supports.Get ["Char 1", "Room 1"]"#).unwrap();
        assert_eq!(command, "client_options");
        assert_eq!(args, vec![json!("Char 1"), json!("Room 1")]);
        assert!(kwargs.is_empty());
    }

    #[test]
    fn test_decode_object_payload() {
        let (command, args, kwargs) = decode(br#"Char.Repeat.Update {"count": 3}"#).unwrap();
        assert_eq!(command, "repeat");
        assert!(args.is_empty());
        assert_eq!(kwargs.get("count"), Some(&json!(3)));
    }

    #[test]
    fn test_decode_bare_package() {
        let (command, args, kwargs) = decode(b"Core.Commands.Get").unwrap();
        assert_eq!(command, "get_inputfuncs");
        assert!(args.is_empty());
        assert!(kwargs.is_empty());
    }

    #[test]
    fn test_decode_unmapped_package_passes_through() {
        let (command, args, _) = decode(br#"Char.Login {"name": "ays"}"#).unwrap();
        assert_eq!(command, "Char.Login");
        assert!(args.is_empty());
    }

    #[test]
    fn test_decode_bad_json_is_an_error() {
        assert!(decode(br#"Core.Supports.Get {"unterminated"#).is_err());
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut kwargs = Map::new();
        kwargs.insert("hp".to_string(), json!(42));

        let encoded = encode("monitor", &[], &kwargs);
        assert!(encoded.starts_with(b"Char.Monitor.Update "));

        let (command, args, decoded_kwargs) = decode(&encoded).unwrap();
        assert_eq!(command, "monitor");
        assert!(args.is_empty());
        assert_eq!(decoded_kwargs, kwargs);
    }

    #[test]
    fn test_encode_scalar_argument() {
        let encoded = encode("get_value", &[json!("hp")], &Map::new());
        assert_eq!(&encoded[..], br#"Char.Value.Get "hp""#);
    }

    #[test]
    fn test_command_name_mapping_is_case_insensitive_inbound() {
        assert_eq!(command_for("core.supports.get"), "client_options");
        assert_eq!(package_for("client_options"), "Core.Supports.Get");
    }
}
