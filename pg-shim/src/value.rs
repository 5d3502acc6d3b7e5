//! Dynamic value type and the parameter-slot representation (spec.md
//! Data Model: "Statement object" / §4.4 Bind / §4.5 Result Adapter).

use postgres::types::{IsNull, ToSql, Type};
use smallvec::SmallVec;
use std::error::Error;

/// SQLite's fundamental datatypes, used both for `column_type`/`value_type`
/// results and to tag a parameter slot's binary/text-format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqliteType {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

/// Number of parameter slots every statement is guaranteed to have
/// (spec.md Data Model: "at least 64").
pub const MIN_PARAM_SLOTS: usize = 64;

/// A single bound parameter value, captured by a `bind_*` call.
///
/// Distinguishes numeric bindings (held inline, no heap allocation beyond
/// the enum itself) from text/blob bindings (an owned, separately
/// allocated buffer) per spec.md Data Model's invariant about
/// distinguishing the two for safe release.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Int(i64),
    Double(f64),
    /// Owned text; `strdup`-equivalent in the C original.
    Text(String),
    /// Owned bytes; `memcpy`-equivalent in the C original.
    Blob(SmallVec<[u8; 32]>),
}

impl ParamValue {
    /// Text-format wire representation suitable for the server's
    /// extended-query `EXECUTE` parameter list. `None` only for `Null`.
    pub fn as_wire_text(&self) -> Option<String> {
        match self {
            ParamValue::Null => None,
            ParamValue::Int(i) => Some(i.to_string()),
            ParamValue::Double(d) => Some(format!("{d}")),
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Blob(b) => Some(hex_encode_bytea(b)),
        }
    }
}

pub fn hex_encode_bytea(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("\\x");
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// 256-entry nibble lookup table for decoding a `\x...`-format BYTEA
/// literal without `sscanf` (spec.md §4.5). `0xFF` marks an invalid digit.
pub const HEX_NIBBLE: [u8; 256] = build_hex_nibble_table();

const fn build_hex_nibble_table() -> [u8; 256] {
    let mut table = [0xFFu8; 256];
    let mut c = b'0';
    while c <= b'9' {
        table[c as usize] = c - b'0';
        c += 1;
    }
    let mut c = b'a';
    while c <= b'f' {
        table[c as usize] = c - b'a' + 10;
        c += 1;
    }
    let mut c = b'A';
    while c <= b'F' {
        table[c as usize] = c - b'A' + 10;
        c += 1;
    }
    table
}

/// Decode a Postgres `\x`-prefixed hex BYTEA textual representation.
/// Returns an empty vec for malformed input rather than panicking
/// (spec.md §4.5/§7: bounds- and input-safety, never crash the host).
pub fn decode_bytea_hex(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || &bytes[0..2] != b"\\x" {
        return Vec::new();
    }
    let hex = &bytes[2..];
    let mut out = Vec::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i + 1 < hex.len() {
        let hi = HEX_NIBBLE[hex[i] as usize];
        let lo = HEX_NIBBLE[hex[i + 1] as usize];
        if hi == 0xFF || lo == 0xFF {
            break;
        }
        out.push((hi << 4) | lo);
        i += 2;
    }
    out
}

/// Wire-transport wrapper sending every bound parameter in Postgres's text
/// format (spec.md §6: "text-format parameter transport"). `postgres`'s
/// client-side `ToSql::accepts` check normally requires the Rust value's
/// type to match the parameter's inferred server-side OID exactly, which
/// the shim cannot know ahead of `PREPARE` for arbitrary host SQL;
/// `accepts` is overridden to accept any type and `encode_format` to
/// request text framing, the same override shape used for a dynamically-
/// typed parameter enum elsewhere in the corpus (see
/// `themixednuts-drizzle-rs/postgres/src/values.rs`'s `PostgresValue`
/// `ToSql` impl). The server parses the text bytes against whatever type
/// it already inferred, exactly as libpq's text-mode protocol does.
pub struct WireText(pub Option<String>);

impl ToSql for WireText {
    fn to_sql(&self, _ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.0 {
            None => Ok(IsNull::Yes),
            Some(s) => {
                out.extend_from_slice(s.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool
    where
        Self: Sized,
    {
        true
    }

    fn encode_format(&self, _ty: &Type) -> postgres::types::Format {
        postgres::types::Format::Text
    }

    postgres::types::to_sql_checked!();
}

/// Server boolean text format coercion (spec.md §4.5/§7 TYPE_MISMATCH):
/// `'t'`/`'f'` map to `1`/`0` for integer accessors.
pub fn coerce_bool_text(text: &str) -> Option<i64> {
    match text {
        "t" => Some(1),
        "f" => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytea_round_trip() {
        let original = vec![0x00u8, 0xFF, 0x7F];
        let hex = hex_encode_bytea(&original);
        let decoded = decode_bytea_hex(&hex);
        assert_eq!(decoded, original);
    }

    #[test]
    fn malformed_bytea_does_not_panic() {
        assert_eq!(decode_bytea_hex("not hex"), Vec::<u8>::new());
        assert_eq!(decode_bytea_hex(""), Vec::<u8>::new());
        assert_eq!(decode_bytea_hex("\\x"), Vec::<u8>::new());
    }

    #[test]
    fn wire_text_accepts_any_server_type() {
        assert!(<WireText as ToSql>::accepts(&Type::INT4));
        assert!(<WireText as ToSql>::accepts(&Type::BOOL));
        assert!(<WireText as ToSql>::accepts(&Type::TEXT));
    }

    #[test]
    fn wire_text_requests_text_framing() {
        let w = WireText(Some("42".to_string()));
        assert_eq!(w.encode_format(&Type::INT4), postgres::types::Format::Text);
    }

    #[test]
    fn wire_text_writes_raw_bytes_and_null() {
        let mut out = bytes::BytesMut::new();
        let present = WireText(Some("hello".to_string()));
        let is_null = present.to_sql(&Type::TEXT, &mut out).unwrap();
        assert_eq!(is_null, IsNull::No);
        assert_eq!(&out[..], b"hello");

        let mut out = bytes::BytesMut::new();
        let absent = WireText(None);
        let is_null = absent.to_sql(&Type::TEXT, &mut out).unwrap();
        assert_eq!(is_null, IsNull::Yes);
        assert!(out.is_empty());
    }

    #[test]
    fn boolean_text_coercion() {
        assert_eq!(coerce_bool_text("t"), Some(1));
        assert_eq!(coerce_bool_text("f"), Some(0));
        assert_eq!(coerce_bool_text("x"), None);
    }
}
