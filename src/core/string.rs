//! Fixed-width 64-byte string fields.
//!
//! On the wire a string is always exactly [`STRING_SIZE`] bytes, right-padded with spaces.
//! Decoding trims trailing spaces and NULs once, at decode time; afterwards the logical
//! length is carried explicitly. Bytes map one-to-one onto chars `U+0000..=U+00FF`, so any
//! byte content survives a decode/encode pass unchanged.

use std::fmt;

/// Width of every string field on the wire.
pub const STRING_SIZE: usize = 64;

/// A decoded string field: up to 64 content bytes and an explicit logical length.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedString {
    bytes: [u8; STRING_SIZE],
    len: usize,
}

impl FixedString {
    /// Decode a raw 64-byte field.
    pub fn from_wire(raw: &[u8; STRING_SIZE]) -> Self {
        let len = raw
            .iter()
            .rposition(|&c| c != 0 && c != b' ')
            .map_or(0, |last| last + 1);

        let mut bytes = [0u8; STRING_SIZE];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self { bytes, len }
    }

    /// Encode text into a 64-byte field: truncate to 64 bytes, `&` becomes `%`,
    /// remainder padded with spaces.
    pub fn encode(value: &str) -> [u8; STRING_SIZE] {
        let mut out = [b' '; STRING_SIZE];
        for (slot, c) in out.iter_mut().zip(value.chars()) {
            let byte = char_to_byte(c);
            *slot = if byte == b'&' { b'%' } else { byte };
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Logical content as text.
    pub fn to_text(&self) -> String {
        self.as_bytes().iter().map(|&b| char::from(b)).collect()
    }
}

impl Default for FixedString {
    fn default() -> Self {
        Self {
            bytes: [0u8; STRING_SIZE],
            len: 0,
        }
    }
}

impl fmt::Debug for FixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedString({:?})", self.to_text())
    }
}

impl fmt::Display for FixedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[inline]
fn char_to_byte(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}

/// Remove `&x` colour codes from a display name.
pub fn strip_colour_codes(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '&' {
            // drop the code character too
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Strip the trailing `+` some servers append to player names.
pub fn remove_end_plus(value: &str) -> &str {
    value.strip_suffix('+').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(text: &str) -> [u8; STRING_SIZE] {
        let mut raw = [b' '; STRING_SIZE];
        raw[..text.len()].copy_from_slice(text.as_bytes());
        raw
    }

    #[test]
    fn test_decode_trims_spaces_and_nuls() {
        let mut raw = wire("hello world");
        raw[20] = 0;
        let s = FixedString::from_wire(&raw);
        assert_eq!(s.to_text(), "hello world");
        assert_eq!(s.len(), 11);
    }

    #[test]
    fn test_decode_all_padding_is_empty() {
        assert!(FixedString::from_wire(&[b' '; STRING_SIZE]).is_empty());
        assert!(FixedString::from_wire(&[0u8; STRING_SIZE]).is_empty());
    }

    #[test]
    fn test_decode_keeps_interior_spaces() {
        let s = FixedString::from_wire(&wire("  a  b"));
        assert_eq!(s.to_text(), "  a  b");
    }

    #[test]
    fn test_encode_escapes_ampersand_and_pads() {
        let out = FixedString::encode("&cRed & blue");
        assert_eq!(&out[..12], b"%cRed % blue");
        assert!(out[12..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_encode_truncates_long_input() {
        let long = "x".repeat(100);
        let out = FixedString::encode(&long);
        assert_eq!(out.len(), STRING_SIZE);
        assert!(out.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn test_strip_colour_codes() {
        assert_eq!(strip_colour_codes("&aNotch&f"), "Notch");
        assert_eq!(strip_colour_codes("plain"), "plain");
        assert_eq!(remove_end_plus("Notch+"), "Notch");
        assert_eq!(remove_end_plus("Notch"), "Notch");
    }
}
