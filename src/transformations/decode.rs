//! Decoding transformations.
//!
//! Decoders can fail on malformed input; failure keeps the value unchanged
//! and is reported through the success flag.

use super::Transformation;
use std::borrow::Cow;

/// URL decode transformation.
pub struct UrlDecode;

impl Transformation for UrlDecode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        match percent_encoding::percent_decode_str(input).decode_utf8() {
            Ok(decoded) => {
                if decoded == input {
                    (Cow::Borrowed(input), true)
                } else {
                    (Cow::Owned(decoded.into_owned()), true)
                }
            }
            Err(_) => (Cow::Borrowed(input), false),
        }
    }

    fn name(&self) -> &'static str {
        "urlDecode"
    }
}

/// Base64 decode transformation.
pub struct Base64Decode;

impl Transformation for Base64Decode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        use base64::Engine;
        match base64::engine::general_purpose::STANDARD.decode(input) {
            Ok(bytes) => (Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()), true),
            Err(_) => (Cow::Borrowed(input), false),
        }
    }

    fn name(&self) -> &'static str {
        "base64Decode"
    }
}

/// Hex decode transformation.
pub struct HexDecode;

impl Transformation for HexDecode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let mut result = Vec::new();
        let mut chars = input.chars().peekable();

        while let Some(c1) = chars.next() {
            let Some(c2) = chars.next() else {
                // Odd number of chars
                return (Cow::Borrowed(input), false);
            };
            let hex = format!("{}{}", c1, c2);
            match u8::from_str_radix(&hex, 16) {
                Ok(byte) => result.push(byte),
                Err(_) => return (Cow::Borrowed(input), false),
            }
        }

        (Cow::Owned(String::from_utf8_lossy(&result).into_owned()), true)
    }

    fn name(&self) -> &'static str {
        "hexDecode"
    }
}
