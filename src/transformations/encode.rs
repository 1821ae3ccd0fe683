//! Encoding transformations.

use super::Transformation;
use std::borrow::Cow;

/// Base64 encode transformation.
pub struct Base64Encode;

impl Transformation for Base64Encode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        use base64::Engine;
        (
            Cow::Owned(base64::engine::general_purpose::STANDARD.encode(input)),
            true,
        )
    }

    fn name(&self) -> &'static str {
        "base64Encode"
    }
}

/// Hex encode transformation.
pub struct HexEncode;

impl Transformation for HexEncode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let encoded: String = input.bytes().map(|b| format!("{:02x}", b)).collect();
        (Cow::Owned(encoded), true)
    }

    fn name(&self) -> &'static str {
        "hexEncode"
    }
}

/// URL encode transformation.
pub struct UrlEncode;

impl Transformation for UrlEncode {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
        let encoded = utf8_percent_encode(input, NON_ALPHANUMERIC).to_string();
        if encoded == input {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(encoded), true)
        }
    }

    fn name(&self) -> &'static str {
        "urlEncode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode() {
        let t = Base64Encode;
        assert_eq!(t.transform("hello").0, "aGVsbG8=");
    }

    #[test]
    fn test_hex_encode() {
        let t = HexEncode;
        assert_eq!(t.transform("AB").0, "4142");
    }

    #[test]
    fn test_url_encode() {
        let t = UrlEncode;
        assert_eq!(t.transform("a b/c").0, "a%20b%2Fc");
        assert!(matches!(t.transform("plain").0, Cow::Borrowed(_)));
    }
}
