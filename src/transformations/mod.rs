//! Transformation functions applied to values before matching.
//!
//! Optimized with perfect hash function for O(1) transformation name lookup.

mod decode;
mod encode;
mod normalize;
mod pipeline;

pub use decode::*;
pub use encode::*;
pub use normalize::*;
pub use pipeline::{TransformationPipeline, TransformationResult, TransformationResults};

use crate::error::{Error, Result};
use phf::phf_map;
use std::borrow::Cow;
use std::sync::Arc;

/// Trait for transformations.
pub trait Transformation: Send + Sync {
    /// Apply the transformation.
    ///
    /// Returns the transformed value and whether the transformation
    /// succeeded. On failure the input comes back unchanged so that later
    /// steps keep operating on the prior value.
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool);

    /// Get the transformation name.
    fn name(&self) -> &'static str;
}

impl std::fmt::Debug for dyn Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformation")
            .field("name", &self.name())
            .finish()
    }
}

/// Transformation names supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationName {
    // Decoding
    /// URL percent-decoding.
    UrlDecode,
    /// Base64 decoding.
    Base64Decode,
    /// Hexadecimal decoding.
    HexDecode,

    // Encoding
    /// Base64 encoding.
    Base64Encode,
    /// Hexadecimal encoding.
    HexEncode,
    /// URL percent-encoding.
    UrlEncode,

    // Normalization
    /// Lowercase.
    Lowercase,
    /// Uppercase.
    Uppercase,
    /// Collapse whitespace runs to a single space.
    CompressWhitespace,
    /// Strip all whitespace.
    RemoveWhitespace,
    /// Strip null bytes.
    RemoveNulls,
    /// Replace null bytes with spaces.
    ReplaceNulls,
    /// Trim both ends.
    Trim,
    /// Trim the left end.
    TrimLeft,
    /// Trim the right end.
    TrimRight,
    /// Normalize a Unix-style path.
    NormalizePath,

    // Special
    /// Replace the value with its length.
    Length,
    /// Reset marker that clears previously added transformations.
    None,
}

/// Perfect hash map for O(1) transformation name lookup.
static TRANSFORMATION_MAP: phf::Map<&'static str, TransformationName> = phf_map! {
    "urldecode" => TransformationName::UrlDecode,
    "base64decode" => TransformationName::Base64Decode,
    "hexdecode" => TransformationName::HexDecode,
    "base64encode" => TransformationName::Base64Encode,
    "hexencode" => TransformationName::HexEncode,
    "urlencode" => TransformationName::UrlEncode,
    "lowercase" => TransformationName::Lowercase,
    "uppercase" => TransformationName::Uppercase,
    "compresswhitespace" => TransformationName::CompressWhitespace,
    "removewhitespace" => TransformationName::RemoveWhitespace,
    "removenulls" => TransformationName::RemoveNulls,
    "replacenulls" => TransformationName::ReplaceNulls,
    "trim" => TransformationName::Trim,
    "trimleft" => TransformationName::TrimLeft,
    "trimright" => TransformationName::TrimRight,
    "normalizepath" => TransformationName::NormalizePath,
    "length" => TransformationName::Length,
    "none" => TransformationName::None,
};

impl TransformationName {
    /// Parse a transformation name from a string (O(1) lookup).
    #[inline]
    pub fn from_str(s: &str) -> Option<Self> {
        // Fast path: check if already lowercase ASCII
        if s.bytes().all(|b| b.is_ascii_lowercase()) {
            return TRANSFORMATION_MAP.get(s).copied();
        }
        // Slow path: need to lowercase
        let mut buf = [0u8; 32];
        let len = s.len().min(32);
        for (i, b) in s.bytes().take(len).enumerate() {
            buf[i] = b.to_ascii_lowercase();
        }
        let lower = std::str::from_utf8(&buf[..len]).ok()?;
        TRANSFORMATION_MAP.get(lower).copied()
    }
}

/// Create a transformation from a name.
pub fn create_transformation(name: &str) -> Result<Arc<dyn Transformation>> {
    let kind = TransformationName::from_str(name).ok_or_else(|| Error::UnknownTransformation {
        name: name.to_string(),
    })?;

    Ok(match kind {
        TransformationName::UrlDecode => Arc::new(UrlDecode),
        TransformationName::Base64Decode => Arc::new(Base64Decode),
        TransformationName::HexDecode => Arc::new(HexDecode),
        TransformationName::Base64Encode => Arc::new(Base64Encode),
        TransformationName::HexEncode => Arc::new(HexEncode),
        TransformationName::UrlEncode => Arc::new(UrlEncode),
        TransformationName::Lowercase => Arc::new(Lowercase),
        TransformationName::Uppercase => Arc::new(Uppercase),
        TransformationName::CompressWhitespace => Arc::new(CompressWhitespace),
        TransformationName::RemoveWhitespace => Arc::new(RemoveWhitespace),
        TransformationName::RemoveNulls => Arc::new(RemoveNulls),
        TransformationName::ReplaceNulls => Arc::new(ReplaceNulls),
        TransformationName::Trim => Arc::new(Trim),
        TransformationName::TrimLeft => Arc::new(TrimLeft),
        TransformationName::TrimRight => Arc::new(TrimRight),
        TransformationName::NormalizePath => Arc::new(NormalizePath),
        TransformationName::Length => Arc::new(Length),
        TransformationName::None => Arc::new(None_),
    })
}

/// None transformation (clears the transformation chain).
pub struct None_;

impl Transformation for None_ {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        (Cow::Borrowed(input), true)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Length transformation (returns the length of the input).
pub struct Length;

impl Transformation for Length {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        (Cow::Owned(input.len().to_string()), true)
    }

    fn name(&self) -> &'static str {
        "length"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            TransformationName::from_str("urlDecode"),
            Some(TransformationName::UrlDecode)
        );
        assert_eq!(
            TransformationName::from_str("LOWERCASE"),
            Some(TransformationName::Lowercase)
        );
        assert_eq!(TransformationName::from_str("bogus"), None);
    }

    #[test]
    fn test_create_transformation() {
        let t = create_transformation("compressWhitespace").unwrap();
        assert_eq!(t.name(), "compressWhitespace");
    }

    #[test]
    fn test_create_unknown_transformation() {
        let err = create_transformation("rot13").unwrap_err();
        assert!(err.to_string().contains("t:rot13"));
    }

    #[test]
    fn test_length() {
        let t = Length;
        let (out, ok) = t.transform("hello");
        assert_eq!(out, "5");
        assert!(ok);
    }
}
