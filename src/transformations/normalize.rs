//! Normalization transformations.
//!
//! These cannot fail; they always report success.

use super::Transformation;
use std::borrow::Cow;

/// Lowercase transformation.
pub struct Lowercase;

impl Transformation for Lowercase {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let lower = input.to_lowercase();
        if lower == input {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(lower), true)
        }
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

/// Uppercase transformation.
pub struct Uppercase;

impl Transformation for Uppercase {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let upper = input.to_uppercase();
        if upper == input {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(upper), true)
        }
    }

    fn name(&self) -> &'static str {
        "uppercase"
    }
}

/// Compress whitespace transformation.
pub struct CompressWhitespace;

impl Transformation for CompressWhitespace {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let mut result = String::new();
        let mut last_was_space = false;

        for c in input.chars() {
            if c.is_whitespace() {
                if !last_was_space {
                    result.push(' ');
                }
                last_was_space = true;
            } else {
                result.push(c);
                last_was_space = false;
            }
        }

        if result == input {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(result), true)
        }
    }

    fn name(&self) -> &'static str {
        "compressWhitespace"
    }
}

/// Remove whitespace transformation.
pub struct RemoveWhitespace;

impl Transformation for RemoveWhitespace {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let result: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if result == input {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(result), true)
        }
    }

    fn name(&self) -> &'static str {
        "removeWhitespace"
    }
}

/// Remove null bytes transformation.
pub struct RemoveNulls;

impl Transformation for RemoveNulls {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        if !input.contains('\0') {
            return (Cow::Borrowed(input), true);
        }
        (Cow::Owned(input.replace('\0', "")), true)
    }

    fn name(&self) -> &'static str {
        "removeNulls"
    }
}

/// Replace null bytes with spaces transformation.
pub struct ReplaceNulls;

impl Transformation for ReplaceNulls {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        if !input.contains('\0') {
            return (Cow::Borrowed(input), true);
        }
        (Cow::Owned(input.replace('\0', " ")), true)
    }

    fn name(&self) -> &'static str {
        "replaceNulls"
    }
}

/// Trim transformation.
pub struct Trim;

impl Transformation for Trim {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let trimmed = input.trim();
        if trimmed.len() == input.len() {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(trimmed.to_string()), true)
        }
    }

    fn name(&self) -> &'static str {
        "trim"
    }
}

/// Trim left transformation.
pub struct TrimLeft;

impl Transformation for TrimLeft {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let trimmed = input.trim_start();
        if trimmed.len() == input.len() {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(trimmed.to_string()), true)
        }
    }

    fn name(&self) -> &'static str {
        "trimLeft"
    }
}

/// Trim right transformation.
pub struct TrimRight;

impl Transformation for TrimRight {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let trimmed = input.trim_end();
        if trimmed.len() == input.len() {
            (Cow::Borrowed(input), true)
        } else {
            (Cow::Owned(trimmed.to_string()), true)
        }
    }

    fn name(&self) -> &'static str {
        "trimRight"
    }
}

/// Normalize path transformation (Unix-style).
pub struct NormalizePath;

impl Transformation for NormalizePath {
    fn transform<'a>(&self, input: &'a str) -> (Cow<'a, str>, bool) {
        let mut collapsed = String::new();
        let mut modified = false;

        // Replace backslashes with forward slashes
        let normalized = if input.contains('\\') {
            modified = true;
            Cow::Owned(input.replace('\\', "/"))
        } else {
            Cow::Borrowed(input)
        };

        // Collapse multiple slashes
        let mut last_was_slash = false;
        for c in normalized.chars() {
            if c == '/' {
                if !last_was_slash {
                    collapsed.push('/');
                } else {
                    modified = true;
                }
                last_was_slash = true;
            } else {
                collapsed.push(c);
                last_was_slash = false;
            }
        }

        // Remove . and .. components
        let mut stack: Vec<&str> = Vec::new();
        for part in collapsed.split('/') {
            match part {
                "." => {
                    modified = true;
                }
                ".." => {
                    modified = true;
                    stack.pop();
                }
                "" if !stack.is_empty() => {
                    // Keep leading empty string for absolute paths
                }
                other => {
                    stack.push(other);
                }
            }
        }

        if modified {
            (Cow::Owned(stack.join("/")), true)
        } else {
            (Cow::Borrowed(input), true)
        }
    }

    fn name(&self) -> &'static str {
        "normalizePath"
    }
}
