//! Transformation pipeline.

use super::{create_transformation, Transformation};
use crate::error::Result;
use std::borrow::Cow;
use std::sync::Arc;

/// Outcome of one transformation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationResult {
    /// The value after this step.
    pub value: String,
    /// Name of the transformation that produced it.
    pub name: &'static str,
    /// Whether the transformation applied cleanly.
    pub success: bool,
}

/// Per-step outcomes of a full transformation sequence.
pub type TransformationResults = Vec<TransformationResult>;

/// A pipeline of transformations to apply in sequence.
///
/// A `none` transformation clears everything added before it; the pipeline
/// remembers that a reset happened so rule-level sequencing can suppress
/// inherited defaults.
#[derive(Clone)]
pub struct TransformationPipeline {
    transformations: Vec<Arc<dyn Transformation>>,
    saw_none: bool,
}

impl TransformationPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            transformations: Vec::new(),
            saw_none: false,
        }
    }

    /// Create a pipeline from transformation names.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let mut pipeline = Self::new();
        for name in names {
            pipeline.add(create_transformation(name)?);
        }
        Ok(pipeline)
    }

    /// Add a transformation to the pipeline.
    ///
    /// Adding `none` clears the transformations accumulated so far instead
    /// of appending.
    pub fn add(&mut self, transformation: Arc<dyn Transformation>) {
        if transformation.name() == "none" {
            self.transformations.clear();
            self.saw_none = true;
            return;
        }
        self.transformations.push(transformation);
    }

    /// Whether a `none` reset was ever applied to this pipeline.
    pub fn has_none_reset(&self) -> bool {
        self.saw_none
    }

    /// The transformations in application order.
    pub fn transformations(&self) -> &[Arc<dyn Transformation>] {
        &self.transformations
    }

    /// Apply all transformations in sequence, returning the final value.
    ///
    /// A failing step leaves the value unchanged and the sequence continues.
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if self.transformations.is_empty() {
            return Cow::Borrowed(input);
        }

        let mut current: Cow<str> = Cow::Borrowed(input);

        for t in &self.transformations {
            current = match current {
                Cow::Borrowed(s) => t.transform(s).0,
                Cow::Owned(s) => {
                    let (transformed, _) = t.transform(&s);
                    match transformed {
                        Cow::Borrowed(_) => Cow::Owned(s),
                        Cow::Owned(new) => Cow::Owned(new),
                    }
                }
            };
        }

        current
    }

    /// Check if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }

    /// Get the number of transformations.
    pub fn len(&self) -> usize {
        self.transformations.len()
    }
}

impl Default for TransformationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationPipeline")
            .field(
                "transformations",
                &self
                    .transformations
                    .iter()
                    .map(|t| t.name())
                    .collect::<Vec<_>>(),
            )
            .field("saw_none", &self.saw_none)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pipeline() {
        let pipeline = TransformationPipeline::new();
        assert_eq!(pipeline.apply("hello"), "hello");
        assert!(!pipeline.has_none_reset());
    }

    #[test]
    fn test_single_transformation() {
        let pipeline = TransformationPipeline::from_names(&["lowercase".to_string()]).unwrap();
        assert_eq!(pipeline.apply("HELLO"), "hello");
    }

    #[test]
    fn test_multiple_transformations() {
        let pipeline = TransformationPipeline::from_names(&[
            "urlDecode".to_string(),
            "lowercase".to_string(),
        ])
        .unwrap();
        assert_eq!(pipeline.apply("HELLO%20WORLD"), "hello world");
    }

    #[test]
    fn test_none_clears_pipeline() {
        let pipeline = TransformationPipeline::from_names(&[
            "lowercase".to_string(),
            "none".to_string(),
            "uppercase".to_string(),
        ])
        .unwrap();
        // Only uppercase survives the reset
        assert_eq!(pipeline.apply("hello"), "HELLO");
        assert_eq!(pipeline.len(), 1);
        assert!(pipeline.has_none_reset());
    }

    #[test]
    fn test_failed_step_keeps_value() {
        let pipeline = TransformationPipeline::from_names(&[
            "base64Decode".to_string(),
            "lowercase".to_string(),
        ])
        .unwrap();
        assert_eq!(pipeline.apply("*NOT BASE64*"), "*not base64*");
    }
}
