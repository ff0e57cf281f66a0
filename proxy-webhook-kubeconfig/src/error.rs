//! Errors produced while reading, writing and validating kubeconfigs
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
// Redundant with the error messages and machine names
#[allow(missing_docs)]
/// Possible errors when loading or writing a kubeconfig
pub enum Error {
    #[error("failed to parse kubeconfig YAML: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("failed to deserialize kubeconfig: {0}")]
    InvalidStructure(#[source] serde_yaml::Error),

    #[error("duplicate name {name:?} in list of {list}")]
    DuplicateName { list: &'static str, name: String },

    #[error("merging kubeconfig with mismatching kind")]
    KindMismatch,
    #[error("merging kubeconfig with mismatching apiVersion")]
    ApiVersionMismatch,

    #[error("failed to serialize kubeconfig: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Every problem [`Kubeconfig::validate`](crate::Kubeconfig::validate) found in a kubeconfig.
///
/// Displayed as `invalid configuration: <problem>` or, with several problems,
/// `invalid configuration: [<problem>, <problem>]`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    problems: Vec<String>,
}

impl ValidationError {
    pub(crate) fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// The individual problems, in document order
    pub fn problems(&self) -> &[String] {
        &self.problems
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problems.as_slice() {
            [single] => write!(f, "invalid configuration: {}", single),
            many => write!(f, "invalid configuration: [{}]", many.join(", ")),
        }
    }
}
