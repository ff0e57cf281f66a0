//! Type metadata shared by the admission envelope.
use serde::{Deserialize, Serialize};

/// Type information that is flattened into every kubernetes object
#[derive(Deserialize, Serialize, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// The version of the API
    #[serde(default)]
    pub api_version: String,

    /// The name of the API
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    /// Whether neither the version nor the kind were set
    pub fn is_empty(&self) -> bool {
        self.api_version.is_empty() && self.kind.is_empty()
    }
}
