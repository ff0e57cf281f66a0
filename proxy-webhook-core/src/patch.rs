//! JSON patch operations returned by admission decisions.
//!
//! The model is [`json_patch`]'s: a [`PatchOperation`] is one `op`/`path`/`value` entry and a
//! [`Patch`] is the array that ends up (base64 encoded) in `AdmissionResponse.patch`.
use json_patch::{jsonptr::PointerBuf, ReplaceOperation};
use serde_json::Value;

pub use json_patch::{Patch, PatchOperation};

/// JSON pointer to a key of a ConfigMap's `data` map.
///
/// Keys are escaped, so `a/b` becomes `/data/a~1b`.
pub fn data_key_path(key: &str) -> PointerBuf {
    PointerBuf::from_tokens(["data", key])
}

/// A `replace` operation setting `path` to `value`.
pub fn replace(path: PointerBuf, value: impl Into<Value>) -> PatchOperation {
    PatchOperation::Replace(ReplaceOperation {
        path,
        value: value.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replace_serializes_as_patch_entry() {
        let patch = Patch(vec![replace(data_key_path("config"), "apiVersion: v1\n")]);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "replace", "path": "/data/config", "value": "apiVersion: v1\n"}])
        );
    }

    #[test]
    fn data_key_path_escapes_pointer_tokens() {
        assert_eq!(data_key_path("kube/config").as_str(), "/data/kube~1config");
        assert_eq!(data_key_path("a~b").as_str(), "/data/a~0b");
    }
}
