//! The admission envelope: from request bytes to a response review.
//!
//! [`review`] is generic over the admission decision. A decision is any function taking the
//! decoded [`AdmissionRequest`] and returning the patches to apply, or an error whose message
//! is sent back to the caller as a denial:
//!
//! ```
//! use proxy_webhook_core::{admission::AdmissionRequest, review, PatchOperation};
//!
//! fn allow_all(_: &AdmissionRequest) -> Result<Vec<PatchOperation>, std::convert::Infallible> {
//!     Ok(vec![])
//! }
//!
//! let body = br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview","request":{
//!     "uid":"1","kind":{"group":"","version":"v1","kind":"ConfigMap"},
//!     "resource":{"group":"","version":"v1","resource":"configmaps"},"operation":"CREATE"}}"#;
//! let out = review(Some("application/json"), body, allow_all).unwrap();
//! assert!(out.response.unwrap().allowed);
//! ```
use std::fmt::Display;

use http::StatusCode;
use thiserror::Error;

use crate::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    patch::{Patch, PatchOperation},
};

/// Failures of the envelope itself, answered before any admission decision runs.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The request did not declare a JSON content type
    #[error("unsupported media type {0:?}, expected application/json")]
    UnsupportedMediaType(Option<String>),

    /// The body is not an AdmissionReview
    #[error("could not decode AdmissionReview: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    /// The AdmissionReview carries no request
    #[error("AdmissionReview does not contain a request")]
    MissingRequest,
}

impl ReviewError {
    /// The HTTP status this failure is answered with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReviewError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ReviewError::MalformedRequest(_) | ReviewError::MissingRequest => StatusCode::BAD_REQUEST,
        }
    }

    /// An `invalid` review describing this failure, for the response body
    pub fn into_review(self) -> AdmissionReview {
        let code = self.status_code().as_u16();
        let mut res = AdmissionResponse::invalid(self.to_string());
        res.result = res.result.with_code(code);
        res.into_review()
    }
}

/// Whether a `Content-Type` value names a JSON media type.
///
/// Accepts `application/json` and `application/*+json`, with or without parameters.
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Run one admission review.
///
/// Decodes `body` as an [`AdmissionReview`], hands its request to `decide` and encodes the
/// outcome. An `Err` from `decide` is a regular denial carrying the error message; only
/// envelope failures are returned as [`ReviewError`].
pub fn review<F, E>(content_type: Option<&str>, body: &[u8], decide: F) -> Result<AdmissionReview, ReviewError>
where
    F: FnOnce(&AdmissionRequest) -> Result<Vec<PatchOperation>, E>,
    E: Display,
{
    if !content_type.is_some_and(is_json_content_type) {
        return Err(ReviewError::UnsupportedMediaType(content_type.map(str::to_owned)));
    }
    let review: AdmissionReview = serde_json::from_slice(body).map_err(ReviewError::MalformedRequest)?;
    let req = AdmissionRequest::try_from(review).map_err(|_| ReviewError::MissingRequest)?;
    tracing::debug!(
        uid = %req.uid,
        resource = %req.resource,
        operation = ?req.operation,
        namespace = ?req.namespace,
        name = %req.name,
        "reviewing admission request"
    );

    let res = AdmissionResponse::from(&req);
    let res = match decide(&req) {
        Ok(patches) if patches.is_empty() => {
            tracing::info!(uid = %req.uid, "admission request allowed");
            res
        }
        Ok(patches) => {
            let count = patches.len();
            match res.clone().with_patch(Patch(patches)) {
                Ok(res) => {
                    tracing::info!(uid = %req.uid, patches = count, "admission request allowed with patch");
                    res
                }
                Err(err) => {
                    tracing::error!(uid = %req.uid, error = %err, "admission request denied");
                    res.deny(err)
                }
            }
        }
        Err(err) => {
            tracing::warn!(uid = %req.uid, error = %err, "admission request denied");
            res.deny(err)
        }
    };
    Ok(res.into_review())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admission::{test::WEBHOOK_BODY, PatchType},
        patch::{data_key_path, replace},
    };
    use base64::Engine;
    use serde_json::json;

    fn allow(_: &AdmissionRequest) -> Result<Vec<PatchOperation>, String> {
        Ok(vec![])
    }

    #[test]
    fn json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(is_json_content_type("application/merge-patch+json"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type("application/yaml"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn wrong_media_type_skips_decision() {
        let mut called = false;
        let err = review(Some("text/plain"), WEBHOOK_BODY.as_bytes(), |_| {
            called = true;
            Ok::<_, String>(vec![])
        })
        .unwrap_err();
        assert!(!called);
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = review(None, WEBHOOK_BODY.as_bytes(), allow).unwrap_err();
        assert!(matches!(err, ReviewError::UnsupportedMediaType(None)));
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let mut called = false;
        let err = review(Some("application/json"), b"{not json", |_| {
            called = true;
            Ok::<_, String>(vec![])
        })
        .unwrap_err();
        assert!(!called);
        assert!(matches!(err, ReviewError::MalformedRequest(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = err.into_review();
        let res = body.response.unwrap();
        assert!(!res.allowed);
        assert_eq!(res.result.code, 400);
    }

    #[test]
    fn review_without_request_is_bad_request() {
        let body = br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#;
        let err = review(Some("application/json"), body, allow).unwrap_err();
        assert!(matches!(err, ReviewError::MissingRequest));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_patch_list_allows_without_patch() {
        let out = review(Some("application/json"), WEBHOOK_BODY.as_bytes(), allow).unwrap();
        assert_eq!(out.types.api_version, "admission.k8s.io/v1");
        assert_eq!(out.types.kind, "AdmissionReview");
        let res = out.response.unwrap();
        assert!(res.allowed);
        assert_eq!(res.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert!(res.patch.is_none());
        assert!(res.patch_type().is_none());
    }

    #[test]
    fn decision_error_is_a_denial_with_verbatim_message() {
        let out = review(Some("application/json"), WEBHOOK_BODY.as_bytes(), |_| {
            Err::<Vec<PatchOperation>, _>("the configmap does not contain a key with name 'config'")
        })
        .unwrap();
        let res = out.response.unwrap();
        assert!(!res.allowed);
        assert_eq!(res.uid, "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(res.result.message, "the configmap does not contain a key with name 'config'");
        assert!(res.patch.is_none());
    }

    #[test]
    fn patches_are_attached() {
        let out = review(Some("application/json"), WEBHOOK_BODY.as_bytes(), |req| {
            assert_eq!(req.name, "impersonation-shell-admin-kubeconfig-alice");
            Ok::<_, String>(vec![replace(data_key_path("config"), "new")])
        })
        .unwrap();
        let wire = serde_json::to_value(&out).unwrap();
        let res = out.response.unwrap();
        assert!(res.allowed);
        assert_eq!(res.patch_type(), Some(&PatchType::JsonPatch));
        let patch: serde_json::Value = serde_json::from_slice(res.patch.as_ref().unwrap()).unwrap();
        assert_eq!(
            patch,
            json!([{"op": "replace", "path": "/data/config", "value": "new"}])
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(res.patch.unwrap());
        assert_eq!(wire["response"]["patch"], encoded);
    }
}
