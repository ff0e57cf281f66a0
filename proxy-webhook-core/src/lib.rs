//! Shared types for the kubeconfig proxy admission webhook
//!
//! This crate holds everything that is independent of what the webhook actually mutates:
//!
//! - [`admission`] with the `AdmissionReview` wire types
//! - [`gvk`] with group/version/kind and group/version/resource identifiers
//! - [`patch`] with the JSON patch model returned by admission decisions
//! - [`webhook`] with the generic envelope handler that drives an admission decision

pub mod admission;

pub mod gvk;
pub use gvk::{GroupVersionKind, GroupVersionResource};

pub mod metadata;

pub mod patch;
pub use patch::{Patch, PatchOperation};

pub mod response;
pub use response::Status;

pub mod webhook;
pub use webhook::{review, ReviewError};
