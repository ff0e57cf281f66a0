//! Mutating admission webhook that points kubeconfigs stored in ConfigMaps at a proxy.
//!
//! On every ConfigMap admission the kubeconfig found under the configured data key is
//! parsed, each cluster's `server` is replaced by the proxy URL, and the result is sent
//! back to the API server as a single JSON patch `replace` of that key.
//!
//! - [`config`] holds the startup flags
//! - [`rewrite`] holds the admission decision
//! - [`server`] serves it over HTTPS
pub mod config;
pub use config::Config;

pub mod rewrite;
pub use rewrite::ProxyRewriter;

pub mod server;
