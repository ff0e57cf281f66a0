//! The admission decision: point the kubeconfig stored in a ConfigMap at the proxy.
use k8s_openapi::api::core::v1::ConfigMap;
use proxy_webhook_core::{
    admission::AdmissionRequest,
    patch::{data_key_path, replace},
    GroupVersionResource, PatchOperation,
};
use proxy_webhook_kubeconfig::{Kubeconfig, ValidationError};
use thiserror::Error;

use crate::Config;

#[derive(Error, Debug)]
// Redundant with the error messages and machine names
#[allow(missing_docs)]
/// Reasons a ConfigMap is denied
pub enum Error {
    #[error("could not deserialize configMap object: admission request carries no object")]
    MissingObject,

    #[error("could not deserialize configMap object: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("the configmap does not contain a key with name '{key}'")]
    MissingConfigKey { key: String },

    #[error("error when loading client cmd config: {0}")]
    InvalidKubeconfig(#[source] proxy_webhook_kubeconfig::Error),

    #[error("error validating the kubeconfig: {0}")]
    Validation(#[source] ValidationError),

    #[error("error when writing client cmd config: {0}")]
    Serialize(#[source] proxy_webhook_kubeconfig::Error),
}

/// Rewrites the cluster servers of kubeconfigs found in ConfigMaps
#[derive(Clone, Debug)]
pub struct ProxyRewriter {
    target: GroupVersionResource,
    data_key: String,
    proxy_url: String,
    validate: bool,
}

impl ProxyRewriter {
    /// Rewrite the kubeconfig under `data_key` to point at `proxy_url`, without validation
    pub fn new(data_key: impl Into<String>, proxy_url: impl Into<String>) -> Self {
        Self {
            target: GroupVersionResource::gvr("", "v1", "configmaps"),
            data_key: data_key.into(),
            proxy_url: proxy_url.into(),
            validate: false,
        }
    }

    /// Deny kubeconfigs that are invalid after the rewrite
    #[must_use]
    pub fn validating(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// The ConfigMap data key holding the kubeconfig
    pub fn data_key(&self) -> &str {
        &self.data_key
    }

    /// Decide on one admission request.
    ///
    /// Requests for anything but ConfigMaps are let through untouched. For ConfigMaps the
    /// result is a single `replace` of the kubeconfig under the configured key.
    pub fn apply(&self, req: &AdmissionRequest) -> Result<Vec<PatchOperation>, Error> {
        if req.resource != self.target {
            tracing::warn!(
                uid = %req.uid,
                resource = %req.resource,
                expected = %self.target,
                "ignoring admission request for unexpected resource"
            );
            return Ok(vec![]);
        }

        let object = req.object.as_ref().ok_or(Error::MissingObject)?;
        let configmap: ConfigMap = serde_json::from_value(object.0.clone()).map_err(Error::Deserialize)?;
        let text = configmap
            .data
            .as_ref()
            .and_then(|data| data.get(&self.data_key))
            .ok_or_else(|| Error::MissingConfigKey {
                key: self.data_key.clone(),
            })?;

        let rewritten = self.rewrite(text)?;
        Ok(vec![replace(data_key_path(&self.data_key), rewritten)])
    }

    /// Point every cluster of the kubeconfig in `text` at the proxy
    pub fn rewrite(&self, text: &str) -> Result<String, Error> {
        let mut kubeconfig = Kubeconfig::from_yaml(text).map_err(Error::InvalidKubeconfig)?;
        let clusters = kubeconfig.set_server(&self.proxy_url);
        tracing::debug!(clusters, proxy = %self.proxy_url, "rewrote cluster servers");

        if self.validate {
            kubeconfig.validate().map_err(Error::Validation)?;
        }
        kubeconfig.to_yaml().map_err(Error::Serialize)
    }
}

impl From<&Config> for ProxyRewriter {
    fn from(config: &Config) -> Self {
        ProxyRewriter::new(&config.configmap_key, &config.proxy_server).validating(config.force_validate)
    }
}
