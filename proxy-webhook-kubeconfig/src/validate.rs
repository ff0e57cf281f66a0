//! Semantic checks on a loaded [`Kubeconfig`], following the rules `kubectl` applies.
//!
//! Checks that need the filesystem (referenced certificate or token files) are left out.
use std::collections::HashSet;

use secrecy::ExposeSecret;

use crate::{
    kubeconfig::{AuthInfo, Cluster, Context, Kubeconfig},
    ValidationError,
};

const DNS1123_LABEL_MAX_LENGTH: usize = 63;

impl Kubeconfig {
    /// Check the kubeconfig for problems a client would reject it for.
    ///
    /// Every problem found is collected, in document order: the current context first,
    /// then contexts, users and clusters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::new(vec![
                "no configuration has been provided".to_owned()
            ]));
        }

        let mut problems = Vec::new();
        let contexts = self.contexts.iter().map(|c| c.name.as_str()).collect::<HashSet<_>>();
        let clusters = self.clusters.iter().map(|c| c.name.as_str()).collect::<HashSet<_>>();
        let users = self.auth_infos.iter().map(|u| u.name.as_str()).collect::<HashSet<_>>();

        if let Some(current) = self.current_context.as_deref().filter(|c| !c.is_empty()) {
            if !contexts.contains(current) {
                problems.push(format!("context was not found for specified context: {}", current));
            }
        }

        let empty_context = Context::default();
        for named in &self.contexts {
            let context = named.context.as_ref().unwrap_or(&empty_context);
            validate_context(&named.name, context, &clusters, &users, &mut problems);
        }

        let empty_auth_info = AuthInfo::default();
        for named in &self.auth_infos {
            let auth_info = named.auth_info.as_ref().unwrap_or(&empty_auth_info);
            validate_auth_info(&named.name, auth_info, &mut problems);
        }

        let empty_cluster = Cluster::default();
        for named in &self.clusters {
            let cluster = named.cluster.as_ref().unwrap_or(&empty_cluster);
            validate_cluster(&named.name, cluster, &mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(problems))
        }
    }
}

fn validate_context(
    name: &str,
    context: &Context,
    clusters: &HashSet<&str>,
    users: &HashSet<&str>,
    problems: &mut Vec<String>,
) {
    if context.user.is_empty() {
        problems.push(format!("user was not specified for context {:?}", name));
    } else if !users.contains(context.user.as_str()) {
        problems.push(format!("user {:?} was not found for context {:?}", context.user, name));
    }

    if context.cluster.is_empty() {
        problems.push(format!("cluster was not specified for context {:?}", name));
    } else if !clusters.contains(context.cluster.as_str()) {
        problems.push(format!(
            "cluster {:?} was not found for context {:?}",
            context.cluster, name
        ));
    }

    if let Some(namespace) = context.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        if !is_dns1123_label(namespace) {
            problems.push(format!(
                "namespace {:?} for context {:?} does not conform to the kubernetes DNS_LABEL rules",
                namespace, name
            ));
        }
    }
}

fn validate_auth_info(name: &str, auth_info: &AuthInfo, problems: &mut Vec<String>) {
    let set = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.is_empty());
    let secret_set = |s: &Option<secrecy::SecretString>| s.as_ref().is_some_and(|s| !s.expose_secret().is_empty());

    let mut methods = Vec::new();
    if secret_set(&auth_info.token) {
        methods.push("token");
    }
    if set(&auth_info.username) || secret_set(&auth_info.password) {
        methods.push("basicAuth");
    }

    let has_cert_file = set(&auth_info.client_certificate);
    let has_cert_data = set(&auth_info.client_certificate_data);
    let has_key_file = set(&auth_info.client_key);
    let has_key_data = secret_set(&auth_info.client_key_data);

    if has_cert_file || has_cert_data {
        if has_cert_file && has_cert_data {
            problems.push(format!(
                "client-cert-data and client-cert are both specified for {}. client-cert-data will override.",
                name
            ));
        }
        if has_key_file && has_key_data {
            problems.push(format!(
                "client-key-data and client-key are both specified for {}; client-key-data will override",
                name
            ));
        }
        if !has_key_file && !has_key_data {
            problems.push(format!(
                "client-key-data or client-key must be specified for {} to use the clientCert authentication method.",
                name
            ));
        }
    } else if has_key_file || has_key_data {
        problems.push(format!(
            "client-cert-data or client-cert must be specified for {} to use the clientCert authentication method.",
            name
        ));
    }

    if let Some(exec) = &auth_info.exec {
        if auth_info.auth_provider.is_some() {
            problems.push(format!(
                "authProvider cannot be provided in combination with an exec plugin for {}",
                name
            ));
        }
        if !set(&exec.command) {
            problems.push(format!(
                "command must be specified for {} to use exec authentication plugin",
                name
            ));
        }
        if !set(&exec.api_version) {
            problems.push(format!(
                "apiVersion must be specified for {} to use exec authentication plugin",
                name
            ));
        }
        let unnamed_env = exec
            .env
            .iter()
            .flatten()
            .filter(|var| var.get("name").map_or(true, String::is_empty));
        for _ in unnamed_env {
            problems.push(format!(
                "env variable name must be specified for {} to use exec authentication plugin",
                name
            ));
        }
    }

    if methods.len() > 1 {
        problems.push(format!(
            "more than one authentication method found for {}; found [{}], only one is allowed",
            name,
            methods.join(" ")
        ));
    }
}

fn validate_cluster(name: &str, cluster: &Cluster, problems: &mut Vec<String>) {
    if cluster.is_empty() {
        problems.push("cluster has no server defined".to_owned());
        return;
    }

    if cluster.server.as_deref().map_or(true, str::is_empty) {
        if name.is_empty() {
            problems.push("default cluster has no server defined".to_owned());
        } else {
            problems.push(format!("no server found for cluster {:?}", name));
        }
    }

    if let Some(proxy_url) = cluster.proxy_url.as_deref().filter(|u| !u.is_empty()) {
        if let Err(reason) = check_proxy_url(proxy_url) {
            problems.push(format!(
                "invalid 'proxy-url' {:?} for cluster {:?}: {}",
                proxy_url, name, reason
            ));
        }
    }

    let has_ca_file = cluster.certificate_authority.as_deref().is_some_and(|s| !s.is_empty());
    let has_ca_data = cluster
        .certificate_authority_data
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    if has_ca_file && has_ca_data {
        problems.push(format!(
            "certificate-authority-data and certificate-authority are both specified for {}. certificate-authority-data will override.",
            name
        ));
    }
    if cluster.insecure_skip_tls_verify == Some(true) && (has_ca_file || has_ca_data) {
        problems.push(format!(
            "specifying a root certificates file with the insecure flag is not allowed for cluster {:?}",
            name
        ));
    }
}

fn check_proxy_url(proxy_url: &str) -> Result<(), String> {
    let uri = proxy_url.parse::<http::Uri>().map_err(|e| e.to_string())?;
    match uri.scheme_str() {
        Some("http" | "https" | "socks5") => Ok(()),
        other => Err(format!(
            "unsupported scheme {:?}, must be http, https, or socks5",
            other.unwrap_or_default()
        )),
    }
}

fn is_dns1123_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let alphanumeric = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    !bytes.is_empty()
        && bytes.len() <= DNS1123_LABEL_MAX_LENGTH
        && bytes.iter().all(|b| alphanumeric(b) || *b == b'-')
        && bytes.first().is_some_and(alphanumeric)
        && bytes.last().is_some_and(alphanumeric)
}
