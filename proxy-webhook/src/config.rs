//! Startup configuration, read once from flags and environment variables.
use std::{net::SocketAddr, path::PathBuf};

use clap::{builder::NonEmptyStringValueParser, Parser};

/// Where the rewritten kubeconfigs point to unless told otherwise
pub const DEFAULT_PROXY_SERVER: &str = "https://capsule-proxy.capsule-system.svc:9001";

/// Webhook configuration
#[derive(Clone, Debug, Parser)]
#[command(name = "proxy-webhook", version, about)]
pub struct Config {
    /// PEM certificate served by the TLS listener
    #[arg(long, env = "PROXY_WEBHOOK_CERT_PATH", default_value = "/run/secrets/tls/tls.crt")]
    pub cert_path: PathBuf,

    /// PEM private key matching the certificate
    #[arg(long, env = "PROXY_WEBHOOK_KEY_PATH", default_value = "/run/secrets/tls/tls.key")]
    pub key_path: PathBuf,

    /// Name prefix of the ConfigMaps holding kubeconfigs
    ///
    /// Selecting the ConfigMaps is left to the webhook configuration's object selector,
    /// the prefix is only reported at startup.
    #[arg(
        long,
        env = "PROXY_WEBHOOK_CONFIGMAP_PREFIX",
        default_value = "impersonation-shell-admin-kubeconfig-"
    )]
    pub configmap_prefix: String,

    /// ConfigMap data key holding the kubeconfig
    #[arg(
        long,
        env = "PROXY_WEBHOOK_CONFIGMAP_KEY",
        default_value = "config",
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub configmap_key: String,

    /// URL every cluster server is rewritten to
    #[arg(
        long,
        env = "PROXY_WEBHOOK_PROXY_SERVER",
        default_value = DEFAULT_PROXY_SERVER,
        value_parser = parse_proxy_server
    )]
    pub proxy_server: String,

    /// Deny kubeconfigs that do not pass validation after the rewrite
    #[arg(long, env = "PROXY_WEBHOOK_FORCE_VALIDATE")]
    pub force_validate: bool,

    /// Address the TLS listener binds to
    #[arg(long, env = "PROXY_WEBHOOK_LISTEN_ADDR", default_value = "0.0.0.0:8443")]
    pub listen_addr: SocketAddr,
}

fn parse_proxy_server(value: &str) -> Result<String, String> {
    let uri = value.parse::<http::Uri>().map_err(|e| e.to_string())?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(format!("{value:?} is not an absolute URL"));
    }
    Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["proxy-webhook"]).unwrap();
        assert_eq!(config.cert_path, PathBuf::from("/run/secrets/tls/tls.crt"));
        assert_eq!(config.key_path, PathBuf::from("/run/secrets/tls/tls.key"));
        assert_eq!(config.configmap_prefix, "impersonation-shell-admin-kubeconfig-");
        assert_eq!(config.configmap_key, "config");
        assert_eq!(config.proxy_server, DEFAULT_PROXY_SERVER);
        assert!(!config.force_validate);
        assert_eq!(config.listen_addr, "0.0.0.0:8443".parse().unwrap());
    }

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "proxy-webhook",
            "--configmap-key",
            "kubeconfig",
            "--proxy-server",
            "https://proxy.example.com:9001",
            "--force-validate",
            "--listen-addr",
            "127.0.0.1:9443",
        ])
        .unwrap();
        assert_eq!(config.configmap_key, "kubeconfig");
        assert_eq!(config.proxy_server, "https://proxy.example.com:9001");
        assert!(config.force_validate);
        assert_eq!(config.listen_addr.port(), 9443);
    }

    #[test]
    fn rejects_relative_proxy_server() {
        assert!(Config::try_parse_from(["proxy-webhook", "--proxy-server", "capsule-proxy:9001"]).is_err());
        assert!(Config::try_parse_from(["proxy-webhook", "--proxy-server", "/just/a/path"]).is_err());
    }

    #[test]
    fn rejects_empty_key() {
        assert!(Config::try_parse_from(["proxy-webhook", "--configmap-key", ""]).is_err());
    }
}
