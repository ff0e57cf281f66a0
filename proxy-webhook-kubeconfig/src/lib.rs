//! Reading, rewriting and validating kubeconfig documents.
//!
//! The model mirrors the `Config` type of client-go closely enough that a kubeconfig
//! survives a read/write cycle: fields this crate does not know about are kept verbatim.
//!
//! ```
//! use proxy_webhook_kubeconfig::Kubeconfig;
//!
//! let mut config = Kubeconfig::from_yaml(
//!     "apiVersion: v1
//! kind: Config
//! clusters:
//! - name: c
//!   cluster:
//!     server: https://10.0.0.1:6443
//! ",
//! )?;
//! assert_eq!(config.set_server("https://proxy:9001"), 1);
//! config.validate()?;
//! assert!(config.to_yaml()?.contains("server: https://proxy:9001"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub use error::{Error, ValidationError};

mod kubeconfig;
pub use kubeconfig::{
    AuthInfo, AuthProviderConfig, Cluster, Context, ExecConfig, ExecInteractiveMode, Kubeconfig, NamedAuthInfo,
    NamedCluster, NamedContext, NamedExtension, Preferences, UnknownFields,
};

mod validate;
