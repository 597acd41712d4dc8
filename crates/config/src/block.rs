//! Server blocks as handed over by the configuration parser
//!
//! A server block is a set of address keys plus a pile of directive values.
//! Blocks that share a network address arrive grouped into pairings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{TlsPolicyError, TlsPolicyResult};
use crate::issuer::Issuer;
use crate::loader::CertificateLoader;

/// Directive enabling on-demand TLS
pub const ON_DEMAND_DIRECTIVE: &str = "tls.on_demand";
/// Directive setting an explicit certificate issuer
pub const CERT_ISSUER_DIRECTIVE: &str = "tls.cert_issuer";
/// Directive adding a certificate loader
pub const CERT_LOADER_DIRECTIVE: &str = "tls.cert_loader";
/// Directive setting the interfaces to bind to
pub const BIND_DIRECTIVE: &str = "bind";

/// One address key of a server block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// The key as written in the configuration
    #[serde(default)]
    pub original: String,

    #[serde(default)]
    pub scheme: String,

    /// Empty for a key that matches every host
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,
}

impl Address {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        let scheme = scheme.into();
        let host = host.into();
        let mut original = String::new();
        if !scheme.is_empty() {
            original.push_str(&scheme);
            original.push_str("://");
        }
        original.push_str(&host);
        if let Some(port) = port {
            original.push_str(&format!(":{}", port));
        }
        Self {
            original,
            scheme,
            host,
            port,
        }
    }

    /// Key naming only a host
    pub fn with_host(host: impl Into<String>) -> Self {
        Self::new("", host, None)
    }

    /// Key naming only a port, matching every host
    pub fn hostless(port: u16) -> Self {
        Self::new("", "", Some(port))
    }

    pub fn is_hostless(&self) -> bool {
        self.host.is_empty()
    }

    /// Whether the key is served over TLS: explicit `https` or the HTTPS port
    pub fn is_tls_enabled(&self, https_port: u16) -> bool {
        self.scheme == "https" || self.port == Some(https_port)
    }
}

/// A value produced by a directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DirectiveValue {
    OnDemand,
    CertIssuer(Issuer),
    Bind(Vec<String>),
    CertLoader(CertificateLoader),
    /// Values of directives this compiler does not interpret
    Raw(serde_json::Value),
}

impl DirectiveValue {
    fn kind(&self) -> &'static str {
        match self {
            DirectiveValue::OnDemand => "on_demand",
            DirectiveValue::CertIssuer(_) => "cert_issuer",
            DirectiveValue::Bind(_) => "bind",
            DirectiveValue::CertLoader(_) => "cert_loader",
            DirectiveValue::Raw(_) => "raw",
        }
    }
}

/// Directive values of a server block, keyed by directive name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pile(BTreeMap<String, Vec<DirectiveValue>>);

impl Pile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, directive: impl Into<String>, value: DirectiveValue) {
        self.0.entry(directive.into()).or_default().push(value);
    }

    pub fn contains(&self, directive: &str) -> bool {
        self.0.contains_key(directive)
    }

    /// Values of a directive; empty when absent
    pub fn values(&self, directive: &str) -> &[DirectiveValue] {
        self.0.get(directive).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Issuers set with `tls.cert_issuer`
    pub fn issuers(&self) -> TlsPolicyResult<Vec<&Issuer>> {
        self.typed_values(CERT_ISSUER_DIRECTIVE, |value| match value {
            DirectiveValue::CertIssuer(issuer) => Some(issuer),
            _ => None,
        })
    }

    /// Host lists given to `bind`
    pub fn bind_hosts(&self) -> TlsPolicyResult<Vec<&[String]>> {
        self.typed_values(BIND_DIRECTIVE, |value| match value {
            DirectiveValue::Bind(hosts) => Some(hosts.as_slice()),
            _ => None,
        })
    }

    /// Loaders added with `tls.cert_loader`
    pub fn cert_loaders(&self) -> TlsPolicyResult<Vec<&CertificateLoader>> {
        self.typed_values(CERT_LOADER_DIRECTIVE, |value| match value {
            DirectiveValue::CertLoader(loader) => Some(loader),
            _ => None,
        })
    }

    fn typed_values<'a, T>(
        &'a self,
        directive: &str,
        extract: impl Fn(&'a DirectiveValue) -> Option<T>,
    ) -> TlsPolicyResult<Vec<T>> {
        self.values(directive)
            .iter()
            .map(|value| {
                extract(value).ok_or_else(|| TlsPolicyError::InvalidDirective {
                    directive: directive.to_string(),
                    found: value.kind(),
                })
            })
            .collect()
    }
}

/// A server block: address keys plus directive values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerBlock {
    pub keys: Vec<Address>,

    #[serde(default)]
    pub pile: Pile,
}

impl ServerBlock {
    pub fn new(keys: Vec<Address>) -> Self {
        Self {
            keys,
            pile: Pile::new(),
        }
    }

    /// Add a directive value (builder style)
    pub fn with_directive(mut self, directive: impl Into<String>, value: DirectiveValue) -> Self {
        self.pile.push(directive, value);
        self
    }

    pub fn has_hostless_key(&self) -> bool {
        self.keys.iter().any(Address::is_hostless)
    }

    /// Whether any hostless key of this block is served over TLS
    pub fn has_tls_hostless_key(&self, https_port: u16) -> bool {
        self.keys
            .iter()
            .any(|key| key.is_hostless() && key.is_tls_enabled(https_port))
    }

    /// Unique hostnames of the block, in key order
    ///
    /// A hostless key matches every host, so a block that has one has no
    /// hostnames of its own.
    pub fn hostnames(&self) -> Vec<String> {
        if self.has_hostless_key() {
            return Vec::new();
        }
        let mut hosts: Vec<String> = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            if !hosts.contains(&key.host) {
                hosts.push(key.host.clone());
            }
        }
        hosts
    }

    /// Hosts that share this block with a hostless key
    pub fn hosts_shared_with_hostless_key(&self) -> Vec<&str> {
        if !self.has_hostless_key() {
            return Vec::new();
        }
        self.keys
            .iter()
            .filter(|key| !key.is_hostless())
            .map(|key| key.host.as_str())
            .collect()
    }
}

/// Server blocks sharing a network address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerBlockPairing {
    pub server_blocks: Vec<ServerBlock>,
}

impl ServerBlockPairing {
    pub fn new(server_blocks: Vec<ServerBlock>) -> Self {
        Self { server_blocks }
    }
}
