//! Global options affecting certificate automation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::issuer::{ExternalAccountBinding, Issuer};

/// Default port for HTTPS
pub const DEFAULT_HTTPS_PORT: u16 = 443;

fn default_https_port() -> u16 {
    DEFAULT_HTTPS_PORT
}

/// Limits on how fast on-demand certificates may be obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandRateLimit {
    /// Window length, e.g. `"2m"`
    pub interval: String,
    /// Certificates allowed per window
    pub burst: u32,
}

/// Settings that apply whenever on-demand TLS is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandConfig {
    /// Endpoint asked for permission before obtaining a certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<OnDemandRateLimit>,
}

/// Global options recognized by the TLS policy compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Port considered to serve HTTPS
    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Explicit issuer for every policy
    pub cert_issuer: Option<Issuer>,

    /// ACME directory URL
    pub acme_ca: Option<String>,

    /// PEM file with the root of the ACME CA
    pub acme_ca_root: Option<String>,

    /// Name of the DNS provider used for the DNS-01 challenge
    pub acme_dns: Option<String>,

    pub acme_eab: Option<ExternalAccountBinding>,

    /// ACME account email
    pub email: Option<String>,

    /// Use the internal issuer for every certificate
    pub local_certs: bool,

    pub key_type: Option<String>,

    pub must_staple: bool,

    /// Storage module for certificates of every policy
    pub storage: Option<Value>,

    /// Fraction of a certificate's lifetime left when renewal starts
    pub renewal_window_ratio: Option<f64>,

    pub on_demand_tls: Option<OnDemandConfig>,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            https_port: default_https_port(),
            cert_issuer: None,
            acme_ca: None,
            acme_ca_root: None,
            acme_dns: None,
            acme_eab: None,
            email: None,
            local_certs: false,
            key_type: None,
            must_staple: false,
            storage: None,
            renewal_window_ratio: None,
            on_demand_tls: None,
        }
    }
}

impl GlobalOptions {
    /// Whether any option shaping automation policies is set
    pub fn has_automation_options(&self) -> bool {
        self.cert_issuer.is_some()
            || self.local_certs
            || self.key_type.is_some()
            || self.must_staple
            || self.storage.is_some()
            || self.renewal_window_ratio.is_some()
            || !self.issuer_options().is_empty()
    }

    /// Names of the set options that configure an issuer implicitly
    pub fn issuer_options(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.acme_ca.is_some() {
            set.push("acme_ca");
        }
        if self.acme_ca_root.is_some() {
            set.push("acme_ca_root");
        }
        if self.acme_dns.is_some() {
            set.push("acme_dns");
        }
        if self.acme_eab.is_some() {
            set.push("acme_eab");
        }
        if self.email.is_some() {
            set.push("email");
        }
        if self.local_certs {
            set.push("local_certs");
        }
        set
    }

    /// Whether the options choose an issuer on purpose rather than by default
    pub fn chooses_issuer(&self) -> bool {
        self.cert_issuer.is_some() || self.local_certs
    }
}
