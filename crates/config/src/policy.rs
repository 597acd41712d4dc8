//! Automation policies and the TLS app they are assembled into
//!
//! An automation policy governs how certificates are obtained for its
//! subjects. A policy without subjects is a catch-all for every name not
//! claimed by another policy.

use autotls_common::{ModuleId, Warning, Warnings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::encode::{module_object, PROVIDER_KEY};
use crate::error::{TlsPolicyError, TlsPolicyResult};
use crate::issuer::{
    disambiguate_acme_issuer, AcmeIssuer, ChallengesConfig, DnsChallengeConfig, InternalIssuer,
    Issuer,
};
use crate::options::{GlobalOptions, OnDemandConfig};
use crate::registry::ModuleRegistry;
use crate::subject::match_wildcard;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Rules for obtaining certificates for a group of subjects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationPolicy {
    /// Hostnames, IPs and wildcard patterns this policy governs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<String>,

    /// Issuer while the policy is being built
    #[serde(skip)]
    pub issuer: Option<Issuer>,

    /// Encoded issuer, set during finalization
    #[serde(rename = "issuer", default, skip_serializing_if = "Option::is_none")]
    pub issuer_raw: Option<Value>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub must_staple: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_window_ratio: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,

    /// Obtain certificates at first handshake instead of ahead of time
    #[serde(default, skip_serializing_if = "is_false")]
    pub on_demand: bool,
}

impl AutomationPolicy {
    /// Policy with the given subjects and issuer, everything else default
    pub fn for_subjects(subjects: Vec<String>, issuer: Option<Issuer>) -> Self {
        Self {
            subjects,
            issuer,
            ..Default::default()
        }
    }

    /// Policy for internal-only subjects
    pub fn internal(subjects: Vec<String>) -> Self {
        Self::for_subjects(subjects, Some(Issuer::Internal(InternalIssuer::default())))
    }

    pub fn is_catch_all(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Whether every setting apart from the subjects is at its default
    pub fn is_empty_apart_from_subjects(&self) -> bool {
        let empty = AutomationPolicy {
            subjects: self.subjects.clone(),
            ..Default::default()
        };
        *self == empty
    }

    /// Whether both policies configure certificates the same way
    pub fn has_same_settings(&self, other: &AutomationPolicy) -> bool {
        self.issuer_raw == other.issuer_raw
            && self.storage == other.storage
            && self.must_staple == other.must_staple
            && self.key_type == other.key_type
            && self.on_demand == other.on_demand
            && self.renewal_window_ratio == other.renewal_window_ratio
    }

    /// Whether this policy applies to `hostname`
    ///
    /// A catch-all applies to every name.
    pub fn matches(&self, hostname: &str) -> bool {
        self.is_catch_all()
            || self
                .subjects
                .iter()
                .any(|subject| match_wildcard(hostname, subject))
    }

    /// Whether this policy's subjects all fall under `other`'s subjects
    ///
    /// A catch-all contains every policy, and is itself contained only in
    /// another catch-all.
    pub fn is_subset_of(&self, other: &AutomationPolicy) -> bool {
        if other.subjects.is_empty() {
            return true;
        }
        if self.subjects.is_empty() {
            return false;
        }
        self.subjects.iter().all(|subject| {
            other
                .subjects
                .iter()
                .any(|candidate| match_wildcard(subject, candidate))
        })
    }

    /// Encode the issuer into `issuer_raw` unless that already happened
    pub fn encode_issuer(&mut self, warnings: &mut Warnings) {
        if self.issuer_raw.is_some() {
            return;
        }
        if let Some(issuer) = &self.issuer {
            self.issuer_raw = Some(issuer.encode(warnings));
        }
    }
}

/// Automation section of the TLS app
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Policies ordered from most to least specific
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<AutomationPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_demand: Option<OnDemandConfig>,
}

impl AutomationConfig {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.on_demand.is_none()
    }
}

/// Compiled TLS app configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsApp {
    /// Encoded certificate loaders keyed by loader kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub certificates: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<AutomationConfig>,
}

impl TlsApp {
    /// Policies of the automation section; empty when there is none
    pub fn policies(&self) -> &[AutomationPolicy] {
        self.automation
            .as_ref()
            .map(|automation| automation.policies.as_slice())
            .unwrap_or(&[])
    }
}

/// Build the policy implied by global options alone
///
/// Returns `None` when no global option shapes automation, unless `always`
/// is set, in which case an empty policy is returned instead.
pub fn base_automation_policy(
    options: &GlobalOptions,
    registry: &dyn ModuleRegistry,
    warnings: &mut Warnings,
    always: bool,
) -> TlsPolicyResult<Option<AutomationPolicy>> {
    if !options.has_automation_options() {
        return Ok(always.then(AutomationPolicy::default));
    }

    let mut policy = AutomationPolicy {
        key_type: options.key_type.clone(),
        must_staple: options.must_staple,
        storage: options.storage.clone(),
        renewal_window_ratio: options.renewal_window_ratio,
        ..Default::default()
    };

    if let Some(issuer) = &options.cert_issuer {
        let conflicting = options.issuer_options();
        if !conflicting.is_empty() {
            return Err(TlsPolicyError::ConfigConflict { conflicting });
        }
        policy.issuer = Some(issuer.clone());
    } else if options.local_certs {
        policy.issuer = Some(Issuer::Internal(InternalIssuer::default()));
    } else {
        let mut acme = AcmeIssuer {
            ca: options.acme_ca.clone(),
            email: options.email.clone(),
            external_account: options.acme_eab.clone(),
            ..Default::default()
        };
        if let Some(provider) = &options.acme_dns {
            acme.challenges = Some(ChallengesConfig {
                bind_host: None,
                dns: Some(dns_challenge(provider, registry, warnings)?),
            });
        }
        if let Some(root) = &options.acme_ca_root {
            acme.trusted_roots_pem_files = vec![root.clone()];
        }
        policy.issuer = Some(disambiguate_acme_issuer(acme));
    }

    trace!(
        issuer = ?policy.issuer.as_ref().map(Issuer::module_name),
        key_type = ?policy.key_type,
        "Built base automation policy from global options"
    );

    Ok(Some(policy))
}

fn dns_challenge(
    provider: &str,
    registry: &dyn ModuleRegistry,
    warnings: &mut Warnings,
) -> TlsPolicyResult<DnsChallengeConfig> {
    let module = ModuleId::dns_provider(provider);
    let defaults = registry
        .instantiate(&module)
        .ok_or_else(|| TlsPolicyError::ModuleNotFound {
            module: module.clone(),
        })?;
    if defaults.contains_key(PROVIDER_KEY) {
        warnings.push(Warning::new(format!(
            "default settings of module '{}' define '{}', which is replaced by the provider name",
            module, PROVIDER_KEY
        )));
    }
    Ok(DnsChallengeConfig {
        provider: module_object(&defaults, PROVIDER_KEY, provider, warnings),
    })
}
