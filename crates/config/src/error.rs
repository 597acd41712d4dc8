//! Error types for TLS automation policy compilation.
//!
//! Every error aborts the compilation; none of them are retried.

use autotls_common::ModuleId;
use thiserror::Error;

/// Reasons a configuration would make certificate management ambiguous
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Ambiguity {
    /// More than one server block has a TLS-enabled key without a host
    #[error(
        "cannot make a TLS automation policy from a server block that has a host-less address \
         when there are other TLS-enabled server block addresses lacking a host"
    )]
    MultipleHostlessBlocks,

    /// A block sharing the catch-all policy asked for a different issuer
    #[error(
        "automation policy from site block is also default/catch-all policy because of key \
         without hostname, and the two are in conflict: {existing} != {requested}"
    )]
    CatchAllIssuerConflict { existing: String, requested: String },

    /// The same subject ended up in two policies
    #[error(
        "hostname appears in more than one automation policy, making certificate management \
         ambiguous: {subject}"
    )]
    SubjectInMultiplePolicies { subject: String },
}

/// Errors produced while building the TLS app
#[derive(Debug, Error)]
pub enum TlsPolicyError {
    /// An explicit issuer was combined with options that configure another issuer
    #[error(
        "global options are ambiguous: cert_issuer is confusing when combined with {}",
        .conflicting.join(", ")
    )]
    ConfigConflict { conflicting: Vec<&'static str> },

    /// A referenced module is not registered
    #[error(
        "getting DNS provider module named '{}': module '{}' is not registered",
        .module.name(),
        .module
    )]
    ModuleNotFound { module: ModuleId },

    #[error("ambiguous TLS automation policy: {0}")]
    AmbiguousPolicy(#[from] Ambiguity),

    /// Hostname is not valid for any certificate
    #[error("subject does not qualify for certificate: '{subject}'")]
    SubjectRejected { subject: String },

    /// A recognized directive carried a value of the wrong kind
    #[error("directive '{directive}' carries an unexpected {found} value")]
    InvalidDirective {
        directive: String,
        found: &'static str,
    },
}

/// Result type alias for policy compilation
pub type TlsPolicyResult<T> = Result<T, TlsPolicyError>;

impl TlsPolicyError {
    /// The subject an error is about, when there is one
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::SubjectRejected { subject } => Some(subject),
            Self::AmbiguousPolicy(Ambiguity::SubjectInMultiplePolicies { subject }) => {
                Some(subject)
            }
            _ => None,
        }
    }

    pub fn is_ambiguity(&self) -> bool {
        matches!(self, Self::AmbiguousPolicy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_conflict_lists_options() {
        let err = TlsPolicyError::ConfigConflict {
            conflicting: vec!["acme_ca", "email"],
        };
        assert_eq!(
            err.to_string(),
            "global options are ambiguous: cert_issuer is confusing when combined with acme_ca, email"
        );
    }

    #[test]
    fn test_module_not_found_names_provider() {
        let err = TlsPolicyError::ModuleNotFound {
            module: ModuleId::dns_provider("nope"),
        };
        let msg = err.to_string();
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("dns.providers.nope"));
    }

    #[test]
    fn test_subject_accessor() {
        let err: TlsPolicyError = Ambiguity::SubjectInMultiplePolicies {
            subject: "a.example".to_string(),
        }
        .into();
        assert!(err.is_ambiguity());
        assert_eq!(err.subject(), Some("a.example"));
        assert!(err.to_string().ends_with("ambiguous: a.example"));

        let err = TlsPolicyError::SubjectRejected {
            subject: "bad host".to_string(),
        };
        assert_eq!(err.subject(), Some("bad host"));
        assert!(!err.is_ambiguity());
    }
}
