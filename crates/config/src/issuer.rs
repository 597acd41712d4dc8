//! Certificate issuers
//!
//! Issuers form a closed set of variants. Code that needs to adjust ACME
//! settings goes through [`Issuer::acme_issuer_mut`], which exposes the
//! underlying ACME issuer of every variant that has one.

use autotls_common::{Warning, Warnings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::encode::{module_object, MODULE_KEY};

/// Host of ZeroSSL's ACME endpoint
pub const ZEROSSL_ACME_HOST: &str = "acme.zerossl.com";

/// ACME external account binding credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccountBinding {
    pub key_id: String,
    pub mac_key: String,
}

/// DNS-01 challenge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsChallengeConfig {
    /// Encoded provider module, discriminated by its `name` key
    pub provider: Value,
}

/// ACME challenge settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengesConfig {
    /// Interface the challenge listeners bind to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsChallengeConfig>,
}

/// Issuer speaking the ACME protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcmeIssuer {
    /// Directory URL of the CA; the default public CA when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenges: Option<ChallengesConfig>,

    /// PEM files of roots trusted when talking to the CA
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_roots_pem_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_account: Option<ExternalAccountBinding>,
}

/// Issuer signing certificates with a locally managed CA
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalIssuer {
    /// Identifier of the local CA to sign with; the default CA when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
}

/// ACME issuer for ZeroSSL, which generates its own EAB credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZeroSslIssuer {
    #[serde(flatten)]
    pub acme: AcmeIssuer,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Module names of the built-in issuers; custom issuers may not take them
pub const BUILTIN_ISSUER_NAMES: &[&str] = &["acme", "internal", "zerossl"];

/// Issuer module supplied by the user and passed through untouched
///
/// Deserialization rejects the names of built-in issuers, which would
/// otherwise encode indistinguishably from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CustomIssuerFields")]
pub struct CustomIssuer {
    /// Module name written as the issuer's discriminator
    pub name: String,

    #[serde(default)]
    pub config: Map<String, Value>,
}

impl CustomIssuer {
    /// Whether the name belongs to a built-in issuer
    pub fn has_reserved_name(&self) -> bool {
        BUILTIN_ISSUER_NAMES.contains(&self.name.as_str())
    }
}

#[derive(Deserialize)]
struct CustomIssuerFields {
    name: String,

    #[serde(default)]
    config: Map<String, Value>,
}

impl TryFrom<CustomIssuerFields> for CustomIssuer {
    type Error = String;

    fn try_from(fields: CustomIssuerFields) -> Result<Self, Self::Error> {
        let issuer = CustomIssuer {
            name: fields.name,
            config: fields.config,
        };
        if issuer.has_reserved_name() {
            return Err(format!(
                "custom issuer name '{}' is reserved for the built-in issuer",
                issuer.name
            ));
        }
        Ok(issuer)
    }
}

/// A certificate issuer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module")]
pub enum Issuer {
    #[serde(rename = "acme")]
    Acme(AcmeIssuer),
    #[serde(rename = "internal")]
    Internal(InternalIssuer),
    #[serde(rename = "zerossl")]
    ZeroSsl(ZeroSslIssuer),
    #[serde(rename = "custom")]
    Custom(CustomIssuer),
}

impl Issuer {
    /// Module name used as the discriminator when encoding
    pub fn module_name(&self) -> &str {
        match self {
            Issuer::Acme(_) => "acme",
            Issuer::Internal(_) => "internal",
            Issuer::ZeroSsl(_) => "zerossl",
            Issuer::Custom(custom) => &custom.name,
        }
    }

    /// The underlying ACME issuer, for variants that have one
    pub fn acme_issuer(&self) -> Option<&AcmeIssuer> {
        match self {
            Issuer::Acme(acme) => Some(acme),
            Issuer::ZeroSsl(zerossl) => Some(&zerossl.acme),
            Issuer::Internal(_) | Issuer::Custom(_) => None,
        }
    }

    /// Mutable access to the underlying ACME issuer, for variants that have one
    pub fn acme_issuer_mut(&mut self) -> Option<&mut AcmeIssuer> {
        match self {
            Issuer::Acme(acme) => Some(acme),
            Issuer::ZeroSsl(zerossl) => Some(&mut zerossl.acme),
            Issuer::Internal(_) | Issuer::Custom(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Issuer::Internal(_))
    }

    /// Encode as a JSON object discriminated by its module name
    pub fn encode(&self, warnings: &mut Warnings) -> Value {
        let name = self.module_name();
        match self {
            Issuer::Acme(acme) => module_object(acme, MODULE_KEY, name, warnings),
            Issuer::Internal(internal) => module_object(internal, MODULE_KEY, name, warnings),
            Issuer::ZeroSsl(zerossl) => module_object(zerossl, MODULE_KEY, name, warnings),
            Issuer::Custom(custom) => {
                if custom.has_reserved_name() {
                    warnings.push(Warning::new(format!(
                        "custom issuer is named '{}', which encodes the same as the built-in issuer",
                        name
                    )));
                }
                module_object(&custom.config, MODULE_KEY, name, warnings)
            }
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module_name())?;
        if let Some(ca) = self.acme_issuer().and_then(|acme| acme.ca.as_deref()) {
            write!(f, " (ca {})", ca)?;
        }
        Ok(())
    }
}

impl From<AcmeIssuer> for Issuer {
    fn from(acme: AcmeIssuer) -> Self {
        Issuer::Acme(acme)
    }
}

impl From<InternalIssuer> for Issuer {
    fn from(internal: InternalIssuer) -> Self {
        Issuer::Internal(internal)
    }
}

/// Pick the issuer variant implied by an ACME issuer's settings
///
/// A ZeroSSL directory without EAB credentials needs the ZeroSSL wrapper,
/// which generates them; with EAB supplied the plain ACME issuer suffices.
pub fn disambiguate_acme_issuer(acme: AcmeIssuer) -> Issuer {
    let zerossl_ca = acme
        .ca
        .as_deref()
        .is_some_and(|ca| ca.contains(ZEROSSL_ACME_HOST));
    if zerossl_ca && acme.external_account.is_none() {
        return Issuer::ZeroSsl(ZeroSslIssuer { acme, api_key: None });
    }
    Issuer::Acme(acme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn acme_with_ca(ca: &str) -> AcmeIssuer {
        AcmeIssuer {
            ca: Some(ca.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_zerossl_ca_without_eab_is_wrapped() {
        let issuer = disambiguate_acme_issuer(acme_with_ca("https://acme.zerossl.com/v2/DV90"));
        assert!(matches!(issuer, Issuer::ZeroSsl(_)));
        assert_eq!(issuer.module_name(), "zerossl");
    }

    #[test]
    fn test_zerossl_ca_with_eab_stays_plain() {
        let mut acme = acme_with_ca("https://acme.zerossl.com/v2/DV90");
        acme.external_account = Some(ExternalAccountBinding {
            key_id: "kid".to_string(),
            mac_key: "mac".to_string(),
        });

        let issuer = disambiguate_acme_issuer(acme.clone());

        assert_eq!(issuer, Issuer::Acme(acme));
    }

    #[test]
    fn test_other_ca_stays_plain() {
        let acme = acme_with_ca("https://acme-staging-v02.api.letsencrypt.org/directory");
        assert_eq!(disambiguate_acme_issuer(acme.clone()), Issuer::Acme(acme));
        assert_eq!(
            disambiguate_acme_issuer(AcmeIssuer::default()),
            Issuer::Acme(AcmeIssuer::default())
        );
    }

    #[test]
    fn test_acme_capability() {
        let mut zerossl = disambiguate_acme_issuer(acme_with_ca("https://acme.zerossl.com/v2/DV90"));
        zerossl.acme_issuer_mut().unwrap().email = Some("ops@example.com".to_string());
        assert_eq!(
            zerossl.acme_issuer().unwrap().email.as_deref(),
            Some("ops@example.com")
        );

        let mut internal = Issuer::Internal(InternalIssuer::default());
        assert!(internal.acme_issuer_mut().is_none());

        let mut custom = Issuer::Custom(CustomIssuer {
            name: "vault".to_string(),
            config: Map::new(),
        });
        assert!(custom.acme_issuer_mut().is_none());
    }

    #[test]
    fn test_encode_variants() {
        let mut warnings = Warnings::new();

        let acme = Issuer::Acme(AcmeIssuer {
            email: Some("ops@example.com".to_string()),
            ..Default::default()
        });
        assert_eq!(
            acme.encode(&mut warnings),
            json!({"module": "acme", "email": "ops@example.com"})
        );

        let internal = Issuer::Internal(InternalIssuer::default());
        assert_eq!(internal.encode(&mut warnings), json!({"module": "internal"}));

        let zerossl = disambiguate_acme_issuer(acme_with_ca("https://acme.zerossl.com/v2/DV90"));
        assert_eq!(
            zerossl.encode(&mut warnings),
            json!({"module": "zerossl", "ca": "https://acme.zerossl.com/v2/DV90"})
        );

        let mut config = Map::new();
        config.insert("path".to_string(), json!("pki"));
        let custom = Issuer::Custom(CustomIssuer {
            name: "vault".to_string(),
            config,
        });
        assert_eq!(
            custom.encode(&mut warnings),
            json!({"module": "vault", "path": "pki"})
        );

        assert!(warnings.is_empty());
    }

    #[test]
    fn test_deserialize_tagged_issuer() {
        let issuer: Issuer =
            serde_json::from_value(json!({"module": "acme", "ca": "https://ca.example/dir"}))
                .unwrap();
        assert_eq!(issuer, Issuer::Acme(acme_with_ca("https://ca.example/dir")));

        let issuer: Issuer = serde_json::from_value(json!({"module": "internal"})).unwrap();
        assert!(issuer.is_internal());
    }

    #[test]
    fn test_custom_issuer_cannot_take_builtin_name() {
        for name in BUILTIN_ISSUER_NAMES {
            let result: Result<Issuer, _> =
                serde_json::from_value(json!({"module": "custom", "name": name}));
            let err = result.unwrap_err();
            assert!(err.to_string().contains("is reserved"), "{err}");
        }

        let issuer: Issuer = serde_json::from_value(
            json!({"module": "custom", "name": "vault", "config": {"path": "pki"}}),
        )
        .unwrap();
        assert_eq!(issuer.module_name(), "vault");
    }

    #[test]
    fn test_encoding_reserved_custom_name_warns() {
        let mut warnings = Warnings::new();
        let custom = Issuer::Custom(CustomIssuer {
            name: "acme".to_string(),
            config: Map::new(),
        });

        assert_eq!(custom.encode(&mut warnings), json!({"module": "acme"}));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_display_includes_ca() {
        let issuer = Issuer::Acme(acme_with_ca("https://ca.example/dir"));
        assert_eq!(issuer.to_string(), "acme (ca https://ca.example/dir)");
        assert_eq!(Issuer::Internal(InternalIssuer::default()).to_string(), "internal");
    }
}
