//! Certificate loaders
//!
//! Loaders supply certificates that exist before automation runs (files,
//! folders, PEM blobs) or name hosts to manage unconditionally. The output
//! holds one loader per kind, so repeated directives of the same kind are
//! merged through [`Mergeable`].

use autotls_common::{Warning, Warnings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::encode::to_json;

/// Name of the loader kind that manages listed hosts
pub const AUTOMATE_LOADER: &str = "automate";

/// Certificate and key loaded from files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertKeyFilePair {
    pub certificate: String,
    pub key: String,

    /// Encoding of the files; PEM when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Certificate and key given inline as PEM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertKeyPemPair {
    pub certificate: String,
    pub key: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Certificates loaded from the configured storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLoader {
    pub pairs: Vec<CertKeyPemPair>,
}

/// A source of certificates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateLoader {
    LoadFiles(Vec<CertKeyFilePair>),
    LoadFolders(Vec<String>),
    LoadPem(Vec<CertKeyPemPair>),
    LoadStorage(StorageLoader),
    Automate(Vec<String>),
}

/// Values that can absorb another value of the same kind
pub trait Mergeable: Sized {
    /// Append `other` to `self`, or hand it back when the kinds differ or
    /// cannot be combined
    fn append(&mut self, other: Self) -> Result<(), Self>;
}

impl CertificateLoader {
    /// Kind name, also the key of the loader in the output
    pub fn module_name(&self) -> &'static str {
        match self {
            CertificateLoader::LoadFiles(_) => "load_files",
            CertificateLoader::LoadFolders(_) => "load_folders",
            CertificateLoader::LoadPem(_) => "load_pem",
            CertificateLoader::LoadStorage(_) => "load_storage",
            CertificateLoader::Automate(_) => AUTOMATE_LOADER,
        }
    }

    /// Whether the loader is a plain sequence of entries
    pub fn is_sequence(&self) -> bool {
        !matches!(self, CertificateLoader::LoadStorage(_))
    }

    /// Encode the loader's settings (without its kind name)
    pub fn encode(&self, warnings: &mut Warnings) -> Value {
        match self {
            CertificateLoader::LoadFiles(pairs) => to_json(pairs, warnings),
            CertificateLoader::LoadFolders(folders) => to_json(folders, warnings),
            CertificateLoader::LoadPem(pairs) => to_json(pairs, warnings),
            CertificateLoader::LoadStorage(storage) => to_json(storage, warnings),
            CertificateLoader::Automate(hosts) => to_json(hosts, warnings),
        }
    }
}

impl Mergeable for CertificateLoader {
    fn append(&mut self, other: Self) -> Result<(), Self> {
        match (self, other) {
            (CertificateLoader::LoadFiles(ours), CertificateLoader::LoadFiles(theirs)) => {
                ours.extend(theirs);
                Ok(())
            }
            (CertificateLoader::LoadFolders(ours), CertificateLoader::LoadFolders(theirs)) => {
                ours.extend(theirs);
                Ok(())
            }
            (CertificateLoader::LoadPem(ours), CertificateLoader::LoadPem(theirs)) => {
                ours.extend(theirs);
                Ok(())
            }
            (CertificateLoader::Automate(ours), CertificateLoader::Automate(theirs)) => {
                ours.extend(theirs);
                Ok(())
            }
            (_, other) => Err(other),
        }
    }
}

/// Group loaders by kind, combining same-kind loaders into one
///
/// Sequence kinds are concatenated in input order. A second loader of a
/// non-sequence kind cannot be combined; the first one is kept and a warning
/// is recorded.
pub fn merge_certificate_loaders(
    loaders: Vec<CertificateLoader>,
    warnings: &mut Warnings,
) -> BTreeMap<&'static str, CertificateLoader> {
    let mut by_kind: BTreeMap<&'static str, CertificateLoader> = BTreeMap::new();

    for loader in loaders {
        let kind = loader.module_name();
        match by_kind.get_mut(kind) {
            None => {
                by_kind.insert(kind, loader);
            }
            Some(merged) => {
                if merged.append(loader).is_err() {
                    warnings.push(Warning::for_directive(
                        "tls.cert_loader",
                        format!(
                            "only one '{}' certificate loader is supported; ignoring the extra one",
                            kind
                        ),
                    ));
                }
            }
        }
    }

    trace!(kinds = by_kind.len(), "Merged certificate loaders");
    by_kind
}
