//! autotls TLS policy compiler
//!
//! Turns already-parsed server blocks and global options into the TLS app
//! configuration: certificate automation policies, certificate loaders and
//! on-demand settings. Configuration that would be ambiguous at handshake
//! time is rejected.
//!
//! - **Issuers**: ACME, ZeroSSL, internal and custom issuers as a closed set
//! - **Policies**: per-block policies, a shared catch-all, public/internal split
//! - **Consolidation**: specificity ordering and merging of equivalent policies
//! - **Loaders**: same-kind certificate loaders combined into one entry
//!
//! # Example
//!
//! ```ignore
//! use autotls_config::{
//!     Address, GlobalOptions, ServerBlock, ServerBlockPairing, StaticModuleRegistry,
//!     TlsAppBuilder,
//! };
//!
//! let options = GlobalOptions::default();
//! let registry = StaticModuleRegistry::with_builtin_dns_providers();
//! let pairing = ServerBlockPairing::new(vec![ServerBlock::new(vec![
//!     Address::with_host("example.com"),
//! ])]);
//!
//! let output = TlsAppBuilder::new(&options, &registry).build(&[pairing])?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod block;
pub mod builder;
pub mod consolidate;
pub mod encode;
pub mod error;
pub mod issuer;
pub mod loader;
pub mod options;
pub mod policy;
pub mod registry;
pub mod subject;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Input
pub use block::{Address, DirectiveValue, Pile, ServerBlock, ServerBlockPairing};
pub use options::{GlobalOptions, OnDemandConfig, OnDemandRateLimit, DEFAULT_HTTPS_PORT};

// Building
pub use builder::{BuildOutput, TlsAppBuilder};
pub use consolidate::consolidate_automation_policies;
pub use registry::{ModuleRegistry, StaticModuleRegistry};

// Output
pub use policy::{AutomationConfig, AutomationPolicy, TlsApp};

// Issuers and loaders
pub use issuer::{
    AcmeIssuer, CustomIssuer, ExternalAccountBinding, InternalIssuer, Issuer, ZeroSslIssuer,
};
pub use loader::{CertificateLoader, Mergeable};

// Errors
pub use error::{Ambiguity, TlsPolicyError, TlsPolicyResult};
