//! Common utilities and shared components for autotls
//!
//! This crate provides functionality shared by the policy compiler and its
//! command line front end.
//!
//! # Module Organization
//!
//! - [`ids`]: Type-safe identifier newtypes (PolicyId, ModuleId)
//! - [`warnings`]: Non-fatal warnings accumulated during compilation
//! - [`observability`]: Logging setup (runtime only)

pub mod ids;
#[cfg(feature = "runtime")]
pub mod observability;
pub mod warnings;

// Re-export identifier types
pub use ids::{ModuleId, PolicyId};

// Re-export warning types
pub use warnings::{Warning, Warnings};

#[cfg(feature = "runtime")]
pub use observability::init_tracing;
