//! azrm - Azure resource management from declarative manifests
//!
//! # Module Structure
//!
//! - [`resourceid`] - Strict codec for ARM resource ids
//! - [`resource`] - Resource types, their registry and the CRUD provider
//! - [`arm`] - Azure Resource Manager REST client
//! - [`manifest`] - YAML manifests listing resources to apply
//! - [`config`] - Persistent user configuration

pub mod arm;
pub mod config;
pub mod manifest;
pub mod resource;
pub mod resourceid;

/// Version injected at compile time via AZRM_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZRM_VERSION") {
    Some(v) => v,
    None => "dev",
};
