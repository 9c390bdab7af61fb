//! Resource identifier codec
//!
//! Every ARM resource is addressed by a hierarchical, path-like string:
//!
//! ```text
//! /subscriptions/{subscriptionId}/resourceGroups/{resourceGroup}/providers/{Namespace}/{type}/{name}
//! ```
//!
//! Child resources append further `/{childType}/{childName}` pairs.
//!
//! # Module Structure
//!
//! - [`format`] - Fixed per-type formats ([`IdFormat`]) used by the typed ids
//! - [`generic`] - [`ResourceIdentifier`], a decoder for arbitrary ids
//!
//! Decoding is strict: path keywords must match their canonical spelling
//! exactly (`resourceGroups`, never `RESOURCEGROUPS`), even though the platform
//! itself compares ids case-insensitively. Callers that need case-insensitive
//! comparison must normalize before decoding.
//!
//! # Example
//!
//! ```ignore
//! use azrm::resource::types::batch_pool::BatchPoolId;
//! use azrm::resourceid::ResourceId;
//!
//! let id = BatchPoolId::parse(
//!     "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Batch/batchAccounts/account1/pools/pool1",
//! )?;
//! assert_eq!(id.batch_account_name, "account1");
//! ```

pub mod format;
pub mod generic;

pub use format::{IdFormat, ParsedId, Segment, PROVIDERS, RESOURCE_GROUPS, SUBSCRIPTIONS};
pub use generic::{ResourceIdentifier, ResourceSegment};

use thiserror::Error;

/// Errors produced while decoding or encoding a resource id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Input is empty, a keyword is missing or misspelled, or a value is empty
    #[error("malformed resource id {input:?}: {reason}")]
    MalformedIdentifier { input: String, reason: String },

    /// All known segments were consumed but the path continues
    #[error("resource id {input:?} has unexpected trailing segments {remaining:?}")]
    UnexpectedSegments { input: String, remaining: String },
}

impl IdError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected(input: &str, remaining: &[&str]) -> Self {
        Self::UnexpectedSegments {
            input: input.to_string(),
            remaining: remaining.join("/"),
        }
    }
}

/// A typed identifier for one resource type.
///
/// Implementors hold one `String` per user-supplied segment of their
/// [`IdFormat`], in format order. Encoding is the format with the values
/// substituted; decoding is [`IdFormat::parse`] followed by
/// [`ResourceId::from_parsed`].
pub trait ResourceId: Sized + std::fmt::Display {
    /// The fixed format of this id
    const FORMAT: IdFormat;

    /// Build the typed id from the decoded field values
    fn from_parsed(parsed: ParsedId) -> Result<Self, IdError>;

    /// Segment values in format order
    fn values(&self) -> Vec<&str>;

    /// Decode an id string
    fn parse(input: &str) -> Result<Self, IdError> {
        Self::from_parsed(Self::FORMAT.parse(input)?)
    }

    /// Encode to the canonical id string
    fn id(&self) -> String {
        Self::FORMAT.render(&self.values())
    }

    /// Encode, rejecting empty values and values containing `/`
    fn try_id(&self) -> Result<String, IdError> {
        Self::FORMAT.format(&self.values())
    }
}
