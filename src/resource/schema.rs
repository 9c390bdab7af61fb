//! Resource schema traits
//!
//! Each resource type implements [`Resource`] with strongly typed arguments,
//! state and id. [`Handler`] adapts any `Resource` to the object-safe
//! [`ResourceHandler`] so the registry can hold every type behind one map.
//! Arguments arrive as JSON and are decoded exactly once, in
//! [`ResourceHandler::plan`].

use super::validate;
use crate::resourceid::{IdError, IdFormat, ResourceId};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub field: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.field, self.message)
    }
}

/// Validation problems collected over a whole argument set
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.items.push(Diagnostic {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// `Ok` when nothing was collected
    pub fn into_result(self, resource_type: &str) -> Result<(), ValidationErrors> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                resource_type: resource_type.to_string(),
                diagnostics: self.items,
            })
        }
    }
}

/// Arguments for a resource type failed validation
#[derive(Debug, Clone, Error)]
#[error("invalid {resource_type} arguments: {}", join(.diagnostics))]
pub struct ValidationErrors {
    pub resource_type: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationErrors {
    pub fn single(resource_type: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            diagnostics: vec![Diagnostic {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }
}

fn join(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A validated create/update request
#[derive(Debug, Clone, PartialEq)]
pub struct Planned {
    /// Canonical id the arguments address
    pub id: String,
    /// Request body for the PUT
    pub body: Value,
}

/// A resource type with typed arguments, id and state
pub trait Resource: Send + Sync + 'static {
    /// Name used in manifests, e.g. `azurerm_batch_pool`
    const TYPE_NAME: &'static str;
    /// ARM `api-version` query parameter
    const API_VERSION: &'static str;

    type Id: ResourceId + Serialize;
    type Args: DeserializeOwned;
    type State: Serialize;

    /// The id the arguments address within a subscription
    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id;

    /// Collect every problem with the arguments
    fn validate(args: &Self::Args, diags: &mut Diagnostics);

    /// Build the request body
    fn expand(args: &Self::Args) -> Value;

    /// Decode an API response into state
    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State>;
}

/// Object-safe view of a resource type, as stored in the registry
pub trait ResourceHandler: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn api_version(&self) -> &'static str;

    fn id_format(&self) -> IdFormat;

    /// ARM resource type, e.g. `Microsoft.Batch/batchAccounts`
    fn arm_type(&self) -> String {
        self.id_format().arm_type()
    }

    /// Decode and validate arguments, yielding the target id and request body
    fn plan(&self, args: &Value, subscription_id: &str) -> Result<Planned, ValidationErrors>;

    /// Strictly decode an id of this type and re-encode it
    fn canonical_id(&self, id: &str) -> Result<String, IdError>;

    /// Strictly decode an id of this type into its named fields
    fn decode_id(&self, id: &str) -> Result<Value>;

    /// Flatten an API response for `id` into state
    fn state(&self, id: &str, body: Value) -> Result<Value>;
}

/// Adapts a [`Resource`] to [`ResourceHandler`]
pub struct Handler<R>(PhantomData<fn() -> R>);

impl<R> Handler<R> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R> Default for Handler<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ResourceHandler for Handler<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn api_version(&self) -> &'static str {
        R::API_VERSION
    }

    fn id_format(&self) -> IdFormat {
        <R::Id as ResourceId>::FORMAT
    }

    fn plan(&self, args: &Value, subscription_id: &str) -> Result<Planned, ValidationErrors> {
        let args: R::Args = serde_json::from_value(args.clone())
            .map_err(|e| ValidationErrors::single(R::TYPE_NAME, "args", e.to_string()))?;

        let mut diags = Diagnostics::new();
        validate::subscription_id(&mut diags, "subscription_id", subscription_id);
        R::validate(&args, &mut diags);
        diags.into_result(R::TYPE_NAME)?;

        let id = R::id(&args, subscription_id)
            .try_id()
            .map_err(|e| ValidationErrors::single(R::TYPE_NAME, "id", e.to_string()))?;
        tracing::debug!("planned {} {}", R::TYPE_NAME, id);

        Ok(Planned {
            id,
            body: R::expand(&args),
        })
    }

    fn canonical_id(&self, id: &str) -> Result<String, IdError> {
        <R::Id as ResourceId>::parse(id).map(|parsed| parsed.id())
    }

    fn decode_id(&self, id: &str) -> Result<Value> {
        let parsed = <R::Id as ResourceId>::parse(id)?;
        serde_json::to_value(&parsed).context("Failed to serialize resource id")
    }

    fn state(&self, id: &str, body: Value) -> Result<Value> {
        let parsed = <R::Id as ResourceId>::parse(id)?;
        let state = R::flatten(&parsed, body)
            .with_context(|| format!("Failed to read {} response", R::TYPE_NAME))?;
        serde_json::to_value(state).context("Failed to serialize state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_errors_display_lists_every_diagnostic() {
        let mut diags = Diagnostics::new();
        diags.push("name", "too long");
        diags.push("location", "must not be empty");
        assert_eq!(diags.len(), 2);

        let err = diags.into_result("azurerm_thing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid azurerm_thing arguments: `name`: too long; `location`: must not be empty"
        );
    }

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn resource_group() -> Handler<crate::resource::types::resource_group::ResourceGroup> {
        Handler::new()
    }

    #[test]
    fn test_plan_yields_decodable_id() {
        let handler = resource_group();
        let planned = handler
            .plan(&json!({"name": "rg1", "location": "westeurope"}), SUB)
            .unwrap();
        assert_eq!(planned.id, format!("/subscriptions/{}/resourceGroups/rg1", SUB));
        assert_eq!(handler.canonical_id(&planned.id).unwrap(), planned.id);
    }

    #[test]
    fn test_plan_rejects_invalid_subscription() {
        let handler = resource_group();
        let args = json!({"name": "rg1", "location": "westeurope"});

        for subscription in ["", "not-a-guid", "sub1/resourceGroups/other"] {
            let err = handler.plan(&args, subscription).unwrap_err();
            assert_eq!(err.diagnostics.len(), 1, "for {:?}", subscription);
            assert_eq!(err.diagnostics[0].field, "subscription_id");
        }
    }

    #[test]
    fn test_empty_diagnostics_is_ok() {
        assert!(Diagnostics::new().into_result("azurerm_thing").is_ok());
    }
}
