//! Resource groups

use super::Tags;
use crate::resource::schema::{Diagnostics, Resource};
use crate::resource::validate;
use crate::resourceid::{IdError, IdFormat, ParsedId, ResourceId, Segment, RESOURCE_GROUPS, SUBSCRIPTIONS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroupId {
    pub subscription_id: String,
    pub name: String,
}

impl ResourceGroupId {
    pub fn new(subscription_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for ResourceGroupId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            name: parsed.take("resourceGroupName")?,
        })
    }

    fn values(&self) -> Vec<&str> {
        vec![self.subscription_id.as_str(), self.name.as_str()]
    }
}

impl fmt::Display for ResourceGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for ResourceGroupId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceGroupArgs {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupState {
    pub id: String,
    pub name: String,
    pub location: String,
    pub tags: Tags,
}

#[derive(Debug, Deserialize)]
struct Model {
    location: String,
    #[serde(default)]
    tags: Option<Tags>,
}

pub struct ResourceGroup;

impl Resource for ResourceGroup {
    const TYPE_NAME: &'static str = "azurerm_resource_group";
    const API_VERSION: &'static str = "2021-04-01";

    type Id = ResourceGroupId;
    type Args = ResourceGroupArgs;
    type State = ResourceGroupState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        ResourceGroupId::new(subscription_id, &args.name)
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::resource_group_name(diags, "name", &args.name);
        validate::location(diags, "location", &args.location);
        validate::tags(diags, "tags", &args.tags);
    }

    fn expand(args: &Self::Args) -> Value {
        json!({
            "location": validate::normalize_location(&args.location),
            "tags": args.tags,
        })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected resource group body")?;
        Ok(ResourceGroupState {
            id: id.to_string(),
            name: id.name.clone(),
            location: validate::normalize_location(&model.location),
            tags: model.tags.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let id = ResourceGroupId::new("sub1", "rg1");
        assert_eq!(id.to_string(), "/subscriptions/sub1/resourceGroups/rg1");
        assert_eq!(ResourceGroupId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_id_rejects_child_resource() {
        let err = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Batch/batchAccounts/a"
            .parse::<ResourceGroupId>()
            .unwrap_err();
        assert!(matches!(err, IdError::UnexpectedSegments { .. }));
    }

    #[test]
    fn test_expand_normalizes_location() {
        let args: ResourceGroupArgs =
            serde_json::from_value(json!({"name": "rg1", "location": "West Europe"})).unwrap();
        assert_eq!(
            ResourceGroup::expand(&args),
            json!({"location": "westeurope", "tags": {}})
        );
    }

    #[test]
    fn test_flatten_tolerates_null_tags() {
        let id = ResourceGroupId::new("sub1", "rg1");
        let state = ResourceGroup::flatten(
            &id,
            json!({"id": id.to_string(), "location": "westeurope", "tags": null}),
        )
        .unwrap();
        assert_eq!(state.name, "rg1");
        assert!(state.tags.is_empty());
    }
}
