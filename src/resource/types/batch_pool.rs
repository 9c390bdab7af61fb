//! Batch pools
//!
//! A pool is a child of a batch account and has no location or tags of its
//! own. Exactly one of `fixed_scale` or `auto_scale` must be given.

use crate::resource::schema::{Diagnostics, Resource};
use crate::resource::validate;
use crate::resourceid::{
    IdError, IdFormat, ParsedId, ResourceId, Segment, RESOURCE_GROUPS, SUBSCRIPTIONS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPoolId {
    pub subscription_id: String,
    pub resource_group: String,
    pub batch_account_name: String,
    pub name: String,
}

impl BatchPoolId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        batch_account_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            batch_account_name: batch_account_name.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for BatchPoolId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Batch"),
        Segment::keyed("batchAccounts", "batchAccountName"),
        Segment::keyed("pools", "poolName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            resource_group: parsed.take("resourceGroupName")?,
            batch_account_name: parsed.take("batchAccountName")?,
            name: parsed.take("poolName")?,
        })
    }

    fn values(&self) -> Vec<&str> {
        vec![
            self.subscription_id.as_str(),
            self.resource_group.as_str(),
            self.batch_account_name.as_str(),
            self.name.as_str(),
        ]
    }
}

impl fmt::Display for BatchPoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for BatchPoolId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_resize_timeout() -> String {
    "PT15M".to_string()
}

fn default_dedicated_nodes() -> u32 {
    1
}

fn default_task_slots() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixedScale {
    #[serde(default = "default_dedicated_nodes")]
    pub target_dedicated_nodes: u32,
    #[serde(default)]
    pub target_low_priority_nodes: u32,
    #[serde(default = "default_resize_timeout")]
    pub resize_timeout: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoScale {
    pub formula: String,
    #[serde(default = "default_resize_timeout")]
    pub evaluation_interval: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchPoolArgs {
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    pub vm_size: String,
    pub node_agent_sku_id: String,
    pub storage_image_reference: ImageReference,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub fixed_scale: Option<FixedScale>,
    #[serde(default)]
    pub auto_scale: Option<AutoScale>,
    #[serde(default = "default_task_slots")]
    pub max_tasks_per_node: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPoolState {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub account_name: String,
    pub display_name: Option<String>,
    pub vm_size: Option<String>,
    pub node_agent_sku_id: Option<String>,
    pub storage_image_reference: Option<ImageReference>,
    pub fixed_scale: Option<FixedScale>,
    pub auto_scale: Option<AutoScale>,
    pub max_tasks_per_node: u32,
    pub allocation_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Model {
    #[serde(default)]
    properties: Option<ModelProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelProperties {
    display_name: Option<String>,
    vm_size: Option<String>,
    task_slots_per_node: Option<u32>,
    allocation_state: Option<String>,
    deployment_configuration: Option<DeploymentConfiguration>,
    scale_settings: Option<ScaleSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentConfiguration {
    virtual_machine_configuration: Option<VirtualMachineConfiguration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualMachineConfiguration {
    image_reference: Option<ImageReference>,
    node_agent_sku_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScaleSettings {
    fixed_scale: Option<FixedScaleModel>,
    auto_scale: Option<AutoScaleModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixedScaleModel {
    #[serde(default)]
    target_dedicated_nodes: u32,
    #[serde(default)]
    target_low_priority_nodes: u32,
    resize_timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoScaleModel {
    formula: String,
    evaluation_interval: Option<String>,
}

pub struct BatchPool;

impl Resource for BatchPool {
    const TYPE_NAME: &'static str = "azurerm_batch_pool";
    const API_VERSION: &'static str = "2023-05-01";

    type Id = BatchPoolId;
    type Args = BatchPoolArgs;
    type State = BatchPoolState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        BatchPoolId::new(
            subscription_id,
            &args.resource_group_name,
            &args.account_name,
            &args.name,
        )
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::batch_pool_name(diags, "name", &args.name);
        validate::resource_group_name(diags, "resource_group_name", &args.resource_group_name);
        validate::batch_account_name(diags, "account_name", &args.account_name);
        validate::not_empty(diags, "vm_size", &args.vm_size);
        validate::not_empty(diags, "node_agent_sku_id", &args.node_agent_sku_id);

        let image = &args.storage_image_reference;
        validate::not_empty(diags, "storage_image_reference.publisher", &image.publisher);
        validate::not_empty(diags, "storage_image_reference.offer", &image.offer);
        validate::not_empty(diags, "storage_image_reference.sku", &image.sku);

        if args.max_tasks_per_node == 0 {
            diags.push("max_tasks_per_node", "must be at least 1");
        }

        match (&args.fixed_scale, &args.auto_scale) {
            (Some(fixed), None) => {
                validate::duration(diags, "fixed_scale.resize_timeout", &fixed.resize_timeout);
            }
            (None, Some(auto)) => {
                validate::not_empty(diags, "auto_scale.formula", &auto.formula);
                validate::duration(
                    diags,
                    "auto_scale.evaluation_interval",
                    &auto.evaluation_interval,
                );
            }
            _ => diags.push(
                "fixed_scale",
                "exactly one of fixed_scale or auto_scale must be specified",
            ),
        }
    }

    fn expand(args: &Self::Args) -> Value {
        let scale_settings = match (&args.fixed_scale, &args.auto_scale) {
            (_, Some(auto)) => json!({
                "autoScale": {
                    "formula": auto.formula,
                    "evaluationInterval": auto.evaluation_interval,
                }
            }),
            (Some(fixed), None) => json!({
                "fixedScale": {
                    "targetDedicatedNodes": fixed.target_dedicated_nodes,
                    "targetLowPriorityNodes": fixed.target_low_priority_nodes,
                    "resizeTimeout": fixed.resize_timeout,
                }
            }),
            (None, None) => Value::Null,
        };

        let mut properties = Map::new();
        if let Some(display_name) = &args.display_name {
            properties.insert("displayName".to_string(), json!(display_name));
        }
        properties.insert("vmSize".to_string(), json!(args.vm_size));
        properties.insert("taskSlotsPerNode".to_string(), json!(args.max_tasks_per_node));
        properties.insert(
            "deploymentConfiguration".to_string(),
            json!({
                "virtualMachineConfiguration": {
                    "imageReference": args.storage_image_reference,
                    "nodeAgentSkuId": args.node_agent_sku_id,
                }
            }),
        );
        if !scale_settings.is_null() {
            properties.insert("scaleSettings".to_string(), scale_settings);
        }

        json!({ "properties": properties })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected batch pool body")?;
        let properties = model.properties.unwrap_or_default();
        let vm_config = properties
            .deployment_configuration
            .and_then(|d| d.virtual_machine_configuration);
        let scale = properties.scale_settings.unwrap_or_default();

        let (storage_image_reference, node_agent_sku_id) = match vm_config {
            Some(config) => (config.image_reference, config.node_agent_sku_id),
            None => (None, None),
        };

        Ok(BatchPoolState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            account_name: id.batch_account_name.clone(),
            display_name: properties.display_name,
            vm_size: properties.vm_size,
            node_agent_sku_id,
            storage_image_reference,
            fixed_scale: scale.fixed_scale.map(|f| FixedScale {
                target_dedicated_nodes: f.target_dedicated_nodes,
                target_low_priority_nodes: f.target_low_priority_nodes,
                resize_timeout: f.resize_timeout.unwrap_or_else(default_resize_timeout),
            }),
            auto_scale: scale.auto_scale.map(|a| AutoScale {
                formula: a.formula,
                evaluation_interval: a.evaluation_interval.unwrap_or_else(default_resize_timeout),
            }),
            max_tasks_per_node: properties.task_slots_per_node.unwrap_or(1),
            allocation_state: properties.allocation_state,
        })
    }
}
