//! Batch accounts

use super::storage_account::StorageAccountId;
use super::{default_true, Tags};
use crate::resource::schema::{Diagnostics, Resource};
use crate::resource::validate;
use crate::resourceid::{
    IdError, IdFormat, ParsedId, ResourceId, ResourceIdentifier, Segment, RESOURCE_GROUPS,
    SUBSCRIPTIONS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

const KEY_VAULT_TYPE: &str = "Microsoft.KeyVault/vaults";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAccountId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl BatchAccountId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for BatchAccountId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Batch"),
        Segment::keyed("batchAccounts", "batchAccountName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            resource_group: parsed.take("resourceGroupName")?,
            name: parsed.take("batchAccountName")?,
        })
    }

    fn values(&self) -> Vec<&str> {
        vec![
            self.subscription_id.as_str(),
            self.resource_group.as_str(),
            self.name.as_str(),
        ]
    }
}

impl fmt::Display for BatchAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for BatchAccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Where pool nodes are allocated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolAllocationMode {
    #[default]
    BatchService,
    UserSubscription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyVaultReference {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchAccountArgs {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    #[serde(default)]
    pub pool_allocation_mode: PoolAllocationMode,
    #[serde(default)]
    pub storage_account_id: Option<String>,
    #[serde(default)]
    pub key_vault_reference: Option<KeyVaultReference>,
    #[serde(default = "default_true")]
    pub public_network_access_enabled: bool,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAccountState {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub pool_allocation_mode: PoolAllocationMode,
    pub storage_account_id: Option<String>,
    pub public_network_access_enabled: bool,
    pub account_endpoint: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Deserialize)]
struct Model {
    location: String,
    #[serde(default)]
    tags: Option<Tags>,
    #[serde(default)]
    properties: Option<ModelProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelProperties {
    pool_allocation_mode: Option<PoolAllocationMode>,
    auto_storage: Option<AutoStorage>,
    public_network_access: Option<String>,
    account_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoStorage {
    storage_account_id: String,
}

pub struct BatchAccount;

impl Resource for BatchAccount {
    const TYPE_NAME: &'static str = "azurerm_batch_account";
    const API_VERSION: &'static str = "2023-05-01";

    type Id = BatchAccountId;
    type Args = BatchAccountArgs;
    type State = BatchAccountState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        BatchAccountId::new(subscription_id, &args.resource_group_name, &args.name)
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::batch_account_name(diags, "name", &args.name);
        validate::resource_group_name(diags, "resource_group_name", &args.resource_group_name);
        validate::location(diags, "location", &args.location);
        validate::tags(diags, "tags", &args.tags);

        if let Some(storage) = &args.storage_account_id {
            validate::resource_id::<StorageAccountId>(diags, "storage_account_id", storage);
        }

        match (&args.pool_allocation_mode, &args.key_vault_reference) {
            (PoolAllocationMode::UserSubscription, None) => diags.push(
                "key_vault_reference",
                "required when pool_allocation_mode is UserSubscription",
            ),
            (_, Some(reference)) => {
                match ResourceIdentifier::parse(&reference.id) {
                    Ok(parsed) if parsed.resource_type() == KEY_VAULT_TYPE => {}
                    Ok(parsed) => diags.push(
                        "key_vault_reference.id",
                        format!(
                            "expected a {} id, got {}",
                            KEY_VAULT_TYPE,
                            parsed.resource_type()
                        ),
                    ),
                    Err(e) => diags.push("key_vault_reference.id", e.to_string()),
                }
                if url::Url::parse(&reference.url).is_err() {
                    diags.push("key_vault_reference.url", "must be an absolute URL");
                }
            }
            _ => {}
        }
    }

    fn expand(args: &Self::Args) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "poolAllocationMode".to_string(),
            json!(args.pool_allocation_mode),
        );
        let public_network_access = if args.public_network_access_enabled {
            "Enabled"
        } else {
            "Disabled"
        };
        properties.insert(
            "publicNetworkAccess".to_string(),
            json!(public_network_access),
        );
        if let Some(storage) = &args.storage_account_id {
            properties.insert(
                "autoStorage".to_string(),
                json!({ "storageAccountId": storage }),
            );
        }
        if let Some(reference) = &args.key_vault_reference {
            properties.insert(
                "keyVaultReference".to_string(),
                json!({ "id": reference.id, "url": reference.url }),
            );
        }

        json!({
            "location": validate::normalize_location(&args.location),
            "tags": args.tags,
            "properties": properties,
        })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected batch account body")?;
        let properties = model.properties.unwrap_or_default();

        Ok(BatchAccountState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            location: validate::normalize_location(&model.location),
            pool_allocation_mode: properties.pool_allocation_mode.unwrap_or_default(),
            storage_account_id: properties.auto_storage.map(|s| s.storage_account_id),
            public_network_access_enabled: properties
                .public_network_access
                .map(|v| v.eq_ignore_ascii_case("Enabled"))
                .unwrap_or(true),
            account_endpoint: properties.account_endpoint,
            tags: model.tags.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> BatchAccountArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_id_format() {
        let id = BatchAccountId::new("sub1", "rg1", "account1");
        assert_eq!(
            id.to_string(),
            "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Batch/batchAccounts/account1"
        );
        assert_eq!(BatchAccountId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let args = args(json!({
            "name": "Bad_Name",
            "resource_group_name": "rg1.",
            "location": "",
            "storage_account_id": "/subscriptions/sub1/resourceGroups/rg1",
            "pool_allocation_mode": "UserSubscription",
        }));
        let mut diags = Diagnostics::new();
        BatchAccount::validate(&args, &mut diags);

        let fields: Vec<&str> = diags.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "resource_group_name",
                "location",
                "storage_account_id",
                "key_vault_reference"
            ]
        );
    }

    #[test]
    fn test_validate_key_vault_reference_type() {
        let args = args(json!({
            "name": "account1",
            "resource_group_name": "rg1",
            "location": "westeurope",
            "pool_allocation_mode": "UserSubscription",
            "key_vault_reference": {
                "id": "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/sa1",
                "url": "https://kv1.vault.azure.net/",
            },
        }));
        let mut diags = Diagnostics::new();
        BatchAccount::validate(&args, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().next().unwrap().message.contains(KEY_VAULT_TYPE));
    }

    #[test]
    fn test_expand_and_flatten() {
        let args = args(json!({
            "name": "account1",
            "resource_group_name": "rg1",
            "location": "West Europe",
            "storage_account_id": "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/sa1",
        }));
        let body = BatchAccount::expand(&args);
        assert_eq!(body["properties"]["poolAllocationMode"], "BatchService");
        assert_eq!(body["properties"]["publicNetworkAccess"], "Enabled");
        assert_eq!(
            body["properties"]["autoStorage"]["storageAccountId"],
            "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/sa1"
        );

        let id = BatchAccount::id(&args, "sub1");
        let mut response = body.clone();
        response["properties"]["accountEndpoint"] = json!("account1.westeurope.batch.azure.com");
        let state = BatchAccount::flatten(&id, response).unwrap();
        assert_eq!(state.resource_group_name, "rg1");
        assert_eq!(state.location, "westeurope");
        assert_eq!(
            state.account_endpoint.as_deref(),
            Some("account1.westeurope.batch.azure.com")
        );
        assert!(state.public_network_access_enabled);
    }
}
