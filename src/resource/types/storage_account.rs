//! Storage accounts

use super::{default_true, Tags};
use crate::resource::schema::{Diagnostics, Resource};
use crate::resource::validate;
use crate::resourceid::{
    IdError, IdFormat, ParsedId, ResourceId, Segment, RESOURCE_GROUPS, SUBSCRIPTIONS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageAccountId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl StorageAccountId {
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

impl ResourceId for StorageAccountId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Storage"),
        Segment::keyed("storageAccounts", "storageAccountName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            resource_group: parsed.take("resourceGroupName")?,
            name: parsed.take("storageAccountName")?,
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

impl fmt::Display for StorageAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for StorageAccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountTier {
    Standard,
    Premium,
}

impl AccountTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountTier::Standard => "Standard",
            AccountTier::Premium => "Premium",
        }
    }

    fn from_sku(value: &str) -> Option<Self> {
        match value {
            "Standard" => Some(AccountTier::Standard),
            "Premium" => Some(AccountTier::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationType {
    Lrs,
    Grs,
    Ragrs,
    Zrs,
    Gzrs,
    Ragzrs,
}

impl ReplicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationType::Lrs => "LRS",
            ReplicationType::Grs => "GRS",
            ReplicationType::Ragrs => "RAGRS",
            ReplicationType::Zrs => "ZRS",
            ReplicationType::Gzrs => "GZRS",
            ReplicationType::Ragzrs => "RAGZRS",
        }
    }

    fn from_sku(value: &str) -> Option<Self> {
        [
            ReplicationType::Lrs,
            ReplicationType::Grs,
            ReplicationType::Ragrs,
            ReplicationType::Zrs,
            ReplicationType::Gzrs,
            ReplicationType::Ragzrs,
        ]
        .into_iter()
        .find(|r| r.as_str() == value)
    }

    /// Premium accounts only support locally and zone redundant storage
    fn premium_supported(&self) -> bool {
        matches!(self, ReplicationType::Lrs | ReplicationType::Zrs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Storage,
    #[default]
    StorageV2,
    BlobStorage,
    BlockBlobStorage,
    FileStorage,
}

impl AccountKind {
    fn premium_only(&self) -> bool {
        matches!(self, AccountKind::BlockBlobStorage | AccountKind::FileStorage)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLS1_0")]
    Tls1_0,
    #[serde(rename = "TLS1_1")]
    Tls1_1,
    #[default]
    #[serde(rename = "TLS1_2")]
    Tls1_2,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageAccountArgs {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub account_tier: AccountTier,
    pub account_replication_type: ReplicationType,
    #[serde(default)]
    pub account_kind: AccountKind,
    #[serde(default = "default_true")]
    pub https_traffic_only_enabled: bool,
    #[serde(default)]
    pub min_tls_version: TlsVersion,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageAccountState {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub account_tier: Option<AccountTier>,
    pub account_replication_type: Option<ReplicationType>,
    pub account_kind: Option<AccountKind>,
    pub https_traffic_only_enabled: bool,
    pub min_tls_version: Option<TlsVersion>,
    pub primary_blob_endpoint: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Deserialize)]
struct Model {
    location: String,
    #[serde(default)]
    tags: Option<Tags>,
    #[serde(default)]
    kind: Option<AccountKind>,
    #[serde(default)]
    sku: Option<Sku>,
    #[serde(default)]
    properties: Option<ModelProperties>,
}

#[derive(Debug, Deserialize)]
struct Sku {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelProperties {
    supports_https_traffic_only: Option<bool>,
    minimum_tls_version: Option<TlsVersion>,
    primary_endpoints: Option<Endpoints>,
}

#[derive(Debug, Deserialize)]
struct Endpoints {
    blob: Option<String>,
}

pub struct StorageAccount;

impl Resource for StorageAccount {
    const TYPE_NAME: &'static str = "azurerm_storage_account";
    const API_VERSION: &'static str = "2023-01-01";

    type Id = StorageAccountId;
    type Args = StorageAccountArgs;
    type State = StorageAccountState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        StorageAccountId::new(subscription_id, &args.resource_group_name, &args.name)
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::storage_account_name(diags, "name", &args.name);
        validate::resource_group_name(diags, "resource_group_name", &args.resource_group_name);
        validate::location(diags, "location", &args.location);
        validate::tags(diags, "tags", &args.tags);

        if args.account_tier == AccountTier::Premium
            && !args.account_replication_type.premium_supported()
        {
            diags.push(
                "account_replication_type",
                format!(
                    "{} is not supported for Premium accounts (use LRS or ZRS)",
                    args.account_replication_type.as_str()
                ),
            );
        }
        if args.account_kind.premium_only() && args.account_tier != AccountTier::Premium {
            diags.push(
                "account_kind",
                format!("{:?} requires account_tier Premium", args.account_kind),
            );
        }
    }

    fn expand(args: &Self::Args) -> Value {
        json!({
            "location": validate::normalize_location(&args.location),
            "tags": args.tags,
            "kind": args.account_kind,
            "sku": {
                "name": format!(
                    "{}_{}",
                    args.account_tier.as_str(),
                    args.account_replication_type.as_str()
                ),
            },
            "properties": {
                "supportsHttpsTrafficOnly": args.https_traffic_only_enabled,
                "minimumTlsVersion": args.min_tls_version,
            },
        })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected storage account body")?;
        let properties = model.properties.unwrap_or_default();

        let (account_tier, account_replication_type) = match model
            .sku
            .as_ref()
            .and_then(|sku| sku.name.split_once('_'))
        {
            Some((tier, replication)) => (
                AccountTier::from_sku(tier),
                ReplicationType::from_sku(replication),
            ),
            None => (None, None),
        };

        Ok(StorageAccountState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            location: validate::normalize_location(&model.location),
            account_tier,
            account_replication_type,
            account_kind: model.kind,
            https_traffic_only_enabled: properties.supports_https_traffic_only.unwrap_or(true),
            min_tls_version: properties.minimum_tls_version,
            primary_blob_endpoint: properties.primary_endpoints.and_then(|e| e.blob),
            tags: model.tags.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> StorageAccountArgs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_expand_builds_sku_name() {
        let args = args(json!({
            "name": "sa1",
            "resource_group_name": "rg1",
            "location": "westeurope",
            "account_tier": "Standard",
            "account_replication_type": "RAGRS",
        }));
        let body = StorageAccount::expand(&args);
        assert_eq!(body["sku"]["name"], "Standard_RAGRS");
        assert_eq!(body["kind"], "StorageV2");
        assert_eq!(body["properties"]["minimumTlsVersion"], "TLS1_2");
        assert_eq!(body["properties"]["supportsHttpsTrafficOnly"], true);
    }

    #[test]
    fn test_validate_premium_constraints() {
        let args = args(json!({
            "name": "sa1",
            "resource_group_name": "rg1",
            "location": "westeurope",
            "account_tier": "Standard",
            "account_replication_type": "GRS",
            "account_kind": "FileStorage",
        }));
        let mut diags = Diagnostics::new();
        StorageAccount::validate(&args, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().field, "account_kind");

        let premium = StorageAccountArgs {
            account_tier: AccountTier::Premium,
            ..args
        };
        let mut diags = Diagnostics::new();
        StorageAccount::validate(&premium, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().field, "account_replication_type");
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        let result: Result<StorageAccountArgs, _> = serde_json::from_value(json!({
            "name": "sa1",
            "resource_group_name": "rg1",
            "location": "westeurope",
            "account_tier": "Standard",
            "account_replication_type": "LRS",
            "enable_https_traffic_only": true,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_flatten_splits_sku() {
        let id = StorageAccountId::new("sub1", "rg1", "sa1");
        let state = StorageAccount::flatten(
            &id,
            json!({
                "location": "westeurope",
                "kind": "StorageV2",
                "sku": {"name": "Premium_ZRS", "tier": "Premium"},
                "properties": {
                    "supportsHttpsTrafficOnly": false,
                    "primaryEndpoints": {"blob": "https://sa1.blob.core.windows.net/"},
                },
            }),
        )
        .unwrap();
        assert_eq!(state.account_tier, Some(AccountTier::Premium));
        assert_eq!(state.account_replication_type, Some(ReplicationType::Zrs));
        assert!(!state.https_traffic_only_enabled);
        assert_eq!(
            state.primary_blob_endpoint.as_deref(),
            Some("https://sa1.blob.core.windows.net/")
        );
    }
}
