//! Subnets

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
pub struct SubnetId {
    pub subscription_id: String,
    pub resource_group: String,
    pub virtual_network_name: String,
    pub name: String,
}

impl SubnetId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        virtual_network_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            virtual_network_name: virtual_network_name.into(),
            name: name.into(),
        }
    }
}

impl ResourceId for SubnetId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Network"),
        Segment::keyed("virtualNetworks", "virtualNetworkName"),
        Segment::keyed("subnets", "subnetName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            resource_group: parsed.take("resourceGroupName")?,
            virtual_network_name: parsed.take("virtualNetworkName")?,
            name: parsed.take("subnetName")?,
        })
    }

    fn values(&self) -> Vec<&str> {
        vec![
            self.subscription_id.as_str(),
            self.resource_group.as_str(),
            self.virtual_network_name.as_str(),
            self.name.as_str(),
        ]
    }
}

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for SubnetId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubnetArgs {
    pub name: String,
    pub resource_group_name: String,
    pub virtual_network_name: String,
    pub address_prefixes: Vec<String>,
    #[serde(default)]
    pub service_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubnetState {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub virtual_network_name: String,
    pub address_prefixes: Vec<String>,
    pub service_endpoints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Model {
    #[serde(default)]
    properties: Option<ModelProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelProperties {
    address_prefix: Option<String>,
    address_prefixes: Option<Vec<String>>,
    #[serde(default)]
    service_endpoints: Vec<ServiceEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ServiceEndpoint {
    service: String,
}

pub struct Subnet;

impl Resource for Subnet {
    const TYPE_NAME: &'static str = "azurerm_subnet";
    const API_VERSION: &'static str = "2023-09-01";

    type Id = SubnetId;
    type Args = SubnetArgs;
    type State = SubnetState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        SubnetId::new(
            subscription_id,
            &args.resource_group_name,
            &args.virtual_network_name,
            &args.name,
        )
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::network_name(diags, "name", &args.name);
        validate::resource_group_name(diags, "resource_group_name", &args.resource_group_name);
        validate::network_name(diags, "virtual_network_name", &args.virtual_network_name);

        if args.address_prefixes.is_empty() {
            diags.push("address_prefixes", "at least one address prefix is required");
        }
        for prefix in &args.address_prefixes {
            validate::cidr(diags, "address_prefixes", prefix);
        }
        for service in &args.service_endpoints {
            if !service.starts_with("Microsoft.") || service.len() <= "Microsoft.".len() {
                diags.push(
                    "service_endpoints",
                    format!("{:?} is not a service name like Microsoft.Storage", service),
                );
            }
        }
    }

    fn expand(args: &Self::Args) -> Value {
        let endpoints: Vec<Value> = args
            .service_endpoints
            .iter()
            .map(|service| json!({ "service": service }))
            .collect();

        json!({
            "properties": {
                "addressPrefixes": args.address_prefixes,
                "serviceEndpoints": endpoints,
            },
        })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected subnet body")?;
        let properties = model.properties.unwrap_or_default();

        // single-prefix subnets report `addressPrefix` instead of the list
        let address_prefixes = match (properties.address_prefixes, properties.address_prefix) {
            (Some(prefixes), _) if !prefixes.is_empty() => prefixes,
            (_, Some(prefix)) => vec![prefix],
            _ => Vec::new(),
        };

        Ok(SubnetState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            virtual_network_name: id.virtual_network_name.clone(),
            address_prefixes,
            service_endpoints: properties
                .service_endpoints
                .into_iter()
                .map(|e| e.service)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let raw = "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/default";
        let id = SubnetId::parse(raw).unwrap();
        assert_eq!(id.virtual_network_name, "vnet1");
        assert_eq!(id.name, "default");
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn test_flatten_single_prefix() {
        let id = SubnetId::new("sub1", "rg1", "vnet1", "default");
        let state = Subnet::flatten(
            &id,
            json!({
                "properties": {
                    "addressPrefix": "10.0.1.0/24",
                    "serviceEndpoints": [{"service": "Microsoft.Storage", "locations": ["*"]}],
                },
            }),
        )
        .unwrap();
        assert_eq!(state.address_prefixes, vec!["10.0.1.0/24"]);
        assert_eq!(state.service_endpoints, vec!["Microsoft.Storage"]);
    }

    #[test]
    fn test_validate_service_endpoints() {
        let args: SubnetArgs = serde_json::from_value(json!({
            "name": "default",
            "resource_group_name": "rg1",
            "virtual_network_name": "vnet1",
            "address_prefixes": ["10.0.1.0/24"],
            "service_endpoints": ["Microsoft.Storage", "Storage"],
        }))
        .unwrap();
        let mut diags = Diagnostics::new();
        Subnet::validate(&args, &mut diags);
        assert_eq!(diags.len(), 1);
    }
}
