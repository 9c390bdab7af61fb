//! Virtual networks

use super::Tags;
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
pub struct VirtualNetworkId {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl VirtualNetworkId {
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

impl ResourceId for VirtualNetworkId {
    const FORMAT: IdFormat = IdFormat::new(&[
        Segment::keyed(SUBSCRIPTIONS, "subscriptionId"),
        Segment::keyed(RESOURCE_GROUPS, "resourceGroupName"),
        Segment::provider("Microsoft.Network"),
        Segment::keyed("virtualNetworks", "virtualNetworkName"),
    ]);

    fn from_parsed(mut parsed: ParsedId) -> Result<Self, IdError> {
        Ok(Self {
            subscription_id: parsed.take("subscriptionId")?,
            resource_group: parsed.take("resourceGroupName")?,
            name: parsed.take("virtualNetworkName")?,
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

impl fmt::Display for VirtualNetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for VirtualNetworkId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualNetworkArgs {
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub address_space: Vec<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualNetworkState {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub address_space: Vec<String>,
    pub dns_servers: Vec<String>,
    pub guid: Option<String>,
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
    address_space: Option<AddressSpace>,
    dhcp_options: Option<DhcpOptions>,
    resource_guid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressSpace {
    #[serde(default)]
    address_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DhcpOptions {
    #[serde(default)]
    dns_servers: Vec<String>,
}

pub struct VirtualNetwork;

impl Resource for VirtualNetwork {
    const TYPE_NAME: &'static str = "azurerm_virtual_network";
    const API_VERSION: &'static str = "2023-09-01";

    type Id = VirtualNetworkId;
    type Args = VirtualNetworkArgs;
    type State = VirtualNetworkState;

    fn id(args: &Self::Args, subscription_id: &str) -> Self::Id {
        VirtualNetworkId::new(subscription_id, &args.resource_group_name, &args.name)
    }

    fn validate(args: &Self::Args, diags: &mut Diagnostics) {
        validate::network_name(diags, "name", &args.name);
        validate::resource_group_name(diags, "resource_group_name", &args.resource_group_name);
        validate::location(diags, "location", &args.location);
        validate::tags(diags, "tags", &args.tags);

        if args.address_space.is_empty() {
            diags.push("address_space", "at least one address prefix is required");
        }
        for prefix in &args.address_space {
            validate::cidr(diags, "address_space", prefix);
        }
        for server in &args.dns_servers {
            validate::ip_address(diags, "dns_servers", server);
        }
    }

    fn expand(args: &Self::Args) -> Value {
        json!({
            "location": validate::normalize_location(&args.location),
            "tags": args.tags,
            "properties": {
                "addressSpace": { "addressPrefixes": args.address_space },
                "dhcpOptions": { "dnsServers": args.dns_servers },
            },
        })
    }

    fn flatten(id: &Self::Id, body: Value) -> Result<Self::State> {
        let model: Model = serde_json::from_value(body).context("Unexpected virtual network body")?;
        let properties = model.properties.unwrap_or_default();

        Ok(VirtualNetworkState {
            id: id.to_string(),
            name: id.name.clone(),
            resource_group_name: id.resource_group.clone(),
            location: validate::normalize_location(&model.location),
            address_space: properties
                .address_space
                .map(|a| a.address_prefixes)
                .unwrap_or_default(),
            dns_servers: properties
                .dhcp_options
                .map(|d| d.dns_servers)
                .unwrap_or_default(),
            guid: properties.resource_guid,
            tags: model.tags.unwrap_or_default(),
        })
    }
}
