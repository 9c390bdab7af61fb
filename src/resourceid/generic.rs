//! Generic resource identifier
//!
//! Decodes any subscription, resource group or provider-scoped id without
//! knowing its resource type up front. Used to route `import` to the right
//! handler and to inspect ids from the command line.

use super::format::{check_remaining, expect_keyword, PROVIDERS, RESOURCE_GROUPS, SUBSCRIPTIONS};
use super::IdError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A `{type}/{name}` pair below the provider namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSegment {
    pub resource_type: String,
    pub name: String,
}

/// Structured form of an arbitrary ARM id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentifier {
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceSegment>,
}

impl ResourceIdentifier {
    /// Decode an id
    pub fn parse(input: &str) -> Result<Self, IdError> {
        if input.is_empty() {
            return Err(IdError::malformed(input, "id is empty"));
        }

        let path = input.strip_prefix('/').unwrap_or(input);
        let components: Vec<&str> = path.split('/').collect();
        let mut iter = components.iter().copied().peekable();

        expect_keyword(input, &mut iter, SUBSCRIPTIONS)?;
        let subscription_id = required_value(input, iter.next(), SUBSCRIPTIONS)?;

        let mut resource_group = None;
        if iter.peek().is_some_and(|c| *c == RESOURCE_GROUPS) {
            iter.next();
            resource_group = Some(required_value(input, iter.next(), RESOURCE_GROUPS)?);
        } else if let Some(found) = iter.peek() {
            if found.eq_ignore_ascii_case(RESOURCE_GROUPS) {
                return Err(IdError::malformed(
                    input,
                    format!("segment `{}` must be spelled `{}`", found, RESOURCE_GROUPS),
                ));
            }
        }

        let mut namespace = None;
        let mut resources = Vec::new();
        if iter.peek().is_some_and(|c| c.eq_ignore_ascii_case(PROVIDERS)) {
            expect_keyword(input, &mut iter, PROVIDERS)?;
            namespace = Some(required_value(input, iter.next(), PROVIDERS)?);

            while let Some(resource_type) = iter.next() {
                if resource_type.is_empty() {
                    return Err(IdError::malformed(input, "empty path segment"));
                }
                let name = match iter.next() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => {
                        return Err(IdError::malformed(
                            input,
                            format!("resource type `{}` has no name", resource_type),
                        ))
                    }
                };
                resources.push(ResourceSegment {
                    resource_type: resource_type.to_string(),
                    name,
                });
            }

            if resources.is_empty() {
                return Err(IdError::malformed(
                    input,
                    "provider namespace is not followed by a resource type",
                ));
            }
        }

        let remaining: Vec<&str> = iter.collect();
        check_remaining(input, &remaining)?;

        Ok(Self {
            subscription_id,
            resource_group,
            namespace,
            resources,
        })
    }

    /// ARM resource type, e.g. `Microsoft.Batch/batchAccounts/pools`
    pub fn resource_type(&self) -> String {
        match &self.namespace {
            Some(namespace) => {
                let types: Vec<&str> = self
                    .resources
                    .iter()
                    .map(|r| r.resource_type.as_str())
                    .collect();
                format!("{}/{}", namespace, types.join("/"))
            }
            None if self.resource_group.is_some() => "Microsoft.Resources/resourceGroups".to_string(),
            None => "Microsoft.Resources/subscriptions".to_string(),
        }
    }

    /// Terminal name of the addressed resource
    pub fn name(&self) -> &str {
        if let Some(last) = self.resources.last() {
            return &last.name;
        }
        self.resource_group
            .as_deref()
            .unwrap_or(&self.subscription_id)
    }

    /// The id of the parent resource, if this is a child resource
    pub fn parent(&self) -> Option<ResourceIdentifier> {
        if self.resources.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.resources.pop();
        Some(parent)
    }

    /// Ordered (segment-name, value) pairs
    pub fn segments(&self) -> Vec<(&str, &str)> {
        let mut segments = vec![(SUBSCRIPTIONS, self.subscription_id.as_str())];
        if let Some(group) = &self.resource_group {
            segments.push((RESOURCE_GROUPS, group.as_str()));
        }
        if let Some(namespace) = &self.namespace {
            segments.push((PROVIDERS, namespace.as_str()));
        }
        for resource in &self.resources {
            segments.push((resource.resource_type.as_str(), resource.name.as_str()));
        }
        segments
    }
}

fn required_value(input: &str, value: Option<&str>, keyword: &str) -> Result<String, IdError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(IdError::malformed(
            input,
            format!("segment `{}` has no value", keyword),
        )),
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.segments() {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceIdentifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL_ID: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Batch/batchAccounts/account1/pools/pool1";

    #[test]
    fn test_parse_child_resource() {
        let id = ResourceIdentifier::parse(POOL_ID).unwrap();
        assert_eq!(id.subscription_id, "12345678-1234-9876-4563-123456789012");
        assert_eq!(id.resource_group.as_deref(), Some("resGroup1"));
        assert_eq!(id.namespace.as_deref(), Some("Microsoft.Batch"));
        assert_eq!(id.resource_type(), "Microsoft.Batch/batchAccounts/pools");
        assert_eq!(id.name(), "pool1");
        assert_eq!(id.to_string(), POOL_ID);
    }

    #[test]
    fn test_parent() {
        let id = ResourceIdentifier::parse(POOL_ID).unwrap();
        let parent = id.parent().unwrap();
        assert_eq!(parent.resource_type(), "Microsoft.Batch/batchAccounts");
        assert_eq!(parent.name(), "account1");
        assert!(parent.parent().is_none());
    }

    #[test]
    fn test_resource_group_and_subscription_ids() {
        let group = ResourceIdentifier::parse("/subscriptions/s1/resourceGroups/rg1").unwrap();
        assert_eq!(group.resource_type(), "Microsoft.Resources/resourceGroups");
        assert_eq!(group.name(), "rg1");

        let sub = ResourceIdentifier::parse("/subscriptions/s1").unwrap();
        assert_eq!(sub.resource_type(), "Microsoft.Resources/subscriptions");
        assert_eq!(sub.to_string(), "/subscriptions/s1");
    }

    #[test]
    fn test_subscription_scoped_provider() {
        let id = ResourceIdentifier::parse(
            "/subscriptions/s1/providers/Microsoft.Authorization/roleDefinitions/r1",
        )
        .unwrap();
        assert!(id.resource_group.is_none());
        assert_eq!(id.resource_type(), "Microsoft.Authorization/roleDefinitions");
    }

    #[test]
    fn test_segments_are_ordered() {
        let id = ResourceIdentifier::parse(POOL_ID).unwrap();
        let keys: Vec<&str> = id.segments().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec!["subscriptions", "resourceGroups", "providers", "batchAccounts", "pools"]
        );
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            ResourceIdentifier::parse(""),
            Err(IdError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_rejects_type_without_name() {
        let err = ResourceIdentifier::parse(
            "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Batch/batchAccounts",
        )
        .unwrap_err();
        assert!(err.to_string().contains("has no name"));
    }

    #[test]
    fn test_rejects_uppercase_keywords() {
        let upper = POOL_ID.replace("subscriptions", "SUBSCRIPTIONS");
        assert!(ResourceIdentifier::parse(&upper).is_err());

        let upper = POOL_ID.replace("resourceGroups", "RESOURCEGROUPS");
        assert!(matches!(
            ResourceIdentifier::parse(&upper),
            Err(IdError::MalformedIdentifier { .. })
        ));

        let upper = POOL_ID.replace("providers", "PROVIDERS");
        assert!(ResourceIdentifier::parse(&upper).is_err());
    }

    #[test]
    fn test_unknown_scope_is_unexpected() {
        let err = ResourceIdentifier::parse("/subscriptions/s1/resourceGroups/rg1/deployments/d1")
            .unwrap_err();
        assert!(matches!(err, IdError::UnexpectedSegments { .. }));
    }
}
