//! Declarative manifests
//!
//! A manifest lists the resources to create or update:
//!
//! ```yaml
//! resources:
//!   - type: azurerm_resource_group
//!     args: { name: rg1, location: westeurope }
//! ```

use crate::resource::registry::Registry;
use crate::resource::schema::{Diagnostic, Planned, ResourceHandler};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub args: Value,
}

/// An entry that passed validation
pub struct PlannedEntry<'r> {
    pub handler: &'r dyn ResourceHandler,
    pub planned: Planned,
}

/// Problems found in one manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryProblem {
    /// Zero-based position in `resources`
    pub index: usize,
    pub resource_type: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for EntryProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resources[{}] ({}): ", self.index, self.resource_type)?;
        let messages: Vec<String> = self.diagnostics.iter().map(|d| d.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

/// A manifest with at least one invalid entry
#[derive(Debug, Clone, Error)]
#[error("invalid manifest: {}", describe(.problems))]
pub struct ManifestError {
    pub problems: Vec<EntryProblem>,
}

fn describe(problems: &[EntryProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

impl Manifest {
    /// Load a manifest from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content).context("Invalid manifest YAML")?;
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Validate every entry, collecting all problems
    pub fn validate(&self, registry: &Registry, subscription_id: &str) -> Vec<EntryProblem> {
        match self.plan(registry, subscription_id) {
            Ok(_) => Vec::new(),
            Err(e) => e.problems,
        }
    }

    /// Validate every entry and plan its request.
    /// Two entries addressing the same id are rejected.
    pub fn plan<'r>(
        &self,
        registry: &'r Registry,
        subscription_id: &str,
    ) -> Result<Vec<PlannedEntry<'r>>, ManifestError> {
        let mut planned = Vec::with_capacity(self.resources.len());
        let mut problems = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, entry) in self.resources.iter().enumerate() {
            let problem = |diagnostics| EntryProblem {
                index,
                resource_type: entry.resource_type.clone(),
                diagnostics,
            };

            let Some(handler) = registry.get(&entry.resource_type) else {
                problems.push(problem(vec![Diagnostic {
                    field: "type".to_string(),
                    message: format!("unknown resource type {}", entry.resource_type),
                }]));
                continue;
            };

            match handler.plan(&entry.args, subscription_id) {
                Ok(plan) => {
                    if let Some(first) = seen.insert(plan.id.clone(), index) {
                        problems.push(problem(vec![Diagnostic {
                            field: "args".to_string(),
                            message: format!("same id as resources[{}]: {}", first, plan.id),
                        }]));
                        continue;
                    }
                    planned.push(PlannedEntry {
                        handler,
                        planned: plan,
                    });
                }
                Err(e) => problems.push(problem(e.diagnostics)),
            }
        }

        if problems.is_empty() {
            tracing::debug!("manifest planned {} resources", planned.len());
            Ok(planned)
        } else {
            Err(ManifestError { problems })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    const MANIFEST: &str = r#"
resources:
  - type: azurerm_resource_group
    args: { name: rg1, location: westeurope }
  - type: azurerm_virtual_network
    args:
      name: vnet1
      resource_group_name: rg1
      location: westeurope
      address_space: ["10.0.0.0/16"]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.resources[0].resource_type, "azurerm_resource_group");
        assert_eq!(manifest.resources[0].args["name"], "rg1");
    }

    #[test]
    fn test_plan_manifest() {
        let registry = Registry::builtin().unwrap();
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();
        let planned = manifest.plan(&registry, SUB).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(
            planned[0].planned.id,
            format!("/subscriptions/{}/resourceGroups/rg1", SUB)
        );
        assert_eq!(planned[1].handler.type_name(), "azurerm_virtual_network");
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let registry = Registry::builtin().unwrap();
        let manifest = Manifest::from_yaml(
            r#"
resources:
  - type: azurerm_nope
  - type: azurerm_resource_group
    args: { name: "bad name!", location: "" }
  - type: azurerm_resource_group
    args: { name: rg1, location: westeurope }
"#,
        )
        .unwrap();

        let problems = manifest.validate(&registry, SUB);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].index, 0);
        assert_eq!(problems[0].diagnostics[0].field, "type");
        assert_eq!(problems[1].index, 1);
        assert!(problems[1].diagnostics.len() >= 2, "every bad field is reported");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let registry = Registry::builtin().unwrap();
        let manifest = Manifest::from_yaml(
            r#"
resources:
  - type: azurerm_resource_group
    args: { name: rg1, location: westeurope }
  - type: azurerm_resource_group
    args: { name: rg1, location: northeurope }
"#,
        )
        .unwrap();

        let err = manifest.plan(&registry, SUB).err().unwrap();
        assert_eq!(err.problems.len(), 1);
        assert!(err.to_string().contains("same id as resources[0]"));
    }

    #[test]
    fn test_invalid_subscription_reported_per_entry() {
        let registry = Registry::builtin().unwrap();
        let manifest = Manifest::from_yaml(MANIFEST).unwrap();

        let problems = manifest.validate(&registry, "sub1/resourceGroups/other");
        assert_eq!(problems.len(), 2);
        for problem in &problems {
            assert_eq!(problem.diagnostics[0].field, "subscription_id");
        }
    }

    #[test]
    fn test_unknown_manifest_key_rejected() {
        assert!(Manifest::from_yaml("resource: []").is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::from_yaml("resources: []").unwrap();
        assert!(manifest.is_empty());
    }
}
