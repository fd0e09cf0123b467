//! Provider-ready resource specifications

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reference to another resource in the same account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: String,
    pub identifier: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Address in the rendered configuration (`type.identifier`)
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.identifier)
    }

    /// Interpolation expression resolving to the referenced resource's id
    pub fn id_expression(&self) -> String {
        format!("${{{}.id}}", self.address())
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.identifier)
    }
}

/// Description of one infrastructure object plus its dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Provider resource type (e.g., "cloudflare_zone")
    pub resource_type: String,

    /// Account whose client owns this spec
    pub account: String,

    /// Unique within (account, resource_type)
    pub identifier: String,

    pub attributes: BTreeMap<String, serde_json::Value>,

    pub dependencies: BTreeSet<ResourceRef>,
}

impl ResourceSpec {
    pub fn new(
        resource_type: impl Into<String>,
        account: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            account: account.into(),
            identifier: identifier.into(),
            attributes: BTreeMap::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, dependency: ResourceRef) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(&self.resource_type, &self.identifier)
    }

    pub fn address(&self) -> String {
        self.reference().address()
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
