//! Terraform JSON configuration renderer
//!
//! Resources are written as an array of single-resource blocks so the file
//! lists them in dependency order. Dependencies become `depends_on`.

use reconflow_core::{AccountClient, ConfigRenderer, ResourceSpec, Result};
use serde_json::{Map, Value, json};

pub const CONFIG_FILE: &str = "config.tf.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct TerraformRenderer;

impl TerraformRenderer {
    pub fn new() -> Self {
        Self
    }

    fn resource_block(spec: &ResourceSpec) -> Value {
        let mut body: Map<String, Value> = spec
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if !spec.dependencies.is_empty() {
            let deps: Vec<Value> = spec
                .dependencies
                .iter()
                .map(|d| Value::String(d.address()))
                .collect();
            body.insert("depends_on".to_string(), Value::Array(deps));
        }

        json!({ spec.resource_type.as_str(): { spec.identifier.as_str(): body } })
    }

    /// Full configuration document for `client`
    pub fn document(&self, client: &AccountClient, ordered: &[&ResourceSpec]) -> Value {
        let backend = client.backend();
        let provider = client.provider();

        let mut doc = json!({
            "terraform": {
                "backend": { backend.kind.as_str(): backend.settings },
                "required_providers": {
                    provider.name.as_str(): {
                        "source": provider.source,
                        "version": provider.version,
                    }
                }
            },
            "provider": { provider.name.as_str(): provider.settings },
        });

        if !ordered.is_empty() {
            let resources: Vec<Value> = ordered.iter().map(|s| Self::resource_block(s)).collect();
            doc["resource"] = Value::Array(resources);
        }

        doc
    }
}

impl ConfigRenderer for TerraformRenderer {
    fn file_name(&self) -> &str {
        CONFIG_FILE
    }

    fn render(&self, client: &AccountClient, ordered: &[&ResourceSpec]) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document(client, ordered))?)
    }
}
