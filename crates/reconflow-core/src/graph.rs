//! Per-account resource graph with dependency ordering

use crate::error::{ReconcileError, Result};
use crate::spec::{ResourceRef, ResourceSpec};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// All resource specs registered for one account
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    account: String,
    specs: BTreeMap<ResourceRef, ResourceSpec>,
}

impl ResourceGraph {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            specs: BTreeMap::new(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, reference: &ResourceRef) -> Option<&ResourceSpec> {
        self.specs.get(reference)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.specs.values()
    }

    /// Register a spec, rejecting a second definition of the same resource
    pub fn insert(&mut self, spec: ResourceSpec) -> Result<()> {
        if spec.account != self.account {
            return Err(ReconcileError::UnknownAccount(spec.account));
        }

        let key = spec.reference();
        if self.specs.contains_key(&key) {
            return Err(ReconcileError::DuplicateResource {
                account: self.account.clone(),
                resource_type: key.resource_type,
                identifier: key.identifier,
            });
        }

        self.specs.insert(key, spec);
        Ok(())
    }

    /// Specs in an order where every dependency precedes its dependents
    ///
    /// Kahn's algorithm, one layer at a time:
    /// 1. Collect every unplaced spec whose dependencies are all placed
    /// 2. Mark the layer as placed
    /// 3. Repeat until everything is placed, or no progress means a cycle
    pub fn topological_order(&self) -> Result<Vec<&ResourceSpec>> {
        for spec in self.specs.values() {
            if let Some(missing) = spec
                .dependencies
                .iter()
                .find(|dep| !self.specs.contains_key(*dep))
            {
                return Err(ReconcileError::DanglingDependency {
                    account: self.account.clone(),
                    resource: spec.address(),
                    dependency: missing.address(),
                });
            }
        }

        let mut placed: BTreeSet<&ResourceRef> = BTreeSet::new();
        let mut ordered: Vec<&ResourceSpec> = Vec::with_capacity(self.specs.len());

        while placed.len() < self.specs.len() {
            let layer: Vec<(&ResourceRef, &ResourceSpec)> = self
                .specs
                .iter()
                .filter(|(key, _)| !placed.contains(key))
                .filter(|(_, spec)| spec.dependencies.iter().all(|d| placed.contains(d)))
                .collect();

            if layer.is_empty() {
                let stuck: Vec<String> = self
                    .specs
                    .keys()
                    .filter(|key| !placed.contains(key))
                    .map(|key| key.address())
                    .collect();
                return Err(ReconcileError::CyclicDependency {
                    account: self.account.clone(),
                    stuck,
                });
            }

            debug!(
                account = %self.account,
                layer = layer.len(),
                "Resolved dependency layer"
            );

            for (key, spec) in layer {
                placed.insert(key);
                ordered.push(spec);
            }
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(resource_type: &str, id: &str) -> ResourceSpec {
        ResourceSpec::new(resource_type, "acme", id)
    }

    fn position(order: &[&ResourceSpec], address: &str) -> usize {
        order.iter().position(|s| s.address() == address).unwrap()
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut graph = ResourceGraph::new("acme");
        graph.insert(spec("cloudflare_zone", "example-com")).unwrap();

        let err = graph.insert(spec("cloudflare_zone", "example-com")).unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateResource { .. }));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_same_identifier_different_type_allowed() {
        let mut graph = ResourceGraph::new("acme");
        graph.insert(spec("cloudflare_zone", "example-com")).unwrap();
        graph
            .insert(spec("cloudflare_zone_settings_override", "example-com"))
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_foreign_account_rejected() {
        let mut graph = ResourceGraph::new("acme");
        let err = graph
            .insert(ResourceSpec::new("cloudflare_zone", "other", "x"))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownAccount(ref a) if a == "other"));
    }

    #[test]
    fn test_dependencies_come_first() {
        let zone = spec("cloudflare_zone", "example-com");
        let record = spec("cloudflare_record", "a-www").depends_on(zone.reference());
        let script = spec("cloudflare_worker_script", "hello");
        let route = spec("cloudflare_worker_route", "hello")
            .depends_on(zone.reference())
            .depends_on(script.reference());

        let mut graph = ResourceGraph::new("acme");
        for s in [route, record, script, zone] {
            graph.insert(s).unwrap();
        }

        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 4);

        let zone_pos = position(&order, "cloudflare_zone.example-com");
        assert!(zone_pos < position(&order, "cloudflare_record.a-www"));
        assert!(zone_pos < position(&order, "cloudflare_worker_route.hello"));
        assert!(
            position(&order, "cloudflare_worker_script.hello")
                < position(&order, "cloudflare_worker_route.hello")
        );
    }

    #[test]
    fn test_cycle_detected() {
        let a = spec("t", "a").depends_on(ResourceRef::new("t", "b"));
        let b = spec("t", "b").depends_on(ResourceRef::new("t", "a"));
        let c = spec("t", "c");

        let mut graph = ResourceGraph::new("acme");
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();
        graph.insert(c).unwrap();

        match graph.topological_order() {
            Err(ReconcileError::CyclicDependency { stuck, .. }) => {
                assert_eq!(stuck, vec!["t.a".to_string(), "t.b".to_string()]);
            }
            other => panic!("expected cycle, got {:?}", other.map(|o| o.len())),
        }
    }

    #[test]
    fn test_dangling_dependency() {
        let record = spec("cloudflare_record", "www")
            .depends_on(ResourceRef::new("cloudflare_zone", "missing"));

        let mut graph = ResourceGraph::new("acme");
        graph.insert(record).unwrap();

        let err = graph.topological_order().unwrap_err();
        assert!(matches!(err, ReconcileError::DanglingDependency { .. }));
    }
}
