//! Cloudflare resource spec builder
//!
//! Maps declared zones, records and workers to provider resource specs:
//!
//! | declared | specs |
//! |---|---|
//! | zone | `cloudflare_zone` + `cloudflare_zone_settings_override` |
//! | record | `cloudflare_record` |
//! | worker | `cloudflare_worker_script` + `cloudflare_worker_route` |

use reconflow_core::{
    CloudflareRecord, CloudflareWorker, CloudflareZone, ContentStore, DesiredRecord,
    ReconcileError, ResourceRef, ResourceSpec, Result, ZoneRef, safe_resource_id,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const ZONE: &str = "cloudflare_zone";
pub const ZONE_SETTINGS: &str = "cloudflare_zone_settings_override";
pub const RECORD: &str = "cloudflare_record";
pub const WORKER_SCRIPT: &str = "cloudflare_worker_script";
pub const WORKER_ROUTE: &str = "cloudflare_worker_route";

/// A declared entity that produced no specs
#[derive(Debug)]
pub struct BuildFailure {
    pub account: String,
    pub name: String,
    pub error: ReconcileError,
}

/// Specs built for one cycle plus the entities that failed
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub specs: Vec<ResourceSpec>,
    pub failures: Vec<BuildFailure>,
}

impl BuildOutput {
    /// Accounts with at least one failed entity
    pub fn failed_accounts(&self) -> HashSet<&str> {
        self.failures.iter().map(|f| f.account.as_str()).collect()
    }
}

/// How worker script content is obtained
#[derive(Clone)]
enum ScriptContent {
    Fetch(Arc<dyn ContentStore>),
    /// No store configured; workers fail to build
    Unavailable,
    /// Content is left out (validation only)
    Skip,
}

/// Builds [`ResourceSpec`]s from declared Cloudflare entities
#[derive(Clone)]
pub struct SpecBuilder {
    content: ScriptContent,
    call_timeout: Option<Duration>,
}

impl SpecBuilder {
    pub fn new(content: Option<Arc<dyn ContentStore>>) -> Self {
        Self {
            content: match content {
                Some(store) => ScriptContent::Fetch(store),
                None => ScriptContent::Unavailable,
            },
            call_timeout: None,
        }
    }

    /// Bound every content fetch; an expired fetch fails the worker's account
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Builder that never fetches worker script content
    pub fn offline() -> Self {
        Self {
            content: ScriptContent::Skip,
            call_timeout: None,
        }
    }

    /// Build specs for every provider-managed record
    ///
    /// A failing entity contributes no specs at all.
    pub async fn build(&self, records: &[DesiredRecord]) -> BuildOutput {
        let zones: HashSet<(&str, &str)> = records
            .iter()
            .filter_map(|r| match r {
                DesiredRecord::Zone(z) => Some((z.account.as_str(), z.name.as_str())),
                _ => None,
            })
            .collect();

        let mut output = BuildOutput::default();
        for record in records {
            let built = match record {
                DesiredRecord::UserBinding(_) => continue,
                DesiredRecord::Zone(zone) => Ok(build_zone(zone)),
                DesiredRecord::Record(r) => {
                    require_zone(&zones, &r.zone, &r.name).map(|()| vec![build_record(r)])
                }
                DesiredRecord::Worker(w) => match require_zone(&zones, &w.zone, &w.name) {
                    Ok(()) => self.build_worker(w).await,
                    Err(e) => Err(e),
                },
            };

            match built {
                Ok(specs) => {
                    debug!(
                        account = %record.scope(),
                        "Built {} spec(s) for {} '{}'",
                        specs.len(),
                        record.kind(),
                        record.name()
                    );
                    output.specs.extend(specs);
                }
                Err(error) => output.failures.push(BuildFailure {
                    account: record.scope().to_string(),
                    name: record.name().to_string(),
                    error,
                }),
            }
        }
        output
    }

    async fn build_worker(&self, worker: &CloudflareWorker) -> Result<Vec<ResourceSpec>> {
        let source = &worker.script.content_from_github;
        let content = match &self.content {
            ScriptContent::Fetch(store) => {
                let bytes = self.fetch(store.as_ref(), worker).await?;
                Some(String::from_utf8(bytes).map_err(|e| content_error(worker, &e))?)
            }
            ScriptContent::Unavailable => {
                return Err(content_error(worker, &"no content store configured"));
            }
            ScriptContent::Skip => None,
        };

        let account = &worker.zone.account;
        let identifier = safe_resource_id(&worker.name);
        let zone = zone_spec_ref(&worker.zone);

        let mut script = ResourceSpec::new(WORKER_SCRIPT, account, &identifier)
            .with_attribute("name", worker.script.name.as_str());
        if let Some(content) = content {
            script = script.with_attribute("content", content);
        }

        let route = ResourceSpec::new(WORKER_ROUTE, account, &identifier)
            .with_attribute("zone_id", zone.id_expression())
            .with_attribute("pattern", worker.pattern.as_str())
            .with_attribute("script_name", worker.script.name.as_str())
            .depends_on(zone)
            .depends_on(script.reference());

        Ok(vec![route, script])
    }

    async fn fetch(&self, store: &dyn ContentStore, worker: &CloudflareWorker) -> Result<Vec<u8>> {
        let source = &worker.script.content_from_github;
        let fetched = match self.call_timeout {
            Some(after) => tokio::time::timeout(after, store.get_file(source))
                .await
                .map_err(|_| ReconcileError::Timeout {
                    unit: worker.zone.account.clone(),
                    after,
                })?,
            None => store.get_file(source).await,
        };
        fetched.map_err(|e| content_error(worker, &e))
    }
}

fn content_error(worker: &CloudflareWorker, reason: &dyn std::fmt::Display) -> ReconcileError {
    let source = &worker.script.content_from_github;
    ReconcileError::ContentFetch {
        repo: source.repo.clone(),
        path: source.path.clone(),
        git_ref: source.git_ref.clone(),
        reason: reason.to_string(),
    }
}

fn require_zone(zones: &HashSet<(&str, &str)>, zone: &ZoneRef, name: &str) -> Result<()> {
    if zones.contains(&(zone.account.as_str(), zone.name.as_str())) {
        Ok(())
    } else {
        Err(ReconcileError::MissingZoneReference {
            record: name.to_string(),
            zone: zone.name.clone(),
            account: zone.account.clone(),
        })
    }
}

fn zone_spec_ref(zone: &ZoneRef) -> ResourceRef {
    ResourceRef::new(ZONE, safe_resource_id(&zone.name))
}

fn build_zone(zone: &CloudflareZone) -> Vec<ResourceSpec> {
    let identifier = safe_resource_id(&zone.name);

    let spec = ResourceSpec::new(ZONE, &zone.account, &identifier)
        .with_attribute("zone", zone.name.as_str())
        .with_attribute("plan", zone.plan.as_str())
        .with_attribute("type", zone.zone_type.as_str());

    let settings = ResourceSpec::new(ZONE_SETTINGS, &zone.account, &identifier)
        .with_attribute("zone_id", spec.reference().id_expression())
        .with_attribute(
            "settings",
            serde_json::Value::Object(zone.settings.clone().into_iter().collect()),
        )
        .depends_on(spec.reference());

    vec![spec, settings]
}

fn build_record(record: &CloudflareRecord) -> ResourceSpec {
    let zone = zone_spec_ref(&record.zone);

    ResourceSpec::new(RECORD, &record.zone.account, safe_resource_id(&record.name))
        .with_attribute("zone_id", zone.id_expression())
        .with_attribute("name", record.name.as_str())
        .with_attribute("value", record.value.as_str())
        .with_attribute("type", record.record_type.as_str())
        .with_attribute("ttl", record.ttl)
        .with_attribute("proxied", record.proxied)
        .depends_on(zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reconflow_core::{ContentRef, UserBinding, WorkerScript};
    use std::collections::BTreeMap;

    struct StaticContent(Option<&'static str>);

    #[async_trait]
    impl ContentStore for StaticContent {
        async fn get_file(&self, content: &ContentRef) -> Result<Vec<u8>> {
            match self.0 {
                Some(body) => Ok(body.as_bytes().to_vec()),
                None => Err(ReconcileError::NotFound(content.path.clone())),
            }
        }
    }

    fn zone_ref(name: &str) -> ZoneRef {
        ZoneRef {
            account: "acme".to_string(),
            name: name.to_string(),
        }
    }

    fn zone(name: &str) -> DesiredRecord {
        DesiredRecord::Zone(CloudflareZone {
            account: "acme".to_string(),
            name: name.to_string(),
            plan: "free".to_string(),
            zone_type: "full".to_string(),
            settings: BTreeMap::from([("ssl".to_string(), serde_json::json!("strict"))]),
        })
    }

    fn record(zone: &str, name: &str) -> DesiredRecord {
        DesiredRecord::Record(CloudflareRecord {
            zone: zone_ref(zone),
            name: name.to_string(),
            value: "192.0.2.10".to_string(),
            record_type: "A".to_string(),
            ttl: 1,
            proxied: true,
        })
    }

    fn worker(zone: &str, name: &str) -> DesiredRecord {
        DesiredRecord::Worker(CloudflareWorker {
            zone: zone_ref(zone),
            name: name.to_string(),
            pattern: format!("{}/{}/*", zone, name),
            script: WorkerScript {
                name: format!("{}-script", name),
                content_from_github: ContentRef {
                    repo: "acme/workers".to_string(),
                    path: format!("{}.js", name),
                    git_ref: "main".to_string(),
                },
            },
        })
    }

    fn find<'a>(specs: &'a [ResourceSpec], resource_type: &str, id: &str) -> &'a ResourceSpec {
        specs
            .iter()
            .find(|s| s.resource_type == resource_type && s.identifier == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_zone_builds_zone_and_settings() {
        let output = SpecBuilder::offline().build(&[zone("example.com")]).await;
        assert!(output.failures.is_empty());
        assert_eq!(output.specs.len(), 2);

        let zone_spec = find(&output.specs, ZONE, "example-com");
        assert_eq!(zone_spec.get_attribute::<String>("zone").unwrap(), "example.com");

        let settings = find(&output.specs, ZONE_SETTINGS, "example-com");
        assert!(settings.dependencies.contains(&zone_spec.reference()));
        assert_eq!(
            settings.get_attribute::<String>("zone_id").unwrap(),
            "${cloudflare_zone.example-com.id}"
        );
    }

    #[tokio::test]
    async fn test_record_depends_on_zone() {
        let output = SpecBuilder::offline()
            .build(&[record("example.com", "www"), zone("example.com")])
            .await;
        assert!(output.failures.is_empty());

        let record_spec = find(&output.specs, RECORD, "www");
        let zone_spec = find(&output.specs, ZONE, "example-com");
        assert!(record_spec.dependencies.contains(&zone_spec.reference()));
        assert_eq!(record_spec.get_attribute::<u32>("ttl"), Some(1));
        assert_eq!(record_spec.get_attribute::<bool>("proxied"), Some(true));
    }

    #[tokio::test]
    async fn test_missing_zone_produces_no_partial_spec() {
        let output = SpecBuilder::offline()
            .build(&[zone("example.com"), record("other.org", "www")])
            .await;

        assert_eq!(output.failures.len(), 1);
        assert!(matches!(
            output.failures[0].error,
            ReconcileError::MissingZoneReference { ref zone, .. } if zone == "other.org"
        ));
        assert!(output.specs.iter().all(|s| s.resource_type != RECORD));
        assert!(output.failed_accounts().contains("acme"));
    }

    #[tokio::test]
    async fn test_worker_embeds_fetched_content() {
        let store: Arc<dyn ContentStore> = Arc::new(StaticContent(Some("export default {}")));
        let output = SpecBuilder::new(Some(store))
            .build(&[zone("example.com"), worker("example.com", "hello")])
            .await;
        assert!(output.failures.is_empty());

        let script = find(&output.specs, WORKER_SCRIPT, "hello");
        assert_eq!(
            script.get_attribute::<String>("content").unwrap(),
            "export default {}"
        );

        let route = find(&output.specs, WORKER_ROUTE, "hello");
        assert!(route.dependencies.contains(&script.reference()));
        assert!(
            route
                .dependencies
                .contains(&find(&output.specs, ZONE, "example-com").reference())
        );
    }

    #[tokio::test]
    async fn test_content_failure_is_isolated_to_worker() {
        let store: Arc<dyn ContentStore> = Arc::new(StaticContent(None));
        let output = SpecBuilder::new(Some(store))
            .build(&[
                zone("example.com"),
                record("example.com", "www"),
                worker("example.com", "hello"),
            ])
            .await;

        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].name, "hello");
        assert!(matches!(
            output.failures[0].error,
            ReconcileError::ContentFetch { .. }
        ));
        assert_eq!(output.specs.len(), 3);
    }

    #[tokio::test]
    async fn test_no_content_store() {
        let output = SpecBuilder::new(None)
            .build(&[zone("example.com"), worker("example.com", "hello")])
            .await;
        assert_eq!(output.failures.len(), 1);
    }

    #[test]
    fn test_user_bindings_ignored() {
        let output = tokio_test::block_on(
            SpecBuilder::offline()
                .build(&[DesiredRecord::UserBinding(UserBinding::new("prod-1", "alice"))]),
        );
        assert!(output.specs.is_empty());
        assert!(output.failures.is_empty());
    }
}
