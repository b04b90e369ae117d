use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info};

use crate::Result;
use crate::lib::aggregator::Aggregator;
use crate::lib::config::Config;
use crate::lib::error::ReportError;
use crate::lib::inventory::ClusterInventory;
use crate::lib::output::{ReportRow, ReportSink};
use crate::lib::verdict::Policy;
use crate::lib::workload::{WorkloadKind, WorkloadSpec};

/// Walks the cluster and feeds one row per workload into a sink
pub struct Reporter<'a, I> {
    inventory: &'a I,
    config: &'a Config,
    policy: Policy,
}

impl<'a, I: ClusterInventory> Reporter<'a, I> {
    pub fn new(inventory: &'a I, config: &'a Config) -> Self {
        Self {
            inventory,
            config,
            policy: Policy::new(config.threshold_percent),
        }
    }

    /// Write the report into `sink` and return the number of rows written.
    ///
    /// Rows are written namespace by namespace, Deployments before
    /// StatefulSets, each in discovery order. The first error stops the
    /// report; rows already written stay in the sink.
    pub async fn run<S: ReportSink + ?Sized>(&self, sink: &mut S) -> Result<usize> {
        let mut written = 0;

        for namespace in self.namespaces().await? {
            if self.config.is_ignored(&namespace) {
                debug!("Skipping ignored namespace {namespace}");
                continue;
            }

            let rows = self.namespace_rows(&namespace).await?;
            info!("Analyzed {} workloads in {namespace} namespace", rows.len());
            for row in rows {
                sink.write_row(row)?;
                written += 1;
            }
        }

        sink.finish()?;
        info!("Report complete with {written} workloads");
        Ok(written)
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        match &self.config.namespace {
            Some(namespace) => Ok(vec![namespace.clone()]),
            None => self.inventory.list_namespaces().await,
        }
    }

    /// Rows for every workload in a namespace
    pub async fn namespace_rows(&self, namespace: &str) -> Result<Vec<ReportRow>> {
        let mut rows = Vec::new();
        for kind in WorkloadKind::ALL {
            let specs = self.inventory.list_workloads(kind, namespace).await?;
            rows.extend(self.evaluate_all(kind, specs).await?);
        }
        Ok(rows)
    }

    /// Evaluate workloads with bounded concurrency, keeping their order
    async fn evaluate_all(&self, kind: WorkloadKind, specs: Vec<WorkloadSpec>) -> Result<Vec<ReportRow>> {
        let aggregator = Aggregator::new(self.inventory);
        let aggregator = &aggregator;

        stream::iter(specs)
            .map(|spec| async move {
                let snapshot = aggregator.snapshot(kind, &spec).await?;
                let verdict = self.policy.evaluate(&snapshot);
                debug!("{}: {}", snapshot.identity, verdict.action);
                Ok::<_, ReportError>(ReportRow::new(snapshot, verdict))
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::error::KubernetesError;
    use crate::lib::output::CsvSink;
    use crate::lib::quantity::Quantity;
    use crate::lib::verdict::Action;
    use crate::lib::workload::{ContainerRequest, ContainerUsage, PodUsage, Resources};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    const GIB: u64 = 1024 * 1024 * 1024;

    /// In-memory cluster keyed by namespace and label query
    #[derive(Default)]
    struct FakeCluster {
        namespaces: Vec<String>,
        workloads: HashMap<(WorkloadKind, String), Vec<WorkloadSpec>>,
        pods: HashMap<(String, String), Vec<PodUsage>>,
        fail_pods_in: Option<String>,
        queried: Mutex<Vec<String>>,
    }

    impl FakeCluster {
        fn workload(mut self, kind: WorkloadKind, namespace: &str, name: &str, cpu: u64, memory: u64) -> Self {
            let spec = WorkloadSpec {
                name: name.to_string(),
                namespace: namespace.to_string(),
                containers: vec![ContainerRequest {
                    name: "app".to_string(),
                    requests: Resources::new(Quantity::from_millis(cpu), Quantity::from_bytes(memory)),
                }],
                selector: Some(LabelSelector {
                    match_labels: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
                    match_expressions: None,
                }),
            };
            if !self.namespaces.iter().any(|ns| ns == namespace) {
                self.namespaces.push(namespace.to_string());
            }
            self.workloads
                .entry((kind, namespace.to_string()))
                .or_default()
                .push(spec);
            self
        }

        fn pod(mut self, namespace: &str, app: &str, cpu: u64, memory: u64) -> Self {
            let pods = self
                .pods
                .entry((namespace.to_string(), format!("app={app}")))
                .or_default();
            pods.push(PodUsage {
                name: format!("{app}-{}", pods.len()),
                containers: vec![ContainerUsage {
                    name: "app".to_string(),
                    usage: Resources::new(Quantity::from_millis(cpu), Quantity::from_bytes(memory)),
                }],
            });
            self
        }
    }

    impl ClusterInventory for FakeCluster {
        async fn list_namespaces(&self) -> Result<Vec<String>> {
            Ok(self.namespaces.clone())
        }

        async fn list_workloads(&self, kind: WorkloadKind, namespace: &str) -> Result<Vec<WorkloadSpec>> {
            Ok(self
                .workloads
                .get(&(kind, namespace.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn list_pod_usage(&self, namespace: &str, label_query: &str) -> Result<Vec<PodUsage>> {
            self.queried.lock().unwrap().push(format!("{namespace}:{label_query}"));
            if self.fail_pods_in.as_deref() == Some(namespace) {
                return Err(KubernetesError::ApiError("metrics unavailable".to_string()).into());
            }
            Ok(self
                .pods
                .get(&(namespace.to_string(), label_query.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn config() -> Config {
        Config {
            ignore_namespaces: ["kube-system".to_string()].into(),
            ..Default::default()
        }
    }

    async fn csv(cluster: &FakeCluster, config: &Config) -> (Result<usize>, Vec<String>) {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        let result = Reporter::new(cluster, config).run(&mut sink).await;
        let text = String::from_utf8(sink.into_inner()).unwrap();
        (result, text.lines().map(String::from).collect())
    }

    #[tokio::test]
    async fn over_provisioned_workload_needs_update() {
        let cluster = FakeCluster::default()
            .workload(WorkloadKind::Deployment, "shop", "api", 2000, 2 * GIB)
            .pod("shop", "api", 400, GIB)
            .pod("shop", "api", 600, GIB);
        let config = config();

        let rows = Reporter::new(&cluster, &config).namespace_rows("shop").await.unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.snapshot.replicas, 2);
        assert_eq!(row.snapshot.requested.cpu.milli_value(), 2000);
        assert_eq!(row.snapshot.observed.cpu.milli_value(), 1000);
        assert_eq!(row.snapshot.observed.memory.value(), 2 * GIB);
        assert_eq!(row.verdict.action, Action::NeedUpdate);
        assert_eq!(
            row.verdict.note.as_deref(),
            Some("Need reduce CPU 50.00%(500m per pod)")
        );
        assert_eq!(
            row.csv(),
            "shop,api,Deployment,2,1000m/2000m,2048Mi/2048Mi,Need update,Need reduce CPU 50.00%(500m per pod)"
        );
    }

    #[tokio::test]
    async fn workload_without_pods_needs_remove() {
        let cluster =
            FakeCluster::default().workload(WorkloadKind::StatefulSet, "data", "redis", 500, GIB);
        let config = config();

        let rows = Reporter::new(&cluster, &config).namespace_rows("data").await.unwrap();

        assert_eq!(rows[0].verdict.action, Action::NeedRemove);
        assert_eq!(rows[0].csv(), "data,redis,StatefulSets,0,0m/500m,0Mi/1024Mi,Need remove,");
    }

    #[tokio::test]
    async fn rows_follow_namespace_kind_and_discovery_order() {
        let cluster = FakeCluster::default()
            .workload(WorkloadKind::StatefulSet, "shop", "db", 0, 0)
            .workload(WorkloadKind::Deployment, "shop", "web", 0, 0)
            .workload(WorkloadKind::Deployment, "shop", "api", 0, 0)
            .workload(WorkloadKind::Deployment, "billing", "worker", 0, 0)
            .pod("shop", "web", 10, 0);
        let config = Config {
            concurrency: 2,
            ..config()
        };

        let (result, lines) = csv(&cluster, &config).await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(
            lines,
            vec![
                "Namespace,Name,Kind,Replicas,CPU Usage/CPU Request(m),Memory Usage/Memory Request(Mi),Action,Note",
                "shop,web,Deployment,1,10m/unlimit,0Mi/unlimit,Good,",
                "shop,api,Deployment,0,0m/unlimit,0Mi/unlimit,Need remove,",
                "shop,db,StatefulSets,0,0m/unlimit,0Mi/unlimit,Need remove,",
                "billing,worker,Deployment,0,0m/unlimit,0Mi/unlimit,Need remove,",
            ]
        );
    }

    #[tokio::test]
    async fn ignored_namespaces_are_never_queried() {
        let cluster = FakeCluster::default()
            .workload(WorkloadKind::Deployment, "kube-system", "coredns", 100, 0)
            .workload(WorkloadKind::Deployment, "shop", "api", 100, 0);

        let (result, lines) = csv(&cluster, &config()).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(lines.len(), 2);
        assert_eq!(*cluster.queried.lock().unwrap(), vec!["shop:app=api".to_string()]);
    }

    #[tokio::test]
    async fn single_namespace_mode() {
        let cluster = FakeCluster::default()
            .workload(WorkloadKind::Deployment, "shop", "api", 100, 0)
            .workload(WorkloadKind::Deployment, "billing", "worker", 100, 0);
        let config = Config {
            namespace: Some("billing".to_string()),
            ..config()
        };

        let (result, lines) = csv(&cluster, &config).await;

        assert_eq!(result.unwrap(), 1);
        assert!(lines[1].starts_with("billing,worker,"));
    }

    #[tokio::test]
    async fn failure_aborts_but_keeps_written_rows() {
        let mut cluster = FakeCluster::default()
            .workload(WorkloadKind::Deployment, "shop", "api", 100, 0)
            .workload(WorkloadKind::Deployment, "billing", "worker", 100, 0)
            .workload(WorkloadKind::Deployment, "search", "indexer", 100, 0);
        cluster.fail_pods_in = Some("billing".to_string());

        let (result, lines) = csv(&cluster, &config()).await;

        assert!(matches!(result, Err(ReportError::Kubernetes(_))));
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("shop,api,"));
    }

    #[tokio::test]
    async fn malformed_selector_aborts() {
        let mut cluster =
            FakeCluster::default().workload(WorkloadKind::Deployment, "shop", "api", 100, 0);
        let spec = cluster
            .workloads
            .get_mut(&(WorkloadKind::Deployment, "shop".to_string()))
            .unwrap();
        spec[0].selector = Some(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "app".to_string(),
                operator: "NotIn".to_string(),
                values: Some(vec!["api".to_string()]),
            }]),
        });

        let (result, lines) = csv(&cluster, &config()).await;

        assert!(matches!(result, Err(ReportError::Selector(_))));
        assert_eq!(lines.len(), 1);
        assert!(cluster.queried.lock().unwrap().is_empty());
    }
}
