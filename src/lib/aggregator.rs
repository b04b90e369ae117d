use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use log::debug;

use crate::Result;
use crate::lib::error::SelectorError;
use crate::lib::inventory::ClusterInventory;
use crate::lib::workload::{
    ContainerRequest, PodUsage, WorkloadIdentity, WorkloadKind, WorkloadSnapshot, WorkloadSpec,
};

/// Builds workload snapshots from declared requests and live pod usage
pub struct Aggregator<'a, I> {
    inventory: &'a I,
}

impl<'a, I: ClusterInventory> Aggregator<'a, I> {
    pub fn new(inventory: &'a I) -> Self {
        Self { inventory }
    }

    /// Fetch usage for the pods selected by `spec` and fold it together with
    /// the declared requests.
    pub async fn snapshot(&self, kind: WorkloadKind, spec: &WorkloadSpec) -> Result<WorkloadSnapshot> {
        let query = label_query(spec.selector.as_ref())?;
        debug!(
            "Fetching pod usage for {} {}/{} with selector {:?}",
            kind, spec.namespace, spec.name, query
        );

        let pods = self.inventory.list_pod_usage(&spec.namespace, &query).await?;
        let identity = WorkloadIdentity::new(kind, spec.namespace.clone(), spec.name.clone());

        Ok(aggregate(identity, &spec.containers, &pods))
    }
}

/// Sum requests over the pod template and usage over every container of
/// every live pod. The replica count is the number of live pods.
pub fn aggregate(
    identity: WorkloadIdentity,
    containers: &[ContainerRequest],
    pods: &[PodUsage],
) -> WorkloadSnapshot {
    let mut snapshot = WorkloadSnapshot::empty(identity);

    for container in containers {
        snapshot.requested.add(container.requests);
    }

    for pod in pods {
        snapshot.replicas = snapshot.replicas.saturating_add(1);
        for container in &pod.containers {
            snapshot.observed.add(container.usage);
        }
    }

    snapshot
}

/// Convert a label selector into an equality-based label query.
///
/// Only `matchLabels` and `In` expressions with exactly one value can be
/// expressed this way; anything else is an error. A missing or empty
/// selector gives an empty query.
pub fn label_query(selector: Option<&LabelSelector>) -> std::result::Result<String, SelectorError> {
    let Some(selector) = selector else {
        return Ok(String::new());
    };

    let mut labels: BTreeMap<&str, &str> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        match expr.operator.as_str() {
            "In" => match expr.values.as_deref() {
                Some([value]) => {
                    labels.insert(expr.key.as_str(), value.as_str());
                }
                _ => return Err(SelectorError::MultipleValues(expr.operator.clone())),
            },
            "NotIn" | "Exists" | "DoesNotExist" => {
                return Err(SelectorError::UnsupportedOperator(expr.operator.clone()));
            }
            other => return Err(SelectorError::InvalidOperator(other.to_string())),
        }
    }

    Ok(labels
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(","))
}
