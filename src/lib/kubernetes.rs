use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Namespace, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::lib::inventory::ClusterInventory;
use crate::lib::quantity::Quantity;
use crate::lib::workload::{
    ContainerRequest, ContainerUsage, PodUsage, Resources, WorkloadKind, WorkloadSpec,
};
use crate::{
    Config as ReportConfig, ConfigError::InvalidValue, KubernetesError::ApiError,
    KubernetesError::ConnectionFailed, KubernetesError::InvalidResource, Result,
};

const CPU: &str = "cpu";
const MEMORY: &str = "memory";

/// Live usage of one pod, served by metrics-server under
/// `metrics.k8s.io/v1beta1`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<PodMetricsContainer>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodMetricsContainer {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, KubeQuantity>,
}

impl k8s_openapi::Resource for PodMetrics {
    type Scope = k8s_openapi::NamespaceResourceScope;

    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const URL_PATH_SEGMENT: &'static str = "pods";
    const VERSION: &'static str = "v1beta1";
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// Cluster inventory backed by the Kubernetes API and metrics-server
pub struct KubernetesLoader {
    client: Client,
}

impl KubernetesLoader {
    pub async fn new(config: &ReportConfig) -> Result<Self> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..Default::default()
        };

        let client = if let Some(ref path) = config.kubeconfig {
            debug!("Creating a Kubernetes client from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| InvalidValue(e.to_string()))?;
            let custom_config = Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| InvalidValue(e.to_string()))?;
            Client::try_from(custom_config).map_err(|e| ConnectionFailed(e.to_string()))?
        } else if config.context.is_some() {
            debug!("Using custom context for Kubeconfig");
            let custom_config = Config::from_kubeconfig(&options)
                .await
                .map_err(|e| InvalidValue(e.to_string()))?;

            debug!("Creating a Kubernetes client using custom Kubeconfig");
            Client::try_from(custom_config).map_err(|e| ConnectionFailed(e.to_string()))?
        } else {
            debug!("Creating a Kubernetes client using default Kubeconfig");
            Client::try_default()
                .await
                .map_err(|e| ConnectionFailed(e.to_string()))?
        };

        info!("Successfully created Kubernetes client");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl ClusterInventory for KubernetesLoader {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        debug!("Listing all namespaces");
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ApiError(format!("listing namespaces: {e}")))?;

        Ok(namespaces
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_workloads(&self, kind: WorkloadKind, namespace: &str) -> Result<Vec<WorkloadSpec>> {
        debug!("Listing {kind} workloads in {namespace} namespace");
        let lp = ListParams::default();
        let list_error = |e: kube::Error| ApiError(format!("listing {kind} in {namespace}: {e}"));

        let workloads = match kind {
            WorkloadKind::Deployment => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.list(&lp)
                    .await
                    .map_err(list_error)?
                    .items
                    .into_iter()
                    .map(|d| {
                        let spec = d.spec.as_ref();
                        workload_spec(
                            &d.metadata,
                            namespace,
                            spec.map(|s| &s.selector),
                            spec.map(|s| &s.template),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            WorkloadKind::StatefulSet => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
                api.list(&lp)
                    .await
                    .map_err(list_error)?
                    .items
                    .into_iter()
                    .map(|sts| {
                        let spec = sts.spec.as_ref();
                        workload_spec(
                            &sts.metadata,
                            namespace,
                            spec.map(|s| &s.selector),
                            spec.map(|s| &s.template),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        debug!("Retrieved {} {kind} workloads in {namespace}", workloads.len());
        Ok(workloads)
    }

    async fn list_pod_usage(&self, namespace: &str, label_query: &str) -> Result<Vec<PodUsage>> {
        let api: Api<PodMetrics> = Api::namespaced(self.client.clone(), namespace);
        let mut lp = ListParams::default();
        if !label_query.is_empty() {
            lp = lp.labels(label_query);
        }

        let metrics = api
            .list(&lp)
            .await
            .map_err(|e| ApiError(format!("listing pod metrics in {namespace}: {e}")))?;

        metrics.items.iter().map(pod_usage).collect()
    }
}

/// Turn a workload object into the inventory's view of it
fn workload_spec(
    metadata: &ObjectMeta,
    namespace: &str,
    selector: Option<&LabelSelector>,
    template: Option<&PodTemplateSpec>,
) -> Result<WorkloadSpec> {
    let name = metadata.name.clone().unwrap_or_default();
    let namespace = metadata
        .namespace
        .clone()
        .unwrap_or_else(|| namespace.to_string());

    let containers = template
        .and_then(|t| t.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|container| {
            let requests = container
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref());
            let context = format!("{namespace}/{name} container {}", container.name);
            Ok(ContainerRequest {
                name: container.name.clone(),
                requests: Resources::new(
                    quantity(requests, CPU, &context)?,
                    quantity(requests, MEMORY, &context)?,
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WorkloadSpec {
        name,
        namespace,
        containers,
        selector: selector.cloned(),
    })
}

fn pod_usage(metrics: &PodMetrics) -> Result<PodUsage> {
    let name = metrics.metadata.name.clone().unwrap_or_default();
    let containers = metrics
        .containers
        .iter()
        .map(|container| {
            let context = format!("pod {name} container {}", container.name);
            Ok(ContainerUsage {
                name: container.name.clone(),
                usage: Resources::new(
                    quantity(Some(&container.usage), CPU, &context)?,
                    quantity(Some(&container.usage), MEMORY, &context)?,
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PodUsage { name, containers })
}

/// Parse `key` from a resource map; a missing entry is zero
fn quantity(
    resources: Option<&BTreeMap<String, KubeQuantity>>,
    key: &str,
    context: &str,
) -> Result<Quantity> {
    match resources.and_then(|r| r.get(key)) {
        Some(value) => {
            let parsed = Quantity::try_from(value)
                .map_err(|e| InvalidResource(format!("{context}: {key} {e}")))?;
            Ok(parsed)
        }
        None => Ok(Quantity::zero()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements};

    fn container(name: &str, requests: &[(&str, &str)]) -> Container {
        Container {
            name: name.to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(
                    requests
                        .iter()
                        .map(|(k, v)| (k.to_string(), KubeQuantity(v.to_string())))
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn template(containers: Vec<Container>) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers,
                ..Default::default()
            }),
        }
    }

    fn metadata(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn reads_container_requests() {
        let template = template(vec![
            container("app", &[("cpu", "500m"), ("memory", "256Mi")]),
            container("sidecar", &[("cpu", "0.1")]),
            Container {
                name: "no-resources".to_string(),
                ..Default::default()
            },
        ]);

        let spec = workload_spec(&metadata("api"), "shop", None, Some(&template)).unwrap();

        assert_eq!(spec.name, "api");
        assert_eq!(spec.namespace, "shop");
        assert_eq!(spec.containers.len(), 3);
        assert_eq!(spec.containers[0].requests.cpu.milli_value(), 500);
        assert_eq!(spec.containers[0].requests.memory.value(), 256 * 1024 * 1024);
        assert_eq!(spec.containers[1].requests.cpu.milli_value(), 100);
        assert!(spec.containers[1].requests.memory.is_zero());
        assert_eq!(spec.containers[2].requests, Resources::default());
    }

    #[test]
    fn workload_without_template_has_no_containers() {
        let spec = workload_spec(&metadata("empty"), "shop", None, None).unwrap();
        assert!(spec.containers.is_empty());
        assert!(spec.selector.is_none());
    }

    #[test]
    fn invalid_request_is_an_error() {
        let template = template(vec![container("app", &[("cpu", "lots")])]);
        let err = workload_spec(&metadata("api"), "shop", None, Some(&template)).unwrap_err();
        assert!(err.to_string().contains("shop/api container app"));
    }

    #[test]
    fn decodes_pod_metrics() {
        let metrics: PodMetrics = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "api-7d9f", "namespace": "shop"},
            "timestamp": "2024-01-01T00:00:00Z",
            "window": "30s",
            "containers": [
                {"name": "app", "usage": {"cpu": "12345678n", "memory": "3145728Ki"}},
                {"name": "sidecar", "usage": {"cpu": "1m"}}
            ]
        }))
        .unwrap();

        let usage = pod_usage(&metrics).unwrap();
        assert_eq!(usage.name, "api-7d9f");
        assert_eq!(usage.containers.len(), 2);
        assert_eq!(usage.containers[0].usage.cpu.milli_value(), 13);
        assert_eq!(usage.containers[0].usage.memory.mebibytes(), 3072);
        assert_eq!(usage.containers[1].usage.cpu.milli_value(), 1);
        assert!(usage.containers[1].usage.memory.is_zero());
    }
}
