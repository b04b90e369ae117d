use crate::Result;
use crate::lib::workload::{PodUsage, WorkloadKind, WorkloadSpec};

/// Read-only view of the cluster the report is built from.
///
/// Every call goes to the source; nothing is cached between calls. Any error
/// aborts the report.
#[allow(async_fn_in_trait)]
pub trait ClusterInventory {
    /// Names of all namespaces in the cluster
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Workloads of one kind in a namespace, in discovery order
    async fn list_workloads(&self, kind: WorkloadKind, namespace: &str)
    -> Result<Vec<WorkloadSpec>>;

    /// Usage of every live pod in `namespace` matching `label_query`
    /// (`k=v` pairs joined by `,`; empty matches every pod)
    async fn list_pod_usage(&self, namespace: &str, label_query: &str) -> Result<Vec<PodUsage>>;
}
