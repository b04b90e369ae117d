use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::lib::quantity::Quantity;

/// Kind of workload covered by the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    /// Kinds in the order they are reported within a namespace
    pub const ALL: [WorkloadKind; 2] = [WorkloadKind::Deployment, WorkloadKind::StatefulSet];

    /// Label written to the report's Kind column
    pub fn label(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSets",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub name: String,
}

impl WorkloadIdentity {
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// CPU and memory pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resources {
    pub cpu: Quantity,
    pub memory: Quantity,
}

impl Resources {
    pub fn new(cpu: Quantity, memory: Quantity) -> Self {
        Self { cpu, memory }
    }

    pub fn add(&mut self, other: Resources) {
        self.cpu += other.cpu;
        self.memory += other.memory;
    }
}

/// Aggregated state of one workload at sample time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    pub identity: WorkloadIdentity,
    /// Live pods matching the selector, not the desired replica count
    pub replicas: u32,
    pub requested: Resources,
    pub observed: Resources,
}

impl WorkloadSnapshot {
    pub fn empty(identity: WorkloadIdentity) -> Self {
        Self {
            identity,
            replicas: 0,
            requested: Resources::default(),
            observed: Resources::default(),
        }
    }
}

/// Declared requests of one container in a pod template. A missing request
/// is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub name: String,
    pub requests: Resources,
}

/// Workload as listed by the inventory
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerRequest>,
    pub selector: Option<LabelSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: Resources,
}

/// Instantaneous usage of one live pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodUsage {
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}
