//! Kubernetes Resources Usage Library
//!
//! This library compares the live CPU and memory usage of Deployments and
//! StatefulSets with their declared requests and recommends keeping,
//! shrinking or removing each workload.

pub mod lib {
    pub mod aggregator;
    pub mod cli;
    pub mod config;
    pub mod error;
    pub mod inventory;
    pub mod kubernetes;
    pub mod logger;
    pub mod output;
    pub mod quantity;
    pub mod report;
    pub mod tui;
    pub mod verdict;
    pub mod workload;
}

// Re-export commonly used types at the root level for convenience
pub use lib::aggregator::{Aggregator, aggregate, label_query};
pub use lib::cli::{Cli, OutputFormat};
pub use lib::config::{Config, ConfigLayer};
pub use lib::error::{
    ConfigError, KubernetesError, QuantityError, ReportError, Result, SelectorError,
};
pub use lib::inventory::ClusterInventory;
pub use lib::kubernetes::{KubernetesLoader, PodMetrics};
pub use lib::logger::init_logger;
pub use lib::output::{CsvSink, JsonSink, ReportOutput, ReportRow, ReportSink, csv_header, csv_line};
pub use lib::quantity::Quantity;
pub use lib::report::Reporter;
pub use lib::tui::TableSink;
pub use lib::verdict::{Action, Policy, Verdict};
pub use lib::workload::{
    ContainerRequest, ContainerUsage, PodUsage, Resources, WorkloadIdentity, WorkloadKind,
    WorkloadSnapshot, WorkloadSpec,
};
