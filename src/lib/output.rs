use std::io::Write;

use serde::Serialize;

use crate::Result;
use crate::lib::config::Config;
use crate::lib::verdict::Verdict;
use crate::lib::workload::WorkloadSnapshot;

/// Column names, in the order [`ReportRow::cells`] renders them
pub const COLUMNS: [&str; 8] = [
    "Namespace",
    "Name",
    "Kind",
    "Replicas",
    "CPU Usage/CPU Request(m)",
    "Memory Usage/Memory Request(Mi)",
    "Action",
    "Note",
];

const UNLIMITED: &str = "unlimit";

/// One workload of the report together with its verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub snapshot: WorkloadSnapshot,
    pub verdict: Verdict,
}

impl ReportRow {
    pub fn new(snapshot: WorkloadSnapshot, verdict: Verdict) -> Self {
        Self { snapshot, verdict }
    }

    /// `<usage>m/<request>m`, or `<usage>m/unlimit` without a request
    pub fn cpu_column(&self) -> String {
        let usage = self.snapshot.observed.cpu.milli_value();
        let request = &self.snapshot.requested.cpu;
        if request.is_zero() {
            format!("{usage}m/{UNLIMITED}")
        } else {
            format!("{usage}m/{}m", request.milli_value())
        }
    }

    /// `<usage>Mi/<request>Mi`, or `<usage>Mi/unlimit` without a request
    pub fn memory_column(&self) -> String {
        let usage = self.snapshot.observed.memory.mebibytes();
        let request = &self.snapshot.requested.memory;
        if request.is_zero() {
            format!("{usage}Mi/{UNLIMITED}")
        } else {
            format!("{usage}Mi/{}Mi", request.mebibytes())
        }
    }

    pub fn cells(&self) -> [String; 8] {
        let identity = &self.snapshot.identity;
        [
            identity.namespace.clone(),
            identity.name.clone(),
            identity.kind.label().to_string(),
            self.snapshot.replicas.to_string(),
            self.cpu_column(),
            self.memory_column(),
            self.verdict.action.label().to_string(),
            self.verdict.note.clone().unwrap_or_default(),
        ]
    }

    /// Comma separated line, fields are not quoted
    pub fn csv(&self) -> String {
        self.cells().join(",")
    }
}

pub fn csv_header() -> String {
    COLUMNS.join(",")
}

/// CSV line for a row; nothing for a missing row
pub fn csv_line(row: Option<&ReportRow>) -> String {
    row.map(ReportRow::csv).unwrap_or_default()
}

/// Destination of report rows
pub trait ReportSink {
    fn write_row(&mut self, row: ReportRow) -> Result<()>;

    /// Called once after the last row
    fn finish(&mut self) -> Result<()>;
}

/// Streams CSV lines as rows arrive
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    /// Create the sink and write the header line
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{}", csv_header())?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn write_row(&mut self, row: ReportRow) -> Result<()> {
        writeln!(self.writer, "{}", row.csv())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Top-level JSON document
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutput {
    pub metadata: OutputMetadata,
    pub workloads: Vec<WorkloadOutput>,
}

/// Metadata about the report generation
#[derive(Debug, Clone, Serialize)]
pub struct OutputMetadata {
    pub timestamp: String,
    pub namespace: Option<String>,
    pub ignored_namespaces: Vec<String>,
    pub threshold_percent: u32,
    pub total_workloads: usize,
}

/// One workload in the JSON document. Requests are `null` when unset.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadOutput {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub replicas: u32,
    pub cpu_usage_millis: u64,
    pub cpu_request_millis: Option<u64>,
    pub memory_usage_bytes: u64,
    pub memory_request_bytes: Option<u64>,
    pub action: String,
    pub note: Option<String>,
}

impl From<&ReportRow> for WorkloadOutput {
    fn from(row: &ReportRow) -> Self {
        let snapshot = &row.snapshot;
        let requested = &snapshot.requested;
        Self {
            namespace: snapshot.identity.namespace.clone(),
            name: snapshot.identity.name.clone(),
            kind: snapshot.identity.kind.label().to_string(),
            replicas: snapshot.replicas,
            cpu_usage_millis: snapshot.observed.cpu.milli_value(),
            cpu_request_millis: (!requested.cpu.is_zero()).then(|| requested.cpu.milli_value()),
            memory_usage_bytes: snapshot.observed.memory.value(),
            memory_request_bytes: (!requested.memory.is_zero()).then(|| requested.memory.value()),
            action: row.verdict.action.label().to_string(),
            note: row.verdict.note.clone(),
        }
    }
}

impl ReportOutput {
    pub fn new(config: &Config, workloads: Vec<WorkloadOutput>) -> Self {
        Self {
            metadata: OutputMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                namespace: config.namespace.clone(),
                ignored_namespaces: config.ignore_namespaces.iter().cloned().collect(),
                threshold_percent: config.threshold_percent,
                total_workloads: workloads.len(),
            },
            workloads,
        }
    }
}

/// Collects rows and writes a single JSON document on finish
pub struct JsonSink<W: Write> {
    writer: W,
    config: Config,
    workloads: Vec<WorkloadOutput>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, config: &Config) -> Self {
        Self {
            writer,
            config: config.clone(),
            workloads: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn write_row(&mut self, row: ReportRow) -> Result<()> {
        self.workloads.push(WorkloadOutput::from(&row));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let output = ReportOutput::new(&self.config, std::mem::take(&mut self.workloads));
        serde_json::to_writer_pretty(&mut self.writer, &output)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
