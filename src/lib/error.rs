use thiserror::Error;

/// Main error type for the report
#[derive(Error, Debug)]
pub enum ReportError {
    /// Kubernetes API errors
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] KubernetesError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pod selector conversion errors
    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Kubernetes-specific errors
#[derive(Error, Debug)]
pub enum KubernetesError {
    /// API server connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid resource specification
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// API error
    #[error("API error: {0}")]
    ApiError(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Configuration file error
    #[error("File error: {0}")]
    FileError(String),
}

/// Errors raised while parsing a Kubernetes quantity string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("negative quantity: {0}")]
    Negative(String),

    #[error("invalid number in quantity: {0}")]
    InvalidNumber(String),

    #[error("invalid suffix in quantity: {0}")]
    InvalidSuffix(String),

    #[error("quantity out of range: {0}")]
    Overflow(String),
}

/// Errors raised while turning a label selector into a label query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("operator {0:?} without a single value cannot be converted into a label query")]
    MultipleValues(String),

    #[error("operator {0:?} cannot be converted into a label query")]
    UnsupportedOperator(String),

    #[error("{0:?} is not a valid selector operator")]
    InvalidOperator(String),
}

/// Helper type alias for Results
pub type Result<T> = std::result::Result<T, ReportError>;
