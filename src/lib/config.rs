use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::lib::error::ConfigError;
use crate::lib::verdict::DEFAULT_THRESHOLD_PERCENT;

/// Namespaces skipped unless configured otherwise
pub const DEFAULT_IGNORE_NAMESPACES: [&str; 4] =
    ["default", "kube-node-lease", "kube-public", "kube-system"];

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Settings for one report run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Kubeconfig file; the default loading rules apply when unset
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Only report this namespace
    pub namespace: Option<String>,
    pub ignore_namespaces: BTreeSet<String>,
    pub threshold_percent: u32,
    /// Pod usage requests in flight per workload kind
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: None,
            ignore_namespaces: DEFAULT_IGNORE_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Partial settings from one source (command line or config file)
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub ignore_namespaces: Option<Vec<String>>,
    pub threshold_percent: Option<u32>,
    pub concurrency: Option<usize>,
}

impl ConfigLayer {
    /// Read a YAML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::FileError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Fill unset values from `fallback`
    fn or(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            kubeconfig: self.kubeconfig.or(fallback.kubeconfig),
            context: self.context.or(fallback.context),
            namespace: self.namespace.or(fallback.namespace),
            ignore_namespaces: self.ignore_namespaces.or(fallback.ignore_namespaces),
            threshold_percent: self.threshold_percent.or(fallback.threshold_percent),
            concurrency: self.concurrency.or(fallback.concurrency),
        }
    }
}

impl Config {
    /// Merge layers, earlier layers winning, on top of the defaults
    pub fn from_layers(layers: impl IntoIterator<Item = ConfigLayer>) -> Result<Self, ConfigError> {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), |acc, layer| acc.or(layer));
        let defaults = Config::default();

        let config = Config {
            kubeconfig: merged.kubeconfig,
            context: merged.context,
            namespace: merged.namespace,
            ignore_namespaces: merged
                .ignore_namespaces
                .map(|list| {
                    list.into_iter()
                        .map(|ns| ns.trim().to_string())
                        .filter(|ns| !ns.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.ignore_namespaces),
            threshold_percent: merged.threshold_percent.unwrap_or(defaults.threshold_percent),
            concurrency: merged.concurrency.unwrap_or(defaults.concurrency),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.threshold_percent > 100 {
            return Err(ConfigError::InvalidValue(format!(
                "threshold percent must be between 0 and 100, got {}",
                self.threshold_percent
            )));
        }
        if matches!(self.namespace.as_deref(), Some("")) {
            return Err(ConfigError::InvalidValue(
                "namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_ignored(&self, namespace: &str) -> bool {
        self.ignore_namespaces.contains(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::from_layers([]).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.is_ignored("kube-system"));
        assert!(config.is_ignored("default"));
        assert!(!config.is_ignored("shop"));
        assert_eq!(config.threshold_percent, 10);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn earlier_layers_win() {
        let cli = ConfigLayer {
            threshold_percent: Some(20),
            ..Default::default()
        };
        let file = ConfigLayer {
            threshold_percent: Some(30),
            concurrency: Some(8),
            context: Some("staging".to_string()),
            ..Default::default()
        };

        let config = Config::from_layers([cli, file]).unwrap();
        assert_eq!(config.threshold_percent, 20);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.context.as_deref(), Some("staging"));
    }

    #[test]
    fn explicit_ignore_list_replaces_defaults() {
        let layer = ConfigLayer {
            ignore_namespaces: Some(vec!["monitoring".to_string(), " ".to_string()]),
            ..Default::default()
        };
        let config = Config::from_layers([layer]).unwrap();
        assert_eq!(
            config.ignore_namespaces,
            BTreeSet::from(["monitoring".to_string()])
        );
        assert!(!config.is_ignored("kube-system"));
    }

    #[test]
    fn rejects_invalid_values() {
        let zero = ConfigLayer {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_layers([zero]),
            Err(ConfigError::InvalidValue(_))
        ));

        let too_high = ConfigLayer {
            threshold_percent: Some(101),
            ..Default::default()
        };
        assert!(matches!(
            Config::from_layers([too_high]),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "context: prod\nignore_namespaces:\n  - kube-system\n  - istio-system\nthreshold_percent: 25\n"
        )
        .unwrap();

        let layer = ConfigLayer::from_file(file.path()).unwrap();
        assert_eq!(layer.context.as_deref(), Some("prod"));
        assert_eq!(layer.threshold_percent, Some(25));
        assert_eq!(
            layer.ignore_namespaces,
            Some(vec!["kube-system".to_string(), "istio-system".to_string()])
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lookback_hours: 5").unwrap();
        assert!(matches!(
            ConfigLayer::from_file(file.path()),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ConfigLayer::from_file(&dir.path().join("missing.yaml")),
            Err(ConfigError::FileError(_))
        ));
    }
}
