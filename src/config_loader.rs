use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    info!("Configured {} experiments", config.experiments.len());

    config.validate()?;

    Ok(config)
}

/// Load the configuration file if one is given, otherwise fall back to the
/// built-in experiment table
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            warn!("No configuration file given, using built-in experiment table");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct EstimatorCliOverrides {
    pub workers: Option<usize>,
    pub method: Option<crate::estimation::FitMethod>,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(config: &mut Config, overrides: &EstimatorCliOverrides) -> Result<()> {
    if let Some(workers) = overrides.workers {
        info!("Worker count override: {}", workers);
        config.estimator.workers = workers;
    }

    if let Some(method) = overrides.method {
        info!("Fit method override: {}", method);
        config.estimator.method = method;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::FitMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
estimator:
  method: ols
  workers: 4
selection:
  probe_packet_size: 1000
experiments:
  exp1:
    capacity: 5000000
    max_capacity: 10000000
  exp2:
    capacity: 3000000
    max_capacity: 5000000
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.experiments.len(), 2);
        assert_eq!(config.estimator.method, FitMethod::Ols);
        assert_eq!(config.estimator.workers, 4);
        // unspecified fields fall back to defaults
        assert_eq!(config.estimator.huber_t, 1.345);
        assert_eq!(config.selection.probe_packet_size, 1000.0);
        assert_eq!(config.selection.min_confidence, 0.1);
    }

    #[test]
    fn test_load_config_with_window() {
        let yaml = r#"
selection:
  window:
    start: "2025-05-01T10:00:00Z"
    end: "2025-05-01T12:00:00Z"
experiments:
  exp4:
    capacity: 1000000
    max_capacity: 4000000
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.selection.window.is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let yaml = r#"
experiments:
  exp1:
    capacity: -1
    max_capacity: 10000000
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = load_or_default(None).unwrap();

        let overrides = EstimatorCliOverrides {
            workers: Some(2),
            method: Some(FitMethod::Ols),
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.estimator.workers, 2);
        assert_eq!(config.estimator.method, FitMethod::Ols);
    }
}
