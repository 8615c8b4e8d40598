use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse a config from YAML text, expanding `$env{..}` and `~` and validating the result.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    config.fallback.path = expand_tilde(&config.fallback.path);

    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = config.transport.problems();

    if config.fallback.path.as_os_str().is_empty() {
        errors.push("fallback.path cannot be empty".to_string());
    }

    if config.web.listen.trim().is_empty() {
        errors.push("web.listen cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
fallback:
  path: /tmp/fallback.duckdb
web:
  listen: "127.0.0.1:7106"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.transport, TransportConfig::default());
        assert!(config.routing.use_primary_transport);
    }

    #[test]
    fn test_full_transport_section() {
        let yaml = r#"
transport:
  host: 10.0.0.5
  port: 5044
  mode: besteffort
  connect_timeout: 1s
  max_retry_attempts: 0
  retry_delay: 100ms
  batch_size: 25
routing:
  use_primary_transport: false
fallback:
  path: /tmp/fallback.duckdb
web:
  listen: "0.0.0.0:7106"
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.transport.host, "10.0.0.5");
        assert_eq!(config.transport.port, 5044);
        assert_eq!(config.transport.mode, TransportMode::BestEffort);
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.transport.max_retry_attempts, 0);
        assert_eq!(config.transport.retry_delay, Duration::from_millis(100));
        assert_eq!(config.transport.batch_size, 25);
        assert!(!config.routing.use_primary_transport);
    }

    #[test]
    fn test_invalid_values_collected() {
        let yaml = r#"
transport:
  batch_size: 0
  port: 0
fallback:
  path: ""
web:
  listen: ""
"#;
        match parse_config(yaml) {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 4);
                assert!(errors.iter().any(|e| e.contains("batch_size")));
                assert!(errors.iter().any(|e| e.contains("fallback.path")));
            }
            other => panic!("expected validation list, got {:?}", other),
        }
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let yaml = format!(
            "transport:\n  host: $env{{LOGRELAY_UNSET_HOST_VAR}}\n{}",
            MINIMAL
        );
        match parse_config(&yaml) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains("LOGRELAY_UNSET_HOST_VAR"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expansion_in_transport() {
        std::env::set_var("LOGRELAY_PARSE_TEST_HOST", "relay-target");
        let yaml = format!(
            "transport:\n  host: $env{{LOGRELAY_PARSE_TEST_HOST}}\n{}",
            MINIMAL
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.transport.host, "relay-target");
        std::env::remove_var("LOGRELAY_PARSE_TEST_HOST");
    }
}
