// file: src/config/loader.rs
// version: 2.0.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution

use super::{AgentConfig, SecurityRules};
use crate::utils::fs::write_private;
use crate::{FixpanicError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Load the agent configuration from a YAML file.
    ///
    /// The result is not validated; callers decide when validation matters.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<AgentConfig> {
        let path = path.as_ref();
        debug!("Loading agent configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| {
            FixpanicError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let expanded = self.expand_env_vars(&content)?;
        serde_yaml::from_str(&expanded).map_err(|e| {
            FixpanicError::config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the agent configuration, readable only by its owner
    pub fn save<P: AsRef<Path>>(&self, config: &AgentConfig, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(config)?;
        write_private(path, yaml.as_bytes())?;
        debug!("Saved agent configuration to {}", path.display());
        Ok(())
    }

    /// Load security rules from a YAML file
    pub fn load_rules<P: AsRef<Path>>(&self, path: P) -> Result<SecurityRules> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FixpanicError::config(format!(
                "Failed to read rules file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| FixpanicError::config(format!("Invalid YAML format: {}", e)))
    }

    /// Expand environment variables in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| FixpanicError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else if !missing_vars.iter().any(|v| v == var_name) {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(FixpanicError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, InstallLayout, Os, Platform};
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_env_var_expansion() {
        let mut loader = ConfigLoader::new();
        loader.set_env_var("FIXPANIC_TEST_KEY", "fp_secret");

        let result = loader.expand_env_vars("api_key: ${FIXPANIC_TEST_KEY}").unwrap();
        assert_eq!(result, "api_key: fp_secret");
    }

    #[test]
    fn test_missing_env_var() {
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("key: ${FIXPANIC_MISSING_VAR_9876}");

        let err = result.unwrap_err().to_string();
        assert!(err.contains("Missing environment variables"));
        assert!(err.contains("FIXPANIC_MISSING_VAR_9876"));
    }

    #[test]
    fn test_load_with_placeholders() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
app:
  agent_id: ${{FIXPANIC_TEST_AGENT}}
  api_key: fp_abc123
connection:
  socket_server: localhost:9000
logging:
  level: debug
"#
        )
        .unwrap();

        let mut loader = ConfigLoader::new();
        loader.set_env_var("FIXPANIC_TEST_AGENT", "agent_from_env");
        let config = loader.load(file.path())?;

        assert_eq!(config.app.agent_id, "agent_from_env");
        assert_eq!(config.connection.socket_server, "localhost:9000");
        assert_eq!(config.logging.level, "debug");
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let loader = ConfigLoader::new();
        let result = loader.load("/nonexistent/fixpanic/agent.yaml");
        assert!(matches!(result, Err(FixpanicError::Config(_))));
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let layout = InstallLayout::rooted_at(dir.path(), Platform::new(Os::Linux, Arch::Amd64));
        let config = AgentConfig::new("agent_123", "fp_abc123", &layout);
        let loader = ConfigLoader::new();

        loader.save(&config, layout.config_path())?;
        let loaded = loader.load(layout.config_path())?;

        assert_eq!(loaded, config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(layout.config_path())?.permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
        Ok(())
    }
}
