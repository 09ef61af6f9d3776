// file: src/config/rules.rs
// version: 1.1.0
// guid: 05b997c5-5778-481c-b879-5e876f30dc81

//! Command security rules
//!
//! The agent only executes commands its rules file allows. Rules are regular
//! expressions in two lists: a command matching any `deny` pattern is refused
//! even when it also matches an `allow` pattern, and a command matching neither
//! list is refused.

use crate::{FixpanicError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Commands evaluated by `fixpanic agent validate` to show the rules in action
pub const SAMPLE_COMMANDS: [&str; 5] = [
    "ls -la",
    "cat /etc/passwd",
    "rm -rf /",
    "ps aux",
    "systemctl restart nginx",
];

/// Contents written when no rules file exists yet
pub const DEFAULT_RULES: &str = r#"# FixPanic Security Rules
# This file defines which commands the agent is allowed to execute
#
# Format:
# - allow: list of allowed command patterns (regex)
# - deny: list of denied command patterns (regex)
#
# Deny rules take precedence over allow rules. Commands matching neither
# list are denied.

version: "1.0"

# Allowed commands - basic system monitoring and diagnostics
allow:
  - "^ls\\s"
  - "^ps\\s"
  - "^top\\s"
  - "^df\\s"
  - "^free\\s"
  - "^uptime\\s"
  - "^uname\\s"
  - "^cat\\s"
  - "^grep\\s"
  - "^find\\s"
  - "^netstat\\s"
  - "^ss\\s"
  - "^ping\\s"
  - "^traceroute\\s"
  - "^journalctl\\s"
  - "^systemctl\\sstatus\\s"
  - "^docker\\sps\\s"
  - "^docker\\slogs\\s"
  - "^kubectl\\sget\\s"
  - "^kubectl\\slogs\\s"

# Denied commands - potentially dangerous operations
deny:
  - "^rm\\s.*-rf\\s"
  - "^dd\\s"
  - "^mkfs\\s"
  - "^fdisk\\s"
  - "^parted\\s"
  - "^chmod\\s.*777\\s"
  - "^chown\\s.*root\\s"
  - "^sudo\\s"
  - "^su\\s"
  - "^passwd\\s"
  - "^useradd\\s"
  - "^userdel\\s"
  - "^systemctl\\s(restart|stop|start)\\s"
  - "^reboot\\s"
  - "^shutdown\\s"
  - "^halt\\s"
  - "^poweroff\\s"
  - "^curl.*\\|\\s*sh\\s"
  - "^wget.*\\|\\s*sh\\s"
"#;

/// Allow/deny rule set.
///
/// Patterns are compiled on the first `is_command_allowed` call and reused
/// afterwards; edit the pattern lists before matching, not after.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityRules {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(skip)]
    compiled: OnceLock<CompiledRules>,
}

#[derive(Debug, Clone)]
struct CompiledRules {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl PartialEq for SecurityRules {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.allow == other.allow && self.deny == other.deny
    }
}

impl SecurityRules {
    /// The built-in rule set
    pub fn default_rules() -> Result<Self> {
        Ok(serde_yaml::from_str(DEFAULT_RULES)?)
    }

    /// Write the built-in rules file, creating parent directories
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_RULES)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
        }

        debug!("Wrote default security rules to {}", path.display());
        Ok(())
    }

    /// Validate the rule set structure and every pattern
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(FixpanicError::validation("rules version is required"));
        }

        for (kind, patterns) in [("allow", &self.allow), ("deny", &self.deny)] {
            for (i, pattern) in patterns.iter().enumerate() {
                if pattern.is_empty() {
                    return Err(FixpanicError::validation(format!(
                        "empty {} pattern at index {}",
                        kind, i
                    )));
                }
                Regex::new(pattern).map_err(|e| {
                    FixpanicError::validation(format!(
                        "invalid regex in {} pattern '{}': {}",
                        kind, pattern, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Decide whether the agent may run `command`
    pub fn is_command_allowed(&self, command: &str) -> bool {
        let compiled = self.compiled();
        if compiled.deny.iter().any(|re| re.is_match(command)) {
            return false;
        }
        compiled.allow.iter().any(|re| re.is_match(command))
    }

    fn compiled(&self) -> &CompiledRules {
        self.compiled.get_or_init(|| CompiledRules {
            allow: compile_patterns(&self.allow),
            deny: compile_patterns(&self.deny),
        })
    }
}

// Patterns that fail to compile never match.
fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Ignoring invalid rule pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rules(allow: &[&str], deny: &[&str]) -> SecurityRules {
        SecurityRules {
            version: "1.0".to_string(),
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let rules = rules(&[".*"], &["^rm\\s"]);
        assert!(!rules.is_command_allowed("rm -rf /tmp/x"));
        assert!(rules.is_command_allowed("ls -la"));
    }

    #[test]
    fn test_unmatched_command_is_denied() {
        let rules = rules(&["^ls\\s"], &[]);
        assert!(!rules.is_command_allowed("whoami"));
        assert!(!SecurityRules::default().is_command_allowed("ls -la"));
    }

    #[test]
    fn test_default_rules_sample_evaluation() {
        let rules = SecurityRules::default_rules().unwrap();
        rules.validate().unwrap();

        let verdicts: Vec<bool> = SAMPLE_COMMANDS
            .iter()
            .map(|c| rules.is_command_allowed(c))
            .collect();
        assert_eq!(verdicts, vec![true, true, false, true, false]);
    }

    #[test]
    fn test_validate_rejects_bad_rules() {
        let mut missing_version = rules(&["^ls"], &[]);
        missing_version.version.clear();
        assert!(missing_version.validate().is_err());

        let empty_pattern = rules(&[""], &[]);
        assert!(empty_pattern
            .validate()
            .unwrap_err()
            .to_string()
            .contains("empty allow pattern at index 0"));

        let bad_regex = rules(&[], &["(unclosed"]);
        assert!(bad_regex
            .validate()
            .unwrap_err()
            .to_string()
            .contains("invalid regex in deny pattern"));
    }

    #[test]
    fn test_write_default_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc").join("security-rules.yaml");

        SecurityRules::write_default(&path).unwrap();

        let written: SecurityRules =
            serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, SecurityRules::default_rules().unwrap());
        assert_eq!(written.allow.len(), 20);
        assert_eq!(written.deny.len(), 19);
    }

    #[test]
    fn test_patterns_compile_once() {
        let rules = rules(&["^ls\\s", "(unclosed"], &["^rm\\s"]);

        assert!(rules.is_command_allowed("ls -la"));
        assert!(!rules.is_command_allowed("rm -rf /"));

        let first = rules.compiled();
        assert!(std::ptr::eq(first, rules.compiled()));
        // The broken pattern is dropped, the rest still apply
        assert_eq!(first.allow.len(), 1);
        assert_eq!(first.deny.len(), 1);
    }
}
