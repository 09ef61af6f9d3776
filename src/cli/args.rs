// file: src/cli/args.rs
// version: 2.0.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fixpanic")]
#[command(about = "Install, run and upgrade the FixPanic agent on your server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Agent configuration file (defaults to <config dir>/agent.yaml)
    #[arg(long, global = true, env = "FIXPANIC_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Socket server address, host:port [default: socket.fixpanic.com:8080]
    #[arg(long, global = true, env = "FIXPANIC_SOCKET_SERVER", value_name = "HOST:PORT")]
    pub socket_server: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the FixPanic agent
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Upgrade the FixPanic CLI to the latest version
    Upgrade {
        /// Only check for updates without upgrading
        #[arg(long)]
        check: bool,

        /// Upgrade even if already on the latest version
        #[arg(long)]
        force: bool,
    },

    /// Show version and build information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Download the agent, write its configuration and register the service
    Install {
        /// Agent ID from the FixPanic dashboard
        #[arg(long, env = "FIXPANIC_AGENT_ID")]
        agent_id: String,

        /// Agent API key from the FixPanic dashboard
        #[arg(long, env = "FIXPANIC_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Reinstall even if the agent is already installed
        #[arg(long)]
        force: bool,

        /// Agent release to install
        #[arg(long = "version", value_name = "TAG", default_value = "latest")]
        release: String,
    },

    /// Start the agent
    Start {
        /// Skip the agent update check
        #[arg(long)]
        no_update: bool,
    },

    /// Stop the agent
    Stop,

    /// Stop and start the agent
    Restart {
        /// Skip the agent update check
        #[arg(long)]
        no_update: bool,
    },

    /// Show installation, configuration and runtime status
    Status,

    /// Remove the agent, its configuration and its service
    Uninstall {
        /// Do not ask for confirmation
        #[arg(long)]
        force: bool,
    },

    /// Show agent logs
    Logs {
        /// Number of log lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,

        /// Follow log output in real time
        #[arg(short, long)]
        follow: bool,
    },

    /// Validate the agent configuration and security rules
    #[command(alias = "validate-rules")]
    Validate,

    /// Check that the socket server is reachable
    TestConnection,

    /// Replace the agent binary with a newer release
    Upgrade {
        /// Upgrade even if already on the target version
        #[arg(long)]
        force: bool,

        /// Agent release to upgrade to
        #[arg(long = "version", value_name = "TAG", default_value = "latest")]
        release: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from([
            "fixpanic",
            "agent",
            "install",
            "--agent-id",
            "agent_123",
            "--api-key",
            "fp_abc",
        ])
        .unwrap();

        match cli.command {
            Commands::Agent {
                command:
                    AgentCommands::Install {
                        agent_id,
                        api_key,
                        force,
                        release,
                    },
            } => {
                assert_eq!(agent_id, "agent_123");
                assert_eq!(api_key, "fp_abc");
                assert!(!force);
                assert_eq!(release, "latest");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rules_alias() {
        let cli = Cli::try_parse_from(["fixpanic", "agent", "validate-rules"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Agent {
                command: AgentCommands::Validate
            }
        ));
    }

    #[test]
    fn test_logs_defaults_and_global_flags() {
        let cli = Cli::try_parse_from([
            "fixpanic",
            "agent",
            "logs",
            "-f",
            "--socket-server",
            "localhost:9000",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.socket_server.as_deref(), Some("localhost:9000"));
        match cli.command {
            Commands::Agent {
                command: AgentCommands::Logs { lines, follow },
            } => {
                assert_eq!(lines, 50);
                assert!(follow);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_self_upgrade_flags() {
        let cli = Cli::try_parse_from(["fixpanic", "upgrade", "--check"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Upgrade {
                check: true,
                force: false
            }
        ));
    }
}
