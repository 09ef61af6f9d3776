// file: src/cli/commands.rs
// version: 2.0.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Command implementations for the CLI

use super::args::{AgentCommands, Cli, Commands};
use crate::agent::{AgentManager, AgentOptions};
use crate::platform::Platform;
use crate::upgrade::SelfUpgrader;
use crate::{Result, BUILD_INFO, VERSION};
use tracing::debug;

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let options = AgentOptions {
        config_path: cli.config,
        socket_server: cli.socket_server,
        ..Default::default()
    };

    match cli.command {
        Commands::Agent { command } => agent_command(command, options).await,
        Commands::Upgrade { check, force } => upgrade_command(check, force).await,
        Commands::Version => {
            version_command();
            Ok(())
        }
    }
}

/// Run one `fixpanic agent …` subcommand
pub async fn agent_command(command: AgentCommands, options: AgentOptions) -> Result<()> {
    let manager = AgentManager::for_host(options)?;
    debug!(
        "Using layout rooted at {} (root: {})",
        manager.layout().config_dir.display(),
        manager.layout().is_root
    );

    match command {
        AgentCommands::Install {
            agent_id,
            api_key,
            force,
            release,
        } => manager.install(&agent_id, &api_key, force, &release).await,
        AgentCommands::Start { no_update } => manager.start(no_update).await,
        AgentCommands::Stop => manager.stop().await,
        AgentCommands::Restart { no_update } => manager.restart(no_update).await,
        AgentCommands::Status => manager.status().await,
        AgentCommands::Uninstall { force } => manager.uninstall(force).await,
        AgentCommands::Logs { lines, follow } => manager.logs(lines, follow).await,
        AgentCommands::Validate => manager.validate().await,
        AgentCommands::TestConnection => manager.test_connection().await,
        AgentCommands::Upgrade { force, release } => manager.upgrade(force, &release).await,
    }
}

/// `fixpanic upgrade`
pub async fn upgrade_command(check: bool, force: bool) -> Result<()> {
    let upgrader = SelfUpgrader::for_current_exe()?;
    let outcome = upgrader.run(check, force).await?;
    debug!("Self-upgrade finished: {:?}", outcome);
    Ok(())
}

/// `fixpanic version`
pub fn version_command() {
    println!("fixpanic {}", VERSION);
    print!("{}", BUILD_INFO);
    match Platform::current() {
        Ok(platform) => println!("Platform: {}", platform),
        Err(_) => println!(
            "Platform: {}/{} (unsupported)",
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
    }
}
