// file: tests/integration_test.rs
// version: 2.0.0
// guid: z6a7b8c9-d0e1-2345-6789-012345zabcde

//! Integration tests for the FixPanic CLI library

use fixpanic::{
    agent::{AgentManager, AgentOptions},
    config::{AgentConfig, ConfigLoader},
    logging::Console,
    platform::{Arch, InstallLayout, Os, Platform},
    FixpanicError, Result,
};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

// Agent processes are found by name, so tests that run or stop them take turns
static AGENT_PROCESSES: Mutex<()> = Mutex::new(());

fn agent_processes() -> MutexGuard<'static, ()> {
    AGENT_PROCESSES.lock().unwrap_or_else(|e| e.into_inner())
}

/// Serve exactly one HTTP response on a local port and return its base URL
fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let header = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });
    format!("http://{}", addr)
}

fn test_layout(dir: &TempDir) -> InstallLayout {
    InstallLayout::rooted_at(dir.path(), Platform::new(Os::Linux, Arch::Amd64))
}

fn manager_with(dir: &TempDir, options: AgentOptions) -> AgentManager {
    AgentManager::new(test_layout(dir), options, None).with_console(Console::with_colors(false))
}

fn write_agent_script(manager: &AgentManager, version: &str) {
    manager.layout().create_directories().unwrap();
    std::fs::write(
        manager.binary().path(),
        format!("#!/bin/sh\necho 'fixpanic-agent {} - test build'\n", version),
    )
    .unwrap();
    fixpanic::utils::fs::set_executable(manager.binary().path()).unwrap();
}

#[test]
fn test_config_loading_integration() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("agent.yaml");
    std::fs::write(
        &config_path,
        r#"
app:
  agent_id: agent_123
  api_key: ${FIXPANIC_IT_API_KEY}
connection:
  socket_server: socket.fixpanic.com:8080
logging:
  level: debug
"#,
    )?;

    let mut loader = ConfigLoader::new();
    loader.set_env_var("FIXPANIC_IT_API_KEY", "fp_from_env");
    let config = loader.load(&config_path)?;
    config.validate()?;

    assert_eq!(config.app.agent_id, "agent_123");
    assert_eq!(config.app.api_key, "fp_from_env");
    assert_eq!(config.logging.level, "debug");
    assert!(config.connection.tls_enabled);

    Ok(())
}

#[test]
fn test_config_save_and_reload() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let layout = test_layout(&temp_dir);
    let config = AgentConfig::new("agent_123", "fp_abc", &layout)
        .with_socket_server("localhost:9000");

    let loader = ConfigLoader::new();
    loader.save(&config, layout.config_path())?;
    let reloaded = loader.load(layout.config_path())?;

    assert_eq!(reloaded, config);
    Ok(())
}

#[tokio::test]
async fn test_install_downloads_agent_and_writes_config() {
    let temp_dir = TempDir::new().unwrap();
    let releases = serve_once("200 OK", b"#!/bin/sh\necho agent\n".to_vec());
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            releases_url: Some(releases),
            socket_server: Some("localhost:9000".to_string()),
            ..Default::default()
        },
    );

    manager
        .install("agent_123", "fp_abc", false, "latest")
        .await
        .unwrap();

    assert!(manager.binary().is_installed());
    assert!(fixpanic::utils::fs::is_executable(manager.binary().path()));

    let config = ConfigLoader::new().load(manager.config_path()).unwrap();
    assert_eq!(config.app.agent_id, "agent_123");
    assert_eq!(config.connection.socket_server, "localhost:9000");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_install_refuses_existing_installation() {
    let temp_dir = TempDir::new().unwrap();
    let manager = manager_with(&temp_dir, AgentOptions::default());
    manager.layout().create_directories().unwrap();
    std::fs::write(manager.binary().path(), "existing agent").unwrap();

    let result = manager.install("agent_123", "fp_abc", false, "latest").await;

    assert!(matches!(result, Err(FixpanicError::AlreadyInstalled)));
    assert_eq!(
        std::fs::read_to_string(manager.binary().path()).unwrap(),
        "existing agent"
    );
}

#[tokio::test]
async fn test_install_download_failure_leaves_no_binary() {
    let temp_dir = TempDir::new().unwrap();
    let releases = serve_once("404 Not Found", b"missing".to_vec());
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            releases_url: Some(releases),
            ..Default::default()
        },
    );

    let err = manager
        .install("agent_123", "fp_abc", false, "latest")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("404"));
    assert!(!manager.binary().is_installed());
    assert!(!manager.config_path().exists());
}

#[tokio::test]
async fn test_uninstall_is_noop_when_not_installed() {
    let temp_dir = TempDir::new().unwrap();
    let manager = manager_with(&temp_dir, AgentOptions::default());

    manager.uninstall(false).await.unwrap();

    assert!(!manager.layout().config_dir.exists());
}

#[tokio::test]
async fn test_uninstall_force_removes_files_and_empty_dirs() {
    let _guard = agent_processes();
    let temp_dir = TempDir::new().unwrap();
    let manager = manager_with(&temp_dir, AgentOptions::default());
    let layout = manager.layout().clone();
    layout.create_directories().unwrap();
    std::fs::write(manager.binary().path(), "agent").unwrap();
    let config = AgentConfig::new("agent_123", "fp_abc", &layout);
    ConfigLoader::new().save(&config, layout.config_path()).unwrap();
    std::fs::write(layout.rules_path(), "version: \"1.0\"\n").unwrap();
    std::fs::write(layout.log_path(), "log line\n").unwrap();

    manager.uninstall(true).await.unwrap();

    assert!(!manager.binary().is_installed());
    assert!(!layout.config_path().exists());
    assert!(!layout.rules_path().exists());
    assert!(!layout.lib_dir.exists());
    assert!(!layout.config_dir.exists());
    // The log directory still holds the agent log
    assert!(layout.log_path().exists());
}

#[tokio::test]
async fn test_connection_command_uses_socket_server_override() {
    let temp_dir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            socket_server: Some(address),
            ..Default::default()
        },
    );
    manager.layout().create_directories().unwrap();
    std::fs::write(manager.binary().path(), "agent").unwrap();

    manager.test_connection().await.unwrap();
    drop(listener);
}

#[tokio::test]
async fn test_connection_command_reports_unreachable_server() {
    let temp_dir = TempDir::new().unwrap();
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            socket_server: Some(format!("127.0.0.1:{}", port)),
            ..Default::default()
        },
    );
    manager.layout().create_directories().unwrap();
    std::fs::write(manager.binary().path(), "agent").unwrap();

    let result = manager.test_connection().await;
    assert!(matches!(result, Err(FixpanicError::Network(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_agent_upgrade_skips_when_already_latest() {
    let _guard = agent_processes();
    let temp_dir = TempDir::new().unwrap();
    let api = serve_once("200 OK", br#"{"tag_name":"v2.0.0"}"#.to_vec());
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            api_base: Some(api),
            // Nothing listens here; a download attempt would fail
            releases_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        },
    );
    write_agent_script(&manager, "v2.0.0");
    let before = std::fs::read(manager.binary().path()).unwrap();

    manager.upgrade(false, "latest").await.unwrap();

    assert_eq!(std::fs::read(manager.binary().path()).unwrap(), before);
}

#[cfg(unix)]
#[tokio::test]
async fn test_agent_upgrade_replaces_binary() {
    let _guard = agent_processes();
    let temp_dir = TempDir::new().unwrap();
    let api = serve_once("200 OK", br#"{"tag_name":"v2.0.0"}"#.to_vec());
    let new_agent = b"#!/bin/sh\necho 'fixpanic-agent v2.0.0 - test build'\n".to_vec();
    let releases = serve_once("200 OK", new_agent.clone());
    let manager = manager_with(
        &temp_dir,
        AgentOptions {
            api_base: Some(api),
            releases_url: Some(releases),
            ..Default::default()
        },
    );
    write_agent_script(&manager, "v1.0.0");

    manager.upgrade(false, "latest").await.unwrap();

    assert_eq!(std::fs::read(manager.binary().path()).unwrap(), new_agent);
}
