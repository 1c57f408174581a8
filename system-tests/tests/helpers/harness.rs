// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Server Harness
// Description: Helpers for spawning evalstream servers in system-tests.
// Purpose: Provide deterministic server startup and teardown for tests.
// Dependencies: evalstream-config, evalstream-server, tokio
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;

use evalstream_config::EvalStreamConfig;
use evalstream_config::IdentityMode;
use evalstream_config::SessionStoreType;
use evalstream_server::StreamServer;
use evalstream_server::StreamServerError;
use system_tests::config::DEFAULT_TIMEOUT;
use system_tests::config::SystemTestConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::client::ApiClient;
use super::client::USER_HEADER;
use super::readiness::wait_for_server_ready;

/// Handle for a spawned server.
pub struct ServerHandle {
    base_url: String,
    client: ApiClient,
    join: JoinHandle<Result<(), StreamServerError>>,
}

impl ServerHandle {
    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns an anonymous client for the server.
    pub fn client(&self) -> ApiClient {
        self.client.clone()
    }

    /// Shuts down the server task.
    pub async fn shutdown(self) {
        self.join.abort();
        let _ = self.join.await;
    }
}

/// Base config: in-memory store, anonymous identity, audit off.
pub fn base_config() -> EvalStreamConfig {
    let mut config = EvalStreamConfig::default();
    config.server.audit.enabled = false;
    config
}

/// Config with header identity and enforced ownership.
pub fn owned_config() -> EvalStreamConfig {
    let mut config = base_config();
    config.server.identity.mode = IdentityMode::Header;
    config.server.identity.header = USER_HEADER.to_string();
    config.server.ownership.require_owner = true;
    config.server.ownership.enforce_access = true;
    config
}

/// Config backed by a `SQLite` database at `path`.
pub fn sqlite_config(path: &Path) -> EvalStreamConfig {
    let mut config = base_config();
    config.session_store.store_type = SessionStoreType::Sqlite;
    config.session_store.path = Some(path.to_path_buf());
    config
}

/// Spawns a server for `config` and waits until it reports ready.
pub async fn spawn_server(mut config: EvalStreamConfig) -> Result<ServerHandle, String> {
    let env = SystemTestConfig::load()?;
    let bind = env.http_bind.unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)));
    config.server.bind = bind.to_string();

    let server = tokio::task::spawn_blocking(move || StreamServer::from_config(config))
        .await
        .map_err(|err| format!("server init join failed: {err}"))?
        .map_err(|err| format!("server init failed: {err}"))?;
    let listener =
        TcpListener::bind(bind).await.map_err(|err| format!("failed to bind {bind}: {err}"))?;
    let addr = listener.local_addr().map_err(|err| format!("failed to read address: {err}"))?;
    let join = tokio::spawn(server.serve_listener(listener));

    let base_url = format!("http://{addr}");
    let timeout = env.effective_timeout(DEFAULT_TIMEOUT);
    let client = ApiClient::new(base_url.clone(), timeout)?;
    wait_for_server_ready(&client, timeout).await?;
    Ok(ServerHandle {
        base_url,
        client,
        join,
    })
}
