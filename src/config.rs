//! Launch configuration for the SQL MCP server process.
//!
//! The server learns its database connection three redundant ways, because
//! server implementations do not agree on which one they read:
//! - environment variables (`MSSQL_*`, `DB_*`, and a `DATABASE_URL` string)
//! - a JSON config file passed via `--config`
//!
//! The core treats all of this as opaque launch parameters; everything in
//! this module is caller-side policy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::mcp::LaunchSpec;

/// Default MSSQL port.
fn default_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}

// ─── Connection Config ───────────────────────────────────────────────────────

/// TLS-related connection options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_true")]
    pub encrypt: bool,
    #[serde(default = "default_true", rename = "trustServerCertificate")]
    pub trust_server_certificate: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            encrypt: true,
            trust_server_certificate: true,
        }
    }
}

/// Database connection settings handed to the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub options: ConnectionOptions,
}

impl ConnectionConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Environment variables injected into the server process.
    ///
    /// Covers the standard `MSSQL_*` names, the `DB_*` alternates, and a
    /// connection-string `DATABASE_URL`, so servers reading any of the
    /// common patterns find their settings.
    pub fn env_overlay(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("MSSQL_SERVER".into(), self.server.clone());
        env.insert("MSSQL_USER".into(), self.user.clone());
        env.insert("MSSQL_PASSWORD".into(), self.password.clone());
        env.insert("MSSQL_DATABASE".into(), self.database.clone());
        env.insert("MSSQL_PORT".into(), self.port.to_string());
        env.insert("MSSQL_ENCRYPT".into(), self.options.encrypt.to_string());
        env.insert(
            "MSSQL_TRUST_SERVER_CERTIFICATE".into(),
            self.options.trust_server_certificate.to_string(),
        );

        env.insert("DB_SERVER".into(), self.server.clone());
        env.insert("DB_USER".into(), self.user.clone());
        env.insert("DB_PASSWORD".into(), self.password.clone());
        env.insert("DB_DATABASE".into(), self.database.clone());
        env.insert("DB_PORT".into(), self.port.to_string());

        env.insert(
            "DATABASE_URL".into(),
            format!(
                "Server={};Database={};User Id={};Password={};TrustServerCertificate=true;Encrypt=true;",
                self.server, self.database, self.user, self.password
            ),
        );

        env
    }
}

// ─── Server Config File ──────────────────────────────────────────────────────

/// A JSON config file written for the server and removed on drop.
///
/// Some servers ignore environment variables and only read `--config`;
/// the file duplicates the connection settings for them.
pub struct ServerConfigFile {
    path: PathBuf,
}

impl ServerConfigFile {
    /// Write the connection config as JSON into `dir`.
    pub fn write(config: &ConnectionConfig, dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join("querydesk_mcp_config.json");
        let text = serde_json::to_string_pretty(config)?;
        std::fs::write(&path, text)
            .with_context(|| format!("failed to write server config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote server config file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ServerConfigFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "could not remove server config file");
        }
    }
}

// ─── Launch Assembly ─────────────────────────────────────────────────────────

/// Build the launch spec for a server given its entry point.
///
/// A `.js`/`.mjs`/`.cjs` entry point runs under node (override the binary
/// with `QUERYDESK_NODE`); anything else is executed directly. The server's
/// working directory is the entry point's parent.
pub fn build_launch_spec(
    server_path: &Path,
    config: &ConnectionConfig,
    config_file: Option<&Path>,
) -> LaunchSpec {
    let ext = server_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let is_js = matches!(ext, "js" | "mjs" | "cjs");

    let mut spec = if is_js {
        let node = std::env::var("QUERYDESK_NODE").unwrap_or_else(|_| "node".to_string());
        let mut spec = LaunchSpec::new(node);
        spec.args.push(server_path.display().to_string());
        spec
    } else {
        LaunchSpec::new(server_path.display().to_string())
    };

    if let Some(file) = config_file {
        spec.args.push("--config".to_string());
        spec.args.push(file.display().to_string());
    }

    spec.env = config.env_overlay();
    spec.cwd = server_path.parent().map(Path::to_path_buf);
    spec
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ConnectionConfig {
        ConnectionConfig {
            server: "localhost".into(),
            database: "testdb".into(),
            user: "sa".into(),
            password: "secret".into(),
            port: 1433,
            options: ConnectionOptions::default(),
        }
    }

    #[test]
    fn test_defaults_applied_on_sparse_config() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"server": "db.example.com", "database": "prod", "user": "app", "password": "pw"}"#,
        )
        .unwrap();
        assert_eq!(config.port, 1433);
        assert!(config.options.encrypt);
        assert!(config.options.trust_server_certificate);
    }

    #[test]
    fn test_env_overlay_covers_all_patterns() {
        let env = sample_config().env_overlay();
        assert_eq!(env["MSSQL_SERVER"], "localhost");
        assert_eq!(env["MSSQL_PORT"], "1433");
        assert_eq!(env["MSSQL_ENCRYPT"], "true");
        assert_eq!(env["DB_DATABASE"], "testdb");
        assert!(env["DATABASE_URL"].contains("Server=localhost;"));
        assert!(env["DATABASE_URL"].contains("Password=secret;"));
    }

    #[test]
    fn test_server_config_file_round_trips_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config();

        let path = {
            let file = ServerConfigFile::write(&config, dir.path()).unwrap();
            let written = ConnectionConfig::load(file.path()).unwrap();
            assert_eq!(written.database, "testdb");
            assert_eq!(written.options.trust_server_certificate, true);
            file.path().to_path_buf()
        };

        // Removed on drop.
        assert!(!path.exists());
    }

    #[test]
    fn test_config_file_uses_camel_case_option_names() {
        let text = serde_json::to_string(&sample_config()).unwrap();
        assert!(text.contains("trustServerCertificate"));
        assert!(!text.contains("trust_server_certificate"));
    }

    #[test]
    fn test_launch_spec_for_node_entry_point() {
        let config = sample_config();
        let spec = build_launch_spec(
            Path::new("/srv/mssql-mcp/dist/index.js"),
            &config,
            Some(Path::new("/tmp/cfg.json")),
        );
        // The entry point goes into args, not the command (node runs it).
        assert_ne!(spec.command, "/srv/mssql-mcp/dist/index.js");
        assert_eq!(spec.args[0], "/srv/mssql-mcp/dist/index.js");
        assert_eq!(spec.args[1], "--config");
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/srv/mssql-mcp/dist")));
        assert_eq!(spec.env["MSSQL_DATABASE"], "testdb");
    }

    #[test]
    fn test_launch_spec_for_native_entry_point() {
        let config = sample_config();
        let spec = build_launch_spec(Path::new("/usr/local/bin/sql-mcp"), &config, None);
        assert_eq!(spec.command, "/usr/local/bin/sql-mcp");
        assert!(spec.args.is_empty());
    }
}
