//! querydesk — natural-language SQL agent over an MCP stdio server.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use querydesk::config::{build_launch_spec, ConnectionConfig, ServerConfigFile};
use querydesk::mcp::McpConnection;
use querydesk::{agent, data_dir, init_tracing};

/// Natural-language SQL agent over MCP stdio servers.
#[derive(Debug, Parser)]
#[command(name = "querydesk", version, about)]
struct Cli {
    /// Path to the MCP server entry point (e.g. dist/index.js)
    #[arg(env = "QUERYDESK_SERVER")]
    server_path: PathBuf,

    /// JSON file with connection settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database host (overrides the config file)
    #[arg(long)]
    db_server: Option<String>,

    /// Database name (overrides the config file)
    #[arg(long)]
    database: Option<String>,

    /// Database user (overrides the config file)
    #[arg(long)]
    user: Option<String>,

    /// Database password (overrides the config file)
    #[arg(long, env = "QUERYDESK_DB_PASSWORD")]
    password: Option<String>,

    /// Database port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Per-call timeout in seconds
    #[arg(long, default_value_t = 15)]
    call_timeout: u64,
}

impl Cli {
    /// Connection settings: config file (when given) plus flag overrides.
    fn connection_config(&self) -> anyhow::Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => ConnectionConfig::load(path)?,
            None => ConnectionConfig {
                server: "localhost".into(),
                database: "testdb".into(),
                user: "sa".into(),
                password: String::new(),
                port: 1433,
                options: Default::default(),
            },
        };

        if let Some(server) = &self.db_server {
            config.server = server.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }

        if config.password.is_empty() {
            anyhow::bail!(
                "no database password given; use --password, QUERYDESK_DB_PASSWORD, or a config file"
            );
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let connection = cli.connection_config()?;
    println!(
        "starting querydesk: {}:{} / {} as {}",
        connection.server, connection.port, connection.database, connection.user
    );
    println!("MCP server: {}", cli.server_path.display());

    if !cli.server_path.exists() {
        anyhow::bail!(
            "MCP server entry point not found: {}",
            cli.server_path.display()
        );
    }

    // The config file duplicates the env settings for servers that only
    // read --config; it is removed again when this binding drops.
    let config_file = ServerConfigFile::write(&connection, &data_dir())
        .context("failed to write server config file")?;

    let spec = build_launch_spec(&cli.server_path, &connection, Some(config_file.path()));

    let mut conn = match McpConnection::establish(&spec).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "failed to establish MCP connection");
            eprintln!("failed to start the MCP agent: {e}");
            eprintln!();
            eprintln!("troubleshooting:");
            eprintln!("  1. verify the server path exists and is built");
            eprintln!("  2. check that the database is running and reachable");
            eprintln!("  3. verify the database credentials");
            eprintln!("  4. look at the log file under {}", data_dir().display());
            std::process::exit(1);
        }
    };
    conn.set_call_timeout(std::time::Duration::from_secs(cli.call_timeout));

    agent::repl::run(conn).await
}
