use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `todo-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for running a single
/// local instance against an on-disk SQLite database.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo-tonic-server",
    version,
    about = "A gRPC service for managing to-do items"
)]
pub struct CliArgs {
    /// sqlx connection string for the backing database.
    ///
    /// Use `sqlite::memory:` for a throwaway in-memory database.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", default_value_t = String::from("sqlite://todo.db?mode=rwc"))]
    pub database_url: String,

    /// Maximum number of pooled database connections shared by all requests.
    ///
    /// Environment variable: `MAX_CONNECTIONS`
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 8)]
    pub max_connections: u32,

    /// Seconds a request waits for a free pooled connection before failing.
    ///
    /// Environment variable: `ACQUIRE_TIMEOUT_SECS`
    #[arg(long, env = "ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Server-wide per-request timeout in seconds. `0` disables it, leaving
    /// only the client's `grpc-timeout` deadline in effect.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 0)]
    pub request_timeout_secs: u64,

    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/todo-uds.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Do not apply the embedded schema migrations at startup.
    ///
    /// Environment variable: `SKIP_MIGRATIONS`
    #[arg(long, env = "SKIP_MIGRATIONS", default_value_t = false)]
    pub skip_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub request_timeout: Option<Duration>,
    pub server_addr: String,
    pub uds: bool,
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Whether the database lives only inside the pool's connections.
    ///
    /// Follows sqlx's SQLite URL grammar: the database part is exactly
    /// `:memory:`, or the query string carries `mode=memory`.
    pub fn is_in_memory(&self) -> bool {
        let url = self.database_url.trim();
        let url = url.strip_prefix("sqlite:").unwrap_or(url);
        let url = url.strip_prefix("//").unwrap_or(url);
        let (database, params) = url.split_once('?').unwrap_or((url, ""));
        database == ":memory:" || params.split('&').any(|param| param == "mode=memory")
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.database_url.trim().is_empty() {
            bail!("DATABASE_URL must not be empty");
        }

        if args.max_connections == 0 {
            bail!("MAX_CONNECTIONS must be greater than 0");
        }

        if args.acquire_timeout_secs == 0 {
            bail!("ACQUIRE_TIMEOUT_SECS must be greater than 0");
        }

        let request_timeout =
            (args.request_timeout_secs > 0).then(|| Duration::from_secs(args.request_timeout_secs));

        Ok(Self {
            database_url: args.database_url,
            max_connections: args.max_connections,
            acquire_timeout: Duration::from_secs(args.acquire_timeout_secs),
            request_timeout,
            server_addr: args.server_addr,
            uds: args.uds,
            run_migrations: !args.skip_migrations,
        })
    }
}
