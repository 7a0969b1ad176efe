use clap::Parser;
use nationgrid_engine::territory::{DEFAULT_ORIGIN_WINDOW, DEFAULT_TERRITORY_COUNT};
use nationgrid_engine::WorldConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "nationgrid-server", version)]
#[command(about = "HTTP and WebSocket server for the NationGrid strategy game")]
pub struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:39333")]
    pub bind: SocketAddr,

    /// SQLite database file (default: ~/.nationgrid/nationgrid.db).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Cells granted to each new nation.
    #[arg(
        long,
        default_value_t = DEFAULT_TERRITORY_COUNT as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub territory_count: u64,

    /// Side of the square new capitals are drawn from, before it widens.
    #[arg(
        long,
        default_value_t = DEFAULT_ORIGIN_WINDOW,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub origin_window: i64,

    #[arg(long, default_value_t = 168)]
    pub session_ttl_hours: u64,

    /// Mark the session cookie `Secure` (serve behind TLS).
    #[arg(long)]
    pub secure_cookies: bool,

    /// Extra browser origin allowed by CORS. Repeatable.
    #[arg(long = "allow-origin")]
    pub allow_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub world: WorldConfig,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub allow_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            world: WorldConfig::default(),
            session_ttl: Duration::from_secs(168 * 3600),
            secure_cookies: false,
            allow_origins: Vec::new(),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let db_path = args.db.unwrap_or_else(default_db_path);
        Self {
            db_path,
            world: WorldConfig {
                territory_count: usize::try_from(args.territory_count).unwrap_or(usize::MAX),
                origin_window: args.origin_window,
                ..WorldConfig::default()
            },
            session_ttl: Duration::from_secs(args.session_ttl_hours.saturating_mul(3600)),
            secure_cookies: args.secure_cookies,
            allow_origins: args.allow_origins,
        }
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nationgrid")
        .join("nationgrid.db")
}
