use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/chores.db)
  PORT        (default: 5151 or config.listen_port)
  RUST_LOG    (default: info)

Use `hash-password` to produce the bcrypt hashes stored in the config file.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "chores-server",
    version,
    about = "Household chores server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(long, env = "CONFIG_PATH", default_value = "config.yaml", global = true)]
    pub config: PathBuf,
    /// Path to the SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "data/chores.db", global = true)]
    pub db: PathBuf,
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a password from stdin and print its bcrypt hash
    HashPassword {
        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
}
